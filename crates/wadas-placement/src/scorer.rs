//! Node scoring policies.
//!
//! Each policy maps one node's normalized telemetry to a comparable score
//! and a recommended device:
//! - **Monitoring**: power draw plus memory pressure; lower is better
//! - **Actuator**: network throughput plus disk write/read ratio; higher is better
//! - **Optimum**: actuator performance per unit of monitoring power; higher is better

use wadas_core::{
    DeviceCandidate, NodeInfo, NodeLoad, PolicyKind, PolicyStages, SchedulerConfig, ScoringWeights,
    Stage, StageRequirement,
};

/// Smallest power term the optimum policy divides by.
pub const MIN_POWER: f64 = 1e-6;

/// Whether the best node has the lowest or the highest score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    Minimize,
    Maximize,
}

impl Objective {
    /// Order `a` before `b` when `a` is the better score.
    pub fn compare(&self, a: f64, b: f64) -> std::cmp::Ordering {
        let ord = a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal);
        match self {
            Objective::Minimize => ord,
            Objective::Maximize => ord.reverse(),
        }
    }
}

/// Score and recommended device for one node in one stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub score: f64,
    pub device: DeviceCandidate,
}

/// A pluggable strategy mapping node telemetry to a score and a device.
pub trait ScoringPolicy: Send + Sync {
    fn kind(&self) -> PolicyKind;

    fn objective(&self) -> Objective;

    /// Whether the network throughput probe feeds this policy.
    fn needs_network(&self) -> bool;

    fn requirement(&self, stage: Stage) -> &StageRequirement;

    fn evaluate(&self, node: &NodeInfo, load: &NodeLoad, stage: Stage) -> Evaluation;

    /// A node is eligible when its capacity in the stage's resource pool
    /// strictly exceeds the minimum core count.
    fn is_eligible(&self, node: &NodeInfo, stage: Stage) -> bool {
        let req = self.requirement(stage);
        node.capacity(&req.resource) > req.min_cores
    }
}

/// Build the policy for `kind` from the loaded configuration.
pub fn build_policy(kind: PolicyKind, config: &SchedulerConfig) -> Box<dyn ScoringPolicy> {
    let weights = config.weights.clone();
    let stages = config.policies.for_kind(kind).clone();
    match kind {
        PolicyKind::Monitoring => Box::new(MonitoringPolicy::new(weights, stages)),
        PolicyKind::Actuator => Box::new(ActuatorPolicy::new(weights, stages)),
        PolicyKind::Optimum => Box::new(OptimumPolicy::new(weights, stages)),
    }
}

/// Weighted device power; an NPU only counts while it is busy.
fn power_draw(weights: &ScoringWeights, node: &NodeInfo, load: &NodeLoad) -> f64 {
    let p = &weights.power;
    let mut power = p.cpu * load.cpu_utilization + p.gpu * load.gpu_utilization;
    if node.has_device(DeviceCandidate::Npu) && load.npu_utilization > 0.0 {
        power += p.npu * load.npu_utilization;
    }
    power
}

/// `ALPHA·power + BETA·(mem_used / mem_total)`.
fn power_score(weights: &ScoringWeights, node: &NodeInfo, load: &NodeLoad) -> f64 {
    weights.alpha * power_draw(weights, node, load) + weights.beta * load.memory_pressure()
}

/// `ALPHA·tx + BETA·rx`, plus `write / read` when the node reads at all.
fn performance_score(weights: &ScoringWeights, load: &NodeLoad) -> f64 {
    let throughput =
        weights.alpha * load.tx_bytes_per_second + weights.beta * load.rx_bytes_per_second;
    if load.disk_read_speed > 0.0 {
        throughput + load.disk_write_speed / load.disk_read_speed
    } else {
        throughput
    }
}

/// Device is usable for this stage on this node.
fn usable(node: &NodeInfo, req: &StageRequirement, device: DeviceCandidate) -> bool {
    req.allows(device) && node.has_device(device)
}

fn idle_npu(node: &NodeInfo, load: &NodeLoad, req: &StageRequirement) -> bool {
    usable(node, req, DeviceCandidate::Npu) && load.npu_utilization == 0.0
}

/// Power and memory aware placement for continuous low-duty monitoring.
#[derive(Debug, Clone)]
pub struct MonitoringPolicy {
    weights: ScoringWeights,
    stages: PolicyStages,
}

impl MonitoringPolicy {
    pub fn new(weights: ScoringWeights, stages: PolicyStages) -> Self {
        Self { weights, stages }
    }
}

impl ScoringPolicy for MonitoringPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Monitoring
    }

    fn objective(&self) -> Objective {
        Objective::Minimize
    }

    fn needs_network(&self) -> bool {
        false
    }

    fn requirement(&self, stage: Stage) -> &StageRequirement {
        self.stages.stage(stage)
    }

    fn evaluate(&self, node: &NodeInfo, load: &NodeLoad, stage: Stage) -> Evaluation {
        let req = self.requirement(stage);
        let score = power_score(&self.weights, node, load);

        let device = if idle_npu(node, load, req) {
            DeviceCandidate::Npu
        } else if usable(node, req, DeviceCandidate::Gpu)
            && load.gpu_utilization <= load.cpu_utilization
        {
            DeviceCandidate::Gpu
        } else {
            DeviceCandidate::Cpu
        };

        Evaluation { score, device }
    }
}

/// Throughput aware placement for latency-sensitive actuation.
#[derive(Debug, Clone)]
pub struct ActuatorPolicy {
    weights: ScoringWeights,
    stages: PolicyStages,
}

impl ActuatorPolicy {
    pub fn new(weights: ScoringWeights, stages: PolicyStages) -> Self {
        Self { weights, stages }
    }
}

impl ScoringPolicy for ActuatorPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Actuator
    }

    fn objective(&self) -> Objective {
        Objective::Maximize
    }

    fn needs_network(&self) -> bool {
        true
    }

    fn requirement(&self, stage: Stage) -> &StageRequirement {
        self.stages.stage(stage)
    }

    fn evaluate(&self, node: &NodeInfo, load: &NodeLoad, stage: Stage) -> Evaluation {
        let req = self.requirement(stage);
        let score = performance_score(&self.weights, load);
        let gpu_busy = self.weights.gpu_busy_threshold / 100.0;

        let device = if usable(node, req, DeviceCandidate::Gpu) && load.gpu_utilization < gpu_busy {
            DeviceCandidate::Gpu
        } else if idle_npu(node, load, req) {
            DeviceCandidate::Npu
        } else {
            DeviceCandidate::Cpu
        };

        Evaluation { score, device }
    }
}

/// Throughput per unit of power, for when neither dominates.
#[derive(Debug, Clone)]
pub struct OptimumPolicy {
    weights: ScoringWeights,
    stages: PolicyStages,
}

impl OptimumPolicy {
    pub fn new(weights: ScoringWeights, stages: PolicyStages) -> Self {
        Self { weights, stages }
    }
}

impl ScoringPolicy for OptimumPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Optimum
    }

    fn objective(&self) -> Objective {
        Objective::Maximize
    }

    fn needs_network(&self) -> bool {
        true
    }

    fn requirement(&self, stage: Stage) -> &StageRequirement {
        self.stages.stage(stage)
    }

    fn evaluate(&self, node: &NodeInfo, load: &NodeLoad, stage: Stage) -> Evaluation {
        let req = self.requirement(stage);
        let performance = performance_score(&self.weights, load);
        let power = power_score(&self.weights, node, load).max(MIN_POWER);

        // Ties keep the earlier entry: NPU, then CPU, then GPU.
        let mut device = DeviceCandidate::Cpu;
        let mut lowest = load.cpu_utilization;
        if idle_npu(node, load, req) {
            device = DeviceCandidate::Npu;
            lowest = load.npu_utilization;
        }
        if usable(node, req, DeviceCandidate::Gpu) && load.gpu_utilization < lowest {
            device = DeviceCandidate::Gpu;
        }

        Evaluation {
            score: performance / power,
            device,
        }
    }
}
