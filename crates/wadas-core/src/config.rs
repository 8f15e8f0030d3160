//! wadas.toml configuration parser.
//!
//! Every section is optional; an empty file yields the stock tunables
//! (ALPHA 0.7, BETA 0.3, power weights CPU 4 / GPU 8 / NPU 2, exporter
//! ports 8000/8002/8004).

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DeviceCandidate, PolicyKind, Stage};

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for {field}: {value:?}")]
    Duration { field: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub scheduler: SchedulerSettings,
    pub metrics: MetricNames,
    pub probes: ProbeSettings,
    pub weights: ScoringWeights,
    pub policies: PolicySettings,
    /// Static node inventory, used when no live cluster manager is wired in.
    pub nodes: Vec<NodeEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Timeout applied to every individual HTTP scrape.
    pub scrape_timeout: String,
    /// Upper bound for one whole `select` call.
    pub deadline: String,
    /// Maximum in-flight node telemetry collections. 0 means one per node.
    pub max_concurrency: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            scrape_timeout: "2s".to_string(),
            deadline: "5s".to_string(),
            max_concurrency: 0,
        }
    }
}

impl SchedulerSettings {
    pub fn scrape_timeout(&self) -> Duration {
        parse_duration(&self.scrape_timeout).unwrap_or(Duration::from_secs(2))
    }

    pub fn deadline(&self) -> Duration {
        parse_duration(&self.deadline).unwrap_or(Duration::from_secs(5))
    }
}

/// Metric names scraped from the exporters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricNames {
    pub cpu_utilization: String,
    pub mem_total: String,
    pub mem_used: String,
    pub disk_write_speed: String,
    pub disk_read_speed: String,
    pub npu_utilization: String,
    pub gpu_utilization: String,
    pub network_tx: String,
    pub network_rx: String,
}

impl Default for MetricNames {
    fn default() -> Self {
        Self {
            cpu_utilization: "ray_node_cpu_utilization".to_string(),
            mem_total: "ray_node_mem_total".to_string(),
            mem_used: "ray_node_mem_used".to_string(),
            disk_write_speed: "ray_node_disk_io_write_speed".to_string(),
            disk_read_speed: "ray_node_disk_io_read_speed".to_string(),
            npu_utilization: "npu_utilization".to_string(),
            gpu_utilization: "gpu_utilization".to_string(),
            network_tx: "network_tx_bytes_per_second".to_string(),
            network_rx: "network_rx_bytes_per_second".to_string(),
        }
    }
}

impl MetricNames {
    /// Names read from a node's primary metrics endpoint.
    pub fn cluster_targets(&self) -> HashSet<String> {
        [
            &self.cpu_utilization,
            &self.mem_total,
            &self.mem_used,
            &self.disk_write_speed,
            &self.disk_read_speed,
        ]
        .into_iter()
        .cloned()
        .collect()
    }

    pub fn network_targets(&self) -> HashSet<String> {
        [self.network_tx.clone(), self.network_rx.clone()].into_iter().collect()
    }
}

/// A fixed per-node side-car exporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeEndpoint {
    pub port: u16,
    #[serde(default = "default_probe_path")]
    pub path: String,
}

fn default_probe_path() -> String {
    "/".to_string()
}

impl ProbeEndpoint {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            path: default_probe_path(),
        }
    }

    pub fn url(&self, ip: &str) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("http://{ip}:{}{path}", self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub npu: ProbeEndpoint,
    pub gpu: ProbeEndpoint,
    pub network: ProbeEndpoint,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            npu: ProbeEndpoint::new(8000),
            gpu: ProbeEndpoint::new(8002),
            network: ProbeEndpoint::new(8004),
        }
    }
}

/// Relative power draw per unit of device utilization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerCoefficients {
    pub cpu: f64,
    pub gpu: f64,
    pub npu: f64,
}

impl Default for PowerCoefficients {
    fn default() -> Self {
        Self {
            cpu: 4.0,
            gpu: 8.0,
            npu: 2.0,
        }
    }
}

/// Weights shared by the scoring policies.
///
/// `alpha` weighs power (monitoring) or upload bandwidth (actuator);
/// `beta` weighs memory (monitoring) or download bandwidth (actuator).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub alpha: f64,
    pub beta: f64,
    pub power: PowerCoefficients,
    /// GPU utilization percentage at or above which the actuator policy
    /// stops placing work on the GPU.
    pub gpu_busy_threshold: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            alpha: 0.7,
            beta: 0.3,
            power: PowerCoefficients::default(),
            gpu_busy_threshold: 70.0,
        }
    }
}

/// What a node must offer to be considered for one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRequirement {
    /// Resource pool whose capacity is compared against `min_cores`.
    pub resource: String,
    /// Capacity must be strictly greater than this.
    pub min_cores: f64,
    /// Devices the stage may be placed on. CPU is always kept as fallback.
    pub devices: Vec<DeviceCandidate>,
}

impl Default for StageRequirement {
    fn default() -> Self {
        Self {
            resource: "CPU".to_string(),
            min_cores: 0.0,
            devices: DeviceCandidate::ALL.to_vec(),
        }
    }
}

impl StageRequirement {
    fn with(min_cores: f64, devices: &[DeviceCandidate]) -> Self {
        Self {
            resource: "CPU".to_string(),
            min_cores,
            devices: devices.to_vec(),
        }
    }

    pub fn allows(&self, device: DeviceCandidate) -> bool {
        device == DeviceCandidate::Cpu || self.devices.contains(&device)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyStages {
    pub detection: StageRequirement,
    pub classification: StageRequirement,
}

impl PolicyStages {
    fn with_min_cores(min_cores: f64) -> Self {
        use DeviceCandidate::*;
        Self {
            detection: StageRequirement::with(min_cores, &[Cpu, Gpu, Npu]),
            classification: StageRequirement::with(min_cores, &[Cpu, Gpu]),
        }
    }

    pub fn stage(&self, stage: Stage) -> &StageRequirement {
        match stage {
            Stage::Detection => &self.detection,
            Stage::Classification => &self.classification,
        }
    }
}

/// Per-policy stage requirements. Keys left out of a `[policies.*]` table
/// keep that policy's own default rather than the generic one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PolicyOverrides")]
pub struct PolicySettings {
    pub monitoring: PolicyStages,
    pub actuator: PolicyStages,
    pub optimum: PolicyStages,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            monitoring: PolicyStages::with_min_cores(3.0),
            actuator: PolicyStages::with_min_cores(4.0),
            optimum: PolicyStages::with_min_cores(4.0),
        }
    }
}

impl PolicySettings {
    pub fn for_kind(&self, kind: PolicyKind) -> &PolicyStages {
        match kind {
            PolicyKind::Monitoring => &self.monitoring,
            PolicyKind::Actuator => &self.actuator,
            PolicyKind::Optimum => &self.optimum,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StageOverride {
    resource: Option<String>,
    min_cores: Option<f64>,
    devices: Option<Vec<DeviceCandidate>>,
}

impl StageOverride {
    fn apply(self, req: &mut StageRequirement) {
        if let Some(resource) = self.resource {
            req.resource = resource;
        }
        if let Some(min_cores) = self.min_cores {
            req.min_cores = min_cores;
        }
        if let Some(devices) = self.devices {
            req.devices = devices;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StagesOverride {
    detection: StageOverride,
    classification: StageOverride,
}

impl StagesOverride {
    fn apply(self, stages: &mut PolicyStages) {
        self.detection.apply(&mut stages.detection);
        self.classification.apply(&mut stages.classification);
    }
}

/// `[policies]` as written in the file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PolicyOverrides {
    monitoring: StagesOverride,
    actuator: StagesOverride,
    optimum: StagesOverride,
}

impl From<PolicyOverrides> for PolicySettings {
    fn from(overrides: PolicyOverrides) -> Self {
        let mut settings = PolicySettings::default();
        overrides.monitoring.apply(&mut settings.monitoring);
        overrides.actuator.apply(&mut settings.actuator);
        overrides.optimum.apply(&mut settings.optimum);
        settings
    }
}

/// One `[[nodes]]` entry of the static inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: String,
    pub address: String,
    pub metrics_port: u16,
    #[serde(default)]
    pub resources: BTreeMap<String, f64>,
    #[serde(default = "default_alive")]
    pub alive: bool,
}

fn default_alive() -> bool {
    true
}

impl SchedulerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: SchedulerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scorer cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        let durations = [
            ("scheduler.scrape_timeout", &self.scheduler.scrape_timeout),
            ("scheduler.deadline", &self.scheduler.deadline),
        ];
        for (field, value) in durations {
            match parse_duration(value) {
                Some(d) if !d.is_zero() => {}
                _ => {
                    return Err(ConfigError::Duration {
                        field,
                        value: value.clone(),
                    });
                }
            }
        }

        let w = &self.weights;
        let weights = [
            ("alpha", w.alpha),
            ("beta", w.beta),
            ("power.cpu", w.power.cpu),
            ("power.gpu", w.power.gpu),
            ("power.npu", w.power.npu),
            ("gpu_busy_threshold", w.gpu_busy_threshold),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "weights.{name} must be a non-negative number, got {value}"
                )));
            }
        }

        for kind in [PolicyKind::Monitoring, PolicyKind::Actuator, PolicyKind::Optimum] {
            for stage in Stage::ALL {
                let req = self.policies.for_kind(kind).stage(stage);
                if !req.min_cores.is_finite() || req.min_cores < 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "policies.{kind}.{stage}.min_cores must be >= 0"
                    )));
                }
            }
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate node id: {}", node.id)));
            }
        }

        Ok(())
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = SchedulerConfig::from_toml_str("").unwrap();
        assert_eq!(config.weights.alpha, 0.7);
        assert_eq!(config.weights.power.gpu, 8.0);
        assert_eq!(config.probes.npu.port, 8000);
        assert_eq!(config.probes.network.port, 8004);
        assert_eq!(config.scheduler.scrape_timeout(), Duration::from_secs(2));
        assert_eq!(config.policies.monitoring.detection.min_cores, 3.0);
        assert_eq!(config.policies.actuator.classification.min_cores, 4.0);
        assert!(config.nodes.is_empty());
    }

    #[test]
    fn parse_full_file() {
        let toml_str = r#"
[scheduler]
scrape_timeout = "500ms"
deadline = "3s"
max_concurrency = 4

[weights]
alpha = 0.5
beta = 0.5

[weights.power]
gpu = 10.0

[probes.gpu]
port = 9402
path = "/metrics"

[policies.monitoring.classification]
min_cores = 1
devices = ["CPU"]

[[nodes]]
id = "edge-1"
address = "192.168.1.20"
metrics_port = 44217
resources = { CPU = 8, NPU = 1 }
"#;
        let config = SchedulerConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.scheduler.scrape_timeout(), Duration::from_millis(500));
        assert_eq!(config.scheduler.max_concurrency, 4);
        assert_eq!(config.weights.power.gpu, 10.0);
        assert_eq!(config.weights.power.cpu, 4.0);
        assert_eq!(config.probes.gpu.url("10.0.0.1"), "http://10.0.0.1:9402/metrics");

        let class = &config.policies.monitoring.classification;
        assert_eq!(class.devices, vec![DeviceCandidate::Cpu]);
        assert!(!class.allows(DeviceCandidate::Gpu));
        let detect = &config.policies.monitoring.detection;
        assert_eq!(detect.min_cores, 3.0);
        assert_eq!(detect.devices, DeviceCandidate::ALL.to_vec());
        assert_eq!(config.policies.optimum.classification.min_cores, 4.0);

        assert_eq!(config.nodes.len(), 1);
        assert!(config.nodes[0].alive);
        assert_eq!(config.nodes[0].resources.get("NPU"), Some(&1.0));
    }

    #[test]
    fn rejects_negative_weight() {
        let err = SchedulerConfig::from_toml_str("[weights]\nalpha = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_duration() {
        let err = SchedulerConfig::from_toml_str("[scheduler]\ndeadline = \"soon\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Duration { .. }));
    }

    #[test]
    fn partial_stage_table_keeps_policy_defaults() {
        let toml_str = r#"
[policies.actuator.detection]
devices = ["CPU", "NPU"]

[policies.optimum.classification]
min_cores = 8
"#;
        let config = SchedulerConfig::from_toml_str(toml_str).unwrap();
        let actuator = &config.policies.actuator;
        assert_eq!(actuator.detection.min_cores, 4.0);
        assert_eq!(actuator.detection.resource, "CPU");
        assert!(!actuator.detection.allows(DeviceCandidate::Gpu));
        assert_eq!(actuator.classification.min_cores, 4.0);
        assert_eq!(
            actuator.classification.devices,
            vec![DeviceCandidate::Cpu, DeviceCandidate::Gpu]
        );

        let optimum = &config.policies.optimum;
        assert_eq!(optimum.classification.min_cores, 8.0);
        assert_eq!(
            optimum.classification.devices,
            vec![DeviceCandidate::Cpu, DeviceCandidate::Gpu]
        );
        assert_eq!(optimum.detection.min_cores, 4.0);
        assert_eq!(config.policies.monitoring, PolicySettings::default().monitoring);
    }

    #[test]
    fn rejects_zero_durations() {
        for body in [
            "[scheduler]\ndeadline = \"0s\"\n",
            "[scheduler]\nscrape_timeout = \"0ms\"\n",
        ] {
            let err = SchedulerConfig::from_toml_str(body).unwrap_err();
            assert!(matches!(err, ConfigError::Duration { .. }), "{body}");
        }
    }

    #[test]
    fn rejects_duplicate_nodes() {
        let toml_str = r#"
[[nodes]]
id = "a"
address = "10.0.0.1"
metrics_port = 1

[[nodes]]
id = "a"
address = "10.0.0.2"
metrics_port = 1
"#;
        assert!(SchedulerConfig::from_toml_str(toml_str).is_err());
    }

    #[test]
    fn cpu_always_allowed() {
        let req = StageRequirement {
            devices: vec![DeviceCandidate::Npu],
            ..Default::default()
        };
        assert!(req.allows(DeviceCandidate::Cpu));
        assert!(req.allows(DeviceCandidate::Npu));
        assert!(!req.allows(DeviceCandidate::Gpu));
    }

    #[test]
    fn probe_url_adds_leading_slash() {
        let probe = ProbeEndpoint {
            port: 8002,
            path: "metrics".to_string(),
        };
        assert_eq!(probe.url("10.1.1.1"), "http://10.1.1.1:8002/metrics");
        assert_eq!(ProbeEndpoint::new(8000).url("10.1.1.1"), "http://10.1.1.1:8000/");
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("fast"), None);
        assert_eq!(parse_duration(&format!("{}m", u64::MAX)), None);
    }

    #[test]
    fn bundled_example_config_is_valid() {
        let config =
            SchedulerConfig::from_toml_str(include_str!("../../../wadas.example.toml")).unwrap();
        assert_eq!(config.nodes.len(), 3);
        assert!(!config.nodes[2].alive);
        assert_eq!(config.policies.monitoring.detection.min_cores, 3.0);
        assert_eq!(config.policies.optimum.detection.min_cores, 4.0);
        assert_eq!(config.weights.gpu_busy_threshold, 70.0);
    }
}
