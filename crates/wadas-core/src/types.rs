//! Shared types used across the WADAS scheduler crates.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A compute unit an inference stage can run on.
///
/// Only GPU and NPU are advertised as node resources; CPU is always
/// implicitly available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceCandidate {
    Cpu,
    Gpu,
    Npu,
}

impl DeviceCandidate {
    pub const ALL: [DeviceCandidate; 3] =
        [DeviceCandidate::Cpu, DeviceCandidate::Gpu, DeviceCandidate::Npu];

    /// Resource name the cluster manager advertises for this device.
    pub fn resource_name(&self) -> &'static str {
        match self {
            DeviceCandidate::Cpu => "CPU",
            DeviceCandidate::Gpu => "GPU",
            DeviceCandidate::Npu => "NPU",
        }
    }
}

impl fmt::Display for DeviceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_name())
    }
}

impl FromStr for DeviceCandidate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CPU" => Ok(DeviceCandidate::Cpu),
            "GPU" => Ok(DeviceCandidate::Gpu),
            "NPU" => Ok(DeviceCandidate::Npu),
            other => Err(format!("unknown device: {other}")),
        }
    }
}

/// One of the two independently scheduled inference phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Detection,
    Classification,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::Detection, Stage::Classification];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Detection => "detection",
            Stage::Classification => "classification",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating mode, selecting which scoring policy drives the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Power and memory aware; lowest score wins.
    Monitoring,
    /// Network and disk throughput aware; highest score wins.
    Actuator,
    /// Throughput per unit of power; highest score wins.
    Optimum,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Monitoring => "monitoring",
            PolicyKind::Actuator => "actuator",
            PolicyKind::Optimum => "optimum",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "monitoring" => Ok(PolicyKind::Monitoring),
            "actuator" => Ok(PolicyKind::Actuator),
            "optimum" => Ok(PolicyKind::Optimum),
            other => Err(format!("unknown policy: {other}")),
        }
    }
}

/// A cluster node as reported by the cluster resource manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: String,
    pub ip: String,
    pub metrics_port: u16,
    /// Resource name → advertised capacity units (not utilization).
    pub resources: BTreeMap<String, f64>,
}

impl NodeInfo {
    /// Advertised capacity for a resource pool, clamped to be non-negative.
    pub fn capacity(&self, resource: &str) -> f64 {
        self.resources
            .get(resource)
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
            .max(0.0)
    }

    /// Whether the node can run work on `device`. CPU is always available.
    pub fn has_device(&self, device: DeviceCandidate) -> bool {
        match device {
            DeviceCandidate::Cpu => true,
            other => self.capacity(other.resource_name()) > 0.0,
        }
    }

    /// URL of the node's primary cluster metrics endpoint.
    pub fn metrics_url(&self) -> String {
        format!("http://{}:{}/metrics", self.ip, self.metrics_port)
    }
}

/// Normalized live telemetry for one node.
///
/// Utilizations are fractions in `0.0..=1.0`; the exporters publish
/// percentages and the probe layer divides by 100. Absent metrics are 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeLoad {
    pub cpu_utilization: f64,
    pub gpu_utilization: f64,
    pub npu_utilization: f64,
    pub mem_used: f64,
    pub mem_total: f64,
    pub disk_read_speed: f64,
    pub disk_write_speed: f64,
    pub tx_bytes_per_second: f64,
    pub rx_bytes_per_second: f64,
}

impl NodeLoad {
    /// Memory pressure in `0.0..`, with the total floored to 1.
    pub fn memory_pressure(&self) -> f64 {
        self.mem_used / self.mem_total.max(1.0)
    }
}

/// The scheduler's decision for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub node_id: String,
    pub device: DeviceCandidate,
    pub score: f64,
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {} (score {:.4})", self.node_id, self.device, self.score)
    }
}
