//! wadas-core: shared types and configuration for the WADAS
//! inference scheduler.

pub mod config;
pub mod types;

pub use config::{
    ConfigError, ConfigResult, MetricNames, NodeEntry, PolicySettings, PolicyStages,
    PowerCoefficients, ProbeEndpoint, ProbeSettings, SchedulerConfig, SchedulerSettings,
    ScoringWeights, StageRequirement, parse_duration,
};
pub use types::*;
