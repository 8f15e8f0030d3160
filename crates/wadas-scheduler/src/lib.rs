//! wadas-scheduler: cluster-aware placement of the two inference stages.
//!
//! Given a scoring policy, decides which node and which device (CPU, GPU,
//! NPU) runs detection and which runs classification, from live telemetry.
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   ├── NodeDirectory (alive nodes + advertised resources)
//!   ├── NodeProber (primary metrics + GPU/NPU/network probes, fan-out)
//!   └── ScoringPolicy (monitoring | actuator | optimum)
//!       └── rank_candidates (best-first, ties by node id)
//! ```

pub mod error;
pub mod result;
pub mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use result::{SchedulingReport, SchedulingResult, StageReport};
pub use scheduler::Scheduler;
