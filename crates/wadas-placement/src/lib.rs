//! WADAS placement: node scoring policies and best-node selection.
//!
//! This crate is pure: it never performs I/O. Given a node, its normalized
//! telemetry and a stage, a policy produces a score and a recommended
//! device; the placer reduces those to the best assignment.
//!
//! # Components
//!
//! - **`scorer`**: the `ScoringPolicy` trait and its monitoring, actuator
//!   and optimum variants
//! - **`placer`**: ranking with deterministic tie-breaking

pub mod placer;
pub mod scorer;

pub use placer::{Candidate, rank_candidates};
pub use scorer::{
    ActuatorPolicy, Evaluation, MIN_POWER, MonitoringPolicy, Objective, OptimumPolicy,
    ScoringPolicy, build_policy,
};
