//! wadas-cluster: node discovery for the WADAS scheduler.
//!
//! The scheduler never tracks membership itself. Each scheduling call
//! asks a [`ClusterManager`] for the current members and keeps the alive
//! ones.
//!
//! # Architecture
//!
//! ```text
//! NodeDirectory
//!   └── ClusterManager (external collaborator)
//!       └── StaticInventory ← [[nodes]] in wadas.toml
//! ```

pub mod directory;

pub use directory::{
    ClusterError, ClusterManager, ClusterResult, Member, MemberStatus, MembersFuture,
    NodeDirectory, StaticInventory,
};
