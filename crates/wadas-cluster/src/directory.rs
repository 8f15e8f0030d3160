//! Node directory: the current set of schedulable cluster nodes.
//!
//! Wraps a [`ClusterManager`] collaborator and reduces its member list to
//! the alive nodes, keyed by node id. The directory never fails: if the
//! collaborator cannot be queried, scheduling sees an empty cluster.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use wadas_core::{NodeEntry, NodeInfo};

/// Result type alias for cluster manager queries.
pub type ClusterResult<T> = Result<T, ClusterError>;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster manager unavailable: {0}")]
    Unavailable(String),
}

/// Liveness of a node as seen by the cluster manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Alive,
    Dead,
}

/// One node as reported by the cluster manager.
#[derive(Debug, Clone)]
pub struct Member {
    pub node_id: String,
    pub address: String,
    pub metrics_port: u16,
    pub status: MemberStatus,
    pub resources: BTreeMap<String, f64>,
}

impl Member {
    fn into_node_info(self) -> NodeInfo {
        let resources = self
            .resources
            .into_iter()
            .map(|(name, capacity)| {
                let capacity = if capacity.is_finite() { capacity.max(0.0) } else { 0.0 };
                (name, capacity)
            })
            .collect();

        NodeInfo {
            id: self.node_id,
            ip: self.address,
            metrics_port: self.metrics_port,
            resources,
        }
    }
}

/// Boxed future returned by [`ClusterManager::members`].
pub type MembersFuture<'a> = Pin<Box<dyn Future<Output = ClusterResult<Vec<Member>>> + Send + 'a>>;

/// External cluster resource manager: node liveness, resources, IP and
/// metrics-export port.
pub trait ClusterManager: Send + Sync {
    fn members(&self) -> MembersFuture<'_>;
}

/// A fixed node list, typically the `[[nodes]]` table of the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    members: Vec<Member>,
}

impl StaticInventory {
    pub fn new(members: Vec<Member>) -> Self {
        Self { members }
    }

    pub fn from_entries(entries: &[NodeEntry]) -> Self {
        let members = entries
            .iter()
            .map(|e| Member {
                node_id: e.id.clone(),
                address: e.address.clone(),
                metrics_port: e.metrics_port,
                status: if e.alive {
                    MemberStatus::Alive
                } else {
                    MemberStatus::Dead
                },
                resources: e.resources.clone(),
            })
            .collect();
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl ClusterManager for StaticInventory {
    fn members(&self) -> MembersFuture<'_> {
        let members = self.members.clone();
        Box::pin(async move { Ok(members) })
    }
}

/// Lists the nodes currently eligible for scheduling.
#[derive(Clone)]
pub struct NodeDirectory {
    manager: Arc<dyn ClusterManager>,
}

impl NodeDirectory {
    pub fn new(manager: Arc<dyn ClusterManager>) -> Self {
        Self { manager }
    }

    /// Alive nodes keyed by id, freshly queried on every call.
    pub async fn list_nodes(&self) -> BTreeMap<String, NodeInfo> {
        let members = match self.manager.members().await {
            Ok(members) => members,
            Err(e) => {
                warn!(error = %e, "cluster manager query failed, no nodes available");
                return BTreeMap::new();
            }
        };

        let mut nodes = BTreeMap::new();
        for member in members {
            if member.status != MemberStatus::Alive {
                debug!(node_id = %member.node_id, "skipping dead node");
                continue;
            }
            let node = member.into_node_info();
            nodes.insert(node.id.clone(), node);
        }

        debug!(count = nodes.len(), "listed alive nodes");
        nodes
    }
}

impl std::fmt::Debug for NodeDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDirectory").finish_non_exhaustive()
    }
}
