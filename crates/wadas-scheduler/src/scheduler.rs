//! Scheduler: picks the best node and device for each inference stage.
//!
//! One call to [`Scheduler::select`]:
//! - lists the alive nodes from the directory
//! - filters them per stage by the policy's capacity threshold
//! - collects telemetry once per eligible node, concurrently and under a deadline
//! - scores every surviving node per stage and keeps the best
//!
//! The scheduler holds no mutable state; concurrent calls are independent.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use wadas_cluster::{ClusterManager, NodeDirectory};
use wadas_core::{Assignment, NodeInfo, NodeLoad, SchedulerConfig, Stage};
use wadas_metrics::{MetricsClient, NodeProber};
use wadas_placement::{Candidate, ScoringPolicy, rank_candidates};

use crate::result::SchedulingResult;

/// Stateless selection engine over a node directory and a telemetry prober.
#[derive(Debug, Clone)]
pub struct Scheduler {
    directory: NodeDirectory,
    prober: Arc<NodeProber>,
    deadline: Duration,
    /// Concurrent node collections; 0 means one per node.
    max_concurrency: usize,
}

impl Scheduler {
    pub fn new(
        directory: NodeDirectory,
        prober: NodeProber,
        deadline: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            directory,
            prober: Arc::new(prober),
            deadline,
            max_concurrency,
        }
    }

    /// Build a scheduler from configuration, a cluster manager and a metrics client.
    pub fn from_config(
        config: &SchedulerConfig,
        manager: Arc<dyn ClusterManager>,
        client: MetricsClient,
    ) -> Self {
        let settings = &config.scheduler;
        let prober = NodeProber::new(
            client,
            config.metrics.clone(),
            config.probes.clone(),
            settings.scrape_timeout(),
        );
        Self::new(
            NodeDirectory::new(manager),
            prober,
            settings.deadline(),
            settings.max_concurrency,
        )
    }

    /// Select detection and classification placements with the default deadline.
    pub async fn select(&self, policy: &dyn ScoringPolicy) -> SchedulingResult {
        self.select_with_deadline(policy, Instant::now() + self.deadline)
            .await
    }

    /// Select placements, treating nodes whose telemetry is not in by
    /// `deadline` as unreachable.
    pub async fn select_with_deadline(
        &self,
        policy: &dyn ScoringPolicy,
        deadline: Instant,
    ) -> SchedulingResult {
        let nodes = self.directory.list_nodes().await;

        let eligible: BTreeMap<String, NodeInfo> = nodes
            .into_iter()
            .filter(|(_, node)| Stage::ALL.iter().any(|s| policy.is_eligible(node, *s)))
            .collect();
        debug!(policy = %policy.kind(), eligible = eligible.len(), "filtered nodes by capacity");

        let loads = self
            .collect(eligible.values().cloned().collect(), policy.needs_network(), deadline)
            .await;

        let detection = self.rank_stage(policy, Stage::Detection, &eligible, &loads);
        let classification = self.rank_stage(policy, Stage::Classification, &eligible, &loads);
        let result = SchedulingResult::new(policy.kind(), detection, classification);

        for stage in Stage::ALL {
            match result.assignment(stage) {
                Ok(a) => info!(
                    policy = %policy.kind(),
                    %stage,
                    node_id = %a.node_id,
                    device = %a.device,
                    score = a.score,
                    "stage assigned"
                ),
                Err(e) => warn!(policy = %policy.kind(), %stage, error = %e, "stage unassigned"),
            }
        }
        result
    }

    /// Fetch telemetry for every node, bounded by the concurrency limit and
    /// the deadline. Unreachable and late nodes are left out of the map.
    async fn collect(
        &self,
        nodes: Vec<NodeInfo>,
        needs_network: bool,
        deadline: Instant,
    ) -> BTreeMap<String, NodeLoad> {
        let mut loads = BTreeMap::new();
        if nodes.is_empty() {
            return loads;
        }

        let permits = match self.max_concurrency {
            0 => nodes.len(),
            n => n,
        };
        let semaphore = Arc::new(Semaphore::new(permits));

        let mut tasks = JoinSet::new();
        for node in nodes {
            let prober = Arc::clone(&self.prober);
            let sem = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                let load = prober.collect(&node, needs_network).await;
                (node.id, load)
            });
        }

        let drained = tokio::time::timeout_at(deadline, async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((node_id, Ok(load))) => {
                        loads.insert(node_id, load);
                    }
                    Ok((node_id, Err(e))) => {
                        warn!(%node_id, error = %e, "node unreachable, excluding");
                    }
                    Err(e) => {
                        warn!(error = %e, "telemetry task failed");
                    }
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(pending = tasks.len(), "deadline reached, excluding nodes still in flight");
            tasks.abort_all();
        }
        loads
    }

    fn rank_stage(
        &self,
        policy: &dyn ScoringPolicy,
        stage: Stage,
        nodes: &BTreeMap<String, NodeInfo>,
        loads: &BTreeMap<String, NodeLoad>,
    ) -> Vec<Assignment> {
        let candidates = nodes
            .values()
            .filter(|node| policy.is_eligible(node, stage))
            .filter_map(|node| {
                let load = loads.get(&node.id)?;
                let evaluation = policy.evaluate(node, load, stage);
                debug!(
                    %stage,
                    node_id = %node.id,
                    score = evaluation.score,
                    device = %evaluation.device,
                    "evaluated node"
                );
                Some(Candidate::new(node.id.clone(), evaluation))
            });
        rank_candidates(policy.objective(), candidates)
    }
}
