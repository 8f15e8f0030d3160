//! Placement engine: reduces per-node evaluations to one assignment.
//!
//! Candidates are ranked best-first under the policy's objective. Equal
//! scores prefer the candidate recommending an accelerator (NPU, then GPU,
//! then CPU) and then the lexicographically smallest node id, so the same
//! telemetry always yields the same assignment.

use tracing::warn;

use wadas_core::{Assignment, DeviceCandidate};

use crate::scorer::{Evaluation, Objective};

/// One node's evaluation for a stage.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub node_id: String,
    pub evaluation: Evaluation,
}

impl Candidate {
    pub fn new(node_id: impl Into<String>, evaluation: Evaluation) -> Self {
        Self {
            node_id: node_id.into(),
            evaluation,
        }
    }

    fn into_assignment(self) -> Assignment {
        Assignment {
            node_id: self.node_id,
            device: self.evaluation.device,
            score: self.evaluation.score,
        }
    }
}

/// Rank candidates best-first. Non-finite scores are dropped.
pub fn rank_candidates<I>(objective: Objective, candidates: I) -> Vec<Assignment>
where
    I: IntoIterator<Item = Candidate>,
{
    let mut ranked: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| {
            let finite = c.evaluation.score.is_finite();
            if !finite {
                warn!(
                    node_id = %c.node_id,
                    score = c.evaluation.score,
                    "discarding non-finite score"
                );
            }
            finite
        })
        .collect();

    ranked.sort_by(|a, b| {
        objective
            .compare(a.evaluation.score, b.evaluation.score)
            .then_with(|| offload_rank(a.evaluation.device).cmp(&offload_rank(b.evaluation.device)))
            .then_with(|| a.node_id.cmp(&b.node_id))
    });

    ranked.into_iter().map(Candidate::into_assignment).collect()
}

fn offload_rank(device: DeviceCandidate) -> u8 {
    match device {
        DeviceCandidate::Npu => 0,
        DeviceCandidate::Gpu => 1,
        DeviceCandidate::Cpu => 2,
    }
}
