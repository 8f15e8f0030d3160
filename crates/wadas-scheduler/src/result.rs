//! Outcome of one scheduling call.

use std::fmt;

use serde::Serialize;

use wadas_core::{Assignment, PolicyKind, Stage};

use crate::error::SchedulerResult;

/// Independent detection and classification decisions.
///
/// Each stage either holds its best assignment or the reason none exists;
/// one stage failing never hides the other's result.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingResult {
    pub policy: PolicyKind,
    pub detection: SchedulerResult<Assignment>,
    pub classification: SchedulerResult<Assignment>,
    rankings: [Vec<Assignment>; 2],
}

impl SchedulingResult {
    pub(crate) fn new(
        policy: PolicyKind,
        detection: Vec<Assignment>,
        classification: Vec<Assignment>,
    ) -> Self {
        use crate::error::SchedulerError::NoEligibleNode;

        let best = |ranking: &[Assignment], stage| {
            ranking.first().cloned().ok_or(NoEligibleNode { stage })
        };
        Self {
            policy,
            detection: best(&detection, Stage::Detection),
            classification: best(&classification, Stage::Classification),
            rankings: [detection, classification],
        }
    }

    pub fn assignment(&self, stage: Stage) -> &SchedulerResult<Assignment> {
        match stage {
            Stage::Detection => &self.detection,
            Stage::Classification => &self.classification,
        }
    }

    /// Every scored candidate for `stage`, best first.
    pub fn ranking(&self, stage: Stage) -> &[Assignment] {
        match stage {
            Stage::Detection => &self.rankings[0],
            Stage::Classification => &self.rankings[1],
        }
    }

    pub fn is_complete(&self) -> bool {
        self.detection.is_ok() && self.classification.is_ok()
    }

    /// Serializable view for dispatchers and the CLI.
    pub fn report(&self) -> SchedulingReport {
        SchedulingReport {
            policy: self.policy,
            detection: StageReport::new(self, Stage::Detection),
            classification: StageReport::new(self, Stage::Classification),
        }
    }
}

impl fmt::Display for SchedulingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "policy: {}", self.policy)?;
        for stage in Stage::ALL {
            match self.assignment(stage) {
                Ok(a) => writeln!(f, "{stage}: {a}")?,
                Err(e) => writeln!(f, "{stage}: {e}")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulingReport {
    pub policy: PolicyKind,
    pub detection: StageReport,
    pub classification: StageReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub ranking: Vec<Assignment>,
}

impl StageReport {
    fn new(result: &SchedulingResult, stage: Stage) -> Self {
        let (assignment, error) = match result.assignment(stage) {
            Ok(a) => (Some(a.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            assignment,
            error,
            ranking: result.ranking(stage).to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchedulerError;
    use wadas_core::DeviceCandidate;

    fn assignment(id: &str, score: f64) -> Assignment {
        Assignment {
            node_id: id.to_string(),
            device: DeviceCandidate::Cpu,
            score,
        }
    }

    #[test]
    fn best_is_first_of_ranking() {
        let r = SchedulingResult::new(
            PolicyKind::Monitoring,
            vec![assignment("a", 0.1), assignment("b", 0.2)],
            vec![],
        );
        assert_eq!(r.detection.as_ref().unwrap().node_id, "a");
        assert_eq!(
            r.classification,
            Err(SchedulerError::NoEligibleNode {
                stage: Stage::Classification
            })
        );
        assert_eq!(r.ranking(Stage::Detection).len(), 2);
        assert!(!r.is_complete());
    }

    #[test]
    fn report_serializes_errors_per_stage() {
        let r = SchedulingResult::new(PolicyKind::Actuator, vec![assignment("a", 3.0)], vec![]);
        let json = serde_json::to_value(r.report()).unwrap();

        assert_eq!(json["policy"], "actuator");
        assert_eq!(json["detection"]["assignment"]["node_id"], "a");
        assert_eq!(json["detection"]["assignment"]["device"], "CPU");
        assert!(json["detection"].get("error").is_none());
        assert_eq!(
            json["classification"]["error"],
            "no eligible node for the classification stage"
        );
    }

    #[test]
    fn display_lists_both_stages() {
        let r = SchedulingResult::new(
            PolicyKind::Optimum,
            vec![assignment("a", 3.0)],
            vec![assignment("b", 1.5)],
        );
        let text = r.to_string();
        assert!(text.contains("detection: a on CPU"));
        assert!(text.contains("classification: b on CPU"));
    }
}
