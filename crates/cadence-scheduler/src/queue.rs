//! The schedule queue: the most recent build cause produced per pipeline.

use cadence_core::buildcause::BuildCause;
use cadence_core::PipelineName;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Holds the most recently produced build cause for each pipeline.
///
/// Replacement is last-writer-wins, keyed strictly by pipeline name, with no
/// merge semantics. Safe under concurrent read/replace from the auto-poll,
/// manual, and timer paths.
pub struct PipelineScheduleQueue {
    causes: RwLock<HashMap<PipelineName, BuildCause>>,
}

impl PipelineScheduleQueue {
    pub fn new() -> Self {
        Self {
            causes: RwLock::new(HashMap::new()),
        }
    }

    /// The most recently scheduled cause for a pipeline, or the never-run
    /// sentinel.
    pub async fn most_recent_scheduled(&self, pipeline: &PipelineName) -> BuildCause {
        self.causes
            .read()
            .await
            .get(pipeline)
            .cloned()
            .unwrap_or_else(BuildCause::never_run)
    }

    /// Replace the stored cause for a pipeline.
    pub async fn schedule(&self, pipeline: &PipelineName, cause: BuildCause) {
        self.causes.write().await.insert(pipeline.clone(), cause);
    }

    /// Idempotence check: has exactly this cause already been scheduled?
    pub async fn is_already_scheduled(&self, pipeline: &PipelineName, cause: &BuildCause) -> bool {
        self.causes
            .read()
            .await
            .get(pipeline)
            .is_some_and(|scheduled| scheduled == cause)
    }
}

impl Default for PipelineScheduleQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::buildcause::AUTO_APPROVER;
    use cadence_core::config::MaterialConfig;
    use cadence_core::material::{Material, Modification};
    use cadence_core::revision::{MaterialRevision, MaterialRevisions};
    use chrono::DateTime;

    fn cause(revision: &str) -> BuildCause {
        let material = Material::new(MaterialConfig::Git {
            url: "https://example.com/repo.git".to_string(),
            branch: "master".to_string(),
            username: None,
        });
        // Fixed timestamp so two causes built from the same revision compare
        // equal; `Utc::now()` would make the fixture nondeterministic.
        let modified_time = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let revisions: MaterialRevisions = [MaterialRevision::new(
            material,
            vec![Modification::new(revision, modified_time)],
        )]
        .into_iter()
        .collect();
        BuildCause::with_modifications(revisions, AUTO_APPROVER)
    }

    #[tokio::test]
    async fn test_unknown_pipeline_yields_never_run_sentinel() {
        let queue = PipelineScheduleQueue::new();
        let scheduled = queue.most_recent_scheduled(&"p1".into()).await;
        assert!(scheduled.has_never_run());
    }

    #[tokio::test]
    async fn test_round_trip_until_superseded() {
        let queue = PipelineScheduleQueue::new();
        let name = PipelineName::new("p1");

        queue.schedule(&name, cause("r5")).await;
        assert_eq!(queue.most_recent_scheduled(&name).await, cause("r5"));

        queue.schedule(&name, cause("r6")).await;
        assert_eq!(queue.most_recent_scheduled(&name).await, cause("r6"));
    }

    #[tokio::test]
    async fn test_is_already_scheduled_compares_exact_cause() {
        let queue = PipelineScheduleQueue::new();
        let name = PipelineName::new("p1");
        queue.schedule(&name, cause("r5")).await;
        assert!(queue.is_already_scheduled(&name, &cause("r5")).await);
        assert!(!queue.is_already_scheduled(&name, &cause("r6")).await);
    }

    #[tokio::test]
    async fn test_pipelines_do_not_interfere() {
        let queue = PipelineScheduleQueue::new();
        queue.schedule(&"p1".into(), cause("r5")).await;
        assert!(queue.most_recent_scheduled(&"p2".into()).await.has_never_run());
    }
}
