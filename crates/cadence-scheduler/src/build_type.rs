//! Build-type strategies: how each kind of trigger decides whether and what
//! to build.
//!
//! Exactly three variants exist (auto, manual, timed), each a flat strategy
//! object with no shared mutable state, dispatched by the producer.

use crate::config::SchedulerConfig;
use cadence_core::buildcause::{BuildCause, AUTO_APPROVER, TIMER_APPROVER};
use cadence_core::config::{MaterialConfig, PipelineDefinition};
use cadence_core::ids::Fingerprint;
use cadence_core::ports::{DependencyResolver, SchedulingChecker, TriggerKind};
use cadence_core::result::OperationResult;
use cadence_core::revision::MaterialRevisions;
use cadence_core::{Error, PipelineName, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait BuildType: Send + Sync {
    /// The trigger this strategy represents, for the external policy gate.
    fn trigger_kind(&self) -> TriggerKind;

    /// Whether this trigger may schedule at all. Expected ineligibility is
    /// written into the result, never returned as an error.
    async fn can_produce(
        &self,
        pipeline: &PipelineDefinition,
        checker: &dyn SchedulingChecker,
        result: &mut OperationResult,
    ) -> bool {
        let approved = checker
            .can_trigger(pipeline, &self.trigger_kind(), result)
            .await;
        approved && result.can_continue()
    }

    /// Build a cause from changed revisions, or decline.
    async fn on_modifications(
        &self,
        revisions: MaterialRevisions,
        material_configuration_changed: bool,
        original: Option<&MaterialRevisions>,
    ) -> Result<Option<BuildCause>>;

    /// Decide what to do when nothing changed since the previous build.
    fn on_empty_modifications(
        &self,
        pipeline: &PipelineDefinition,
        revisions: MaterialRevisions,
    ) -> Result<Option<BuildCause>>;

    /// Whether the producer should suppress rescheduling when an older run
    /// already used the latest materials.
    fn should_check_whether_older_runs_have_run_with_latest_materials(&self) -> bool;

    /// Final validity gate on a produced cause.
    fn is_valid_build_cause(&self, pipeline: &PipelineDefinition, cause: &BuildCause) -> bool;

    /// Observability hook; called when an attempt ends without scheduling.
    fn notify_pipeline_not_scheduled(&self, pipeline: &PipelineDefinition) {
        debug!(pipeline = %pipeline.name, "pipeline not scheduled");
    }
}

/// Scheduling on behalf of the material poller: build when something
/// changed.
pub struct AutoBuild {
    pipeline: PipelineName,
    dependency_resolver: Arc<dyn DependencyResolver>,
    enforce_upstream_compatibility: bool,
    check_older_runs: bool,
}

impl AutoBuild {
    pub fn new(
        pipeline: PipelineName,
        dependency_resolver: Arc<dyn DependencyResolver>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            pipeline,
            dependency_resolver,
            enforce_upstream_compatibility: config.enforce_upstream_compatibility,
            check_older_runs: config.check_older_runs_with_latest_materials,
        }
    }
}

#[async_trait]
impl BuildType for AutoBuild {
    fn trigger_kind(&self) -> TriggerKind {
        TriggerKind::Auto
    }

    async fn on_modifications(
        &self,
        revisions: MaterialRevisions,
        _material_configuration_changed: bool,
        _original: Option<&MaterialRevisions>,
    ) -> Result<Option<BuildCause>> {
        if revisions.is_empty() {
            return Err(Error::Internal(format!(
                "cannot produce a build cause for '{}' from an empty revision set",
                self.pipeline
            )));
        }

        let has_dependency = revisions.iter().any(|r| r.material().is_dependency());
        if !has_dependency {
            if !revisions.iter().any(|r| r.is_changed()) {
                return Ok(None);
            }
            return Ok(Some(BuildCause::with_modifications(revisions, AUTO_APPROVER)));
        }

        // With upstream compatibility enforcement off, only a change on a
        // first-order (non-dependency) material schedules.
        let first_order_changed = revisions
            .iter()
            .any(|r| r.is_changed() && !r.material().is_dependency());
        if !self.enforce_upstream_compatibility && !first_order_changed {
            debug!(pipeline = %self.pipeline, "only dependency materials changed; skipping");
            return Ok(None);
        }
        if !revisions.iter().any(|r| r.is_changed()) {
            return Ok(None);
        }

        let resolved = self
            .dependency_resolver
            .revisions_based_on_dependencies(&self.pipeline, revisions)
            .await?;
        Ok(Some(BuildCause::with_modifications(resolved, AUTO_APPROVER)))
    }

    fn on_empty_modifications(
        &self,
        _pipeline: &PipelineDefinition,
        _revisions: MaterialRevisions,
    ) -> Result<Option<BuildCause>> {
        Ok(None)
    }

    fn should_check_whether_older_runs_have_run_with_latest_materials(&self) -> bool {
        self.check_older_runs
    }

    /// A cause is only worth scheduling if some changed material actually
    /// participates in scheduling: a changed dependency material marked
    /// ignore-for-scheduling does not count.
    fn is_valid_build_cause(&self, pipeline: &PipelineDefinition, cause: &BuildCause) -> bool {
        let ignored: Vec<Fingerprint> = pipeline
            .materials
            .iter()
            .filter(|m| {
                matches!(
                    m,
                    MaterialConfig::Dependency {
                        ignore_for_scheduling: true,
                        ..
                    }
                )
            })
            .map(|m| m.fingerprint())
            .collect();

        let changed: Vec<_> = cause
            .material_revisions()
            .iter()
            .filter(|r| r.is_changed())
            .collect();
        if changed.is_empty() {
            return true;
        }
        changed.iter().any(|r| !ignored.contains(r.fingerprint()))
    }
}

/// Scheduling on behalf of a user: always forces a build.
pub struct ManualBuild {
    username: String,
    specified_revisions: HashMap<Fingerprint, String>,
}

impl ManualBuild {
    pub fn new(username: impl Into<String>, specified_revisions: HashMap<Fingerprint, String>) -> Self {
        Self {
            username: username.into(),
            specified_revisions,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

#[async_trait]
impl BuildType for ManualBuild {
    fn trigger_kind(&self) -> TriggerKind {
        TriggerKind::Manual {
            username: self.username.clone(),
        }
    }

    async fn on_modifications(
        &self,
        revisions: MaterialRevisions,
        _material_configuration_changed: bool,
        _original: Option<&MaterialRevisions>,
    ) -> Result<Option<BuildCause>> {
        Ok(Some(BuildCause::forced(revisions, &self.username)))
    }

    fn on_empty_modifications(
        &self,
        _pipeline: &PipelineDefinition,
        mut revisions: MaterialRevisions,
    ) -> Result<Option<BuildCause>> {
        // A user forcing the pipeline builds even without changes.
        for revision in revisions.iter_mut() {
            revision.mark_as_not_changed();
        }
        Ok(Some(BuildCause::forced(revisions, &self.username)))
    }

    fn should_check_whether_older_runs_have_run_with_latest_materials(&self) -> bool {
        false
    }

    /// Every revision the user pinned must actually appear in the produced
    /// cause.
    fn is_valid_build_cause(&self, _pipeline: &PipelineDefinition, cause: &BuildCause) -> bool {
        self.specified_revisions.iter().all(|(fingerprint, revision)| {
            cause
                .material_revisions()
                .find(fingerprint)
                .is_some_and(|entry| {
                    entry
                        .modifications()
                        .iter()
                        .any(|m| &m.revision == revision)
                })
        })
    }
}

/// Scheduling on behalf of the pipeline's timer.
pub struct TimedBuild {
    only_on_changes: bool,
}

impl TimedBuild {
    pub fn new(only_on_changes: bool) -> Self {
        Self { only_on_changes }
    }

    /// Construct from the pipeline's timer configuration, if any.
    pub fn for_pipeline(pipeline: &PipelineDefinition) -> Self {
        Self::new(
            pipeline
                .timer
                .as_ref()
                .map(|t| t.only_on_changes)
                .unwrap_or(false),
        )
    }
}

#[async_trait]
impl BuildType for TimedBuild {
    fn trigger_kind(&self) -> TriggerKind {
        TriggerKind::Timer
    }

    async fn on_modifications(
        &self,
        revisions: MaterialRevisions,
        _material_configuration_changed: bool,
        _original: Option<&MaterialRevisions>,
    ) -> Result<Option<BuildCause>> {
        Ok(Some(BuildCause::with_modifications(revisions, TIMER_APPROVER)))
    }

    fn on_empty_modifications(
        &self,
        pipeline: &PipelineDefinition,
        mut revisions: MaterialRevisions,
    ) -> Result<Option<BuildCause>> {
        if self.only_on_changes {
            debug!(pipeline = %pipeline.name, "timer fired with no changes; suppressed");
            return Ok(None);
        }
        for revision in revisions.iter_mut() {
            revision.mark_as_not_changed();
        }
        Ok(Some(BuildCause::empty_modifications(revisions, TIMER_APPROVER)))
    }

    fn should_check_whether_older_runs_have_run_with_latest_materials(&self) -> bool {
        self.only_on_changes
    }

    fn is_valid_build_cause(&self, _pipeline: &PipelineDefinition, _cause: &BuildCause) -> bool {
        true
    }
}
