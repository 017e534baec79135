//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the scheduling core and
//! external collaborators: configuration, persistence, material updating,
//! health reporting, and scheduling policy. The core consumes them; it never
//! implements them.

use crate::buildcause::BuildCause;
use crate::config::PipelineDefinition;
use crate::health::{HealthScope, ServerHealthState};
use crate::ids::PipelineName;
use crate::material::{Material, Modification};
use crate::result::OperationResult;
use crate::revision::MaterialRevisions;
use crate::Result;
use async_trait::async_trait;

/// What kind of trigger is asking to schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerKind {
    Auto,
    Manual { username: String },
    Timer,
}

/// Read-only access to pipeline configuration.
#[async_trait]
pub trait ConfigService: Send + Sync {
    /// Look up a pipeline definition by name.
    async fn pipeline_config_named(&self, name: &PipelineName) -> Result<PipelineDefinition>;

    /// Whether a pipeline with this name currently exists.
    async fn has_pipeline_named(&self, name: &PipelineName) -> bool;
}

/// Persisted material history for pipelines.
#[async_trait]
pub trait MaterialRepository: Send + Sync {
    /// The newest known modification of a material, if any.
    async fn find_latest_modification(&self, material: &Material) -> Result<Option<Modification>>;

    /// A specific modification of a material, by revision identifier.
    async fn find_modification_with(
        &self,
        material: &Material,
        revision: &str,
    ) -> Result<Option<Modification>>;

    /// Whether any previous run of the pipeline used exactly these
    /// revisions.
    async fn has_pipeline_ever_run_with(
        &self,
        pipeline: &PipelineName,
        revisions: &MaterialRevisions,
    ) -> Result<bool>;

    /// Append-only record of the revisions a newly scheduled cause selected.
    async fn save_changed_revisions(
        &self,
        pipeline: &PipelineName,
        cause: &BuildCause,
    ) -> Result<()>;
}

/// Sink for human-readable scheduling states, scoped per pipeline.
#[async_trait]
pub trait ServerHealthService: Send + Sync {
    async fn update(&self, state: ServerHealthState);

    async fn remove_by_scope(&self, scope: &HealthScope);
}

/// Out-of-band refresh of a material's modification history. Completion is
/// reported asynchronously through the scheduler's update notifier.
#[async_trait]
pub trait MaterialUpdateService: Send + Sync {
    async fn update_material(&self, material: &Material);
}

/// Externally supplied policy gate: pause state, locks, concurrency limits.
/// Writes ineligibility into the result; the decision itself is opaque to
/// the core.
#[async_trait]
pub trait SchedulingChecker: Send + Sync {
    async fn can_trigger(
        &self,
        pipeline: &PipelineDefinition,
        trigger: &TriggerKind,
        result: &mut OperationResult,
    ) -> bool;
}

/// Resolution of a consistent revision set across upstream pipeline
/// dependencies (fan-in). Fails with
/// [`Error::NoCompatibleUpstreamRevisions`](crate::Error::NoCompatibleUpstreamRevisions)
/// or
/// [`Error::NoModificationsForDependentMaterial`](crate::Error::NoModificationsForDependentMaterial)
/// when no consistent set exists.
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    async fn revisions_based_on_dependencies(
        &self,
        pipeline: &PipelineName,
        revisions: MaterialRevisions,
    ) -> Result<MaterialRevisions>;
}
