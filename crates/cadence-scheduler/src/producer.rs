//! The build cause producer: decides, constructs, and enqueues build causes.

use crate::build_type::{AutoBuild, BuildType, ManualBuild, TimedBuild};
use crate::checker::MaterialChecker;
use crate::config::SchedulerConfig;
use crate::monitor::TriggerMonitor;
use crate::queue::PipelineScheduleQueue;
use crate::waiter::{MaterialUpdateMessage, MaterialUpdateNotifier};
use cadence_core::config::PipelineDefinition;
use cadence_core::health::{HealthScope, ServerHealthState};
use cadence_core::ids::Fingerprint;
use cadence_core::material::Material;
use cadence_core::options::ScheduleOptions;
use cadence_core::ports::{
    ConfigService, DependencyResolver, MaterialRepository, MaterialUpdateService,
    SchedulingChecker, ServerHealthService,
};
use cadence_core::result::OperationResult;
use cadence_core::{Error, PipelineName, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// How a production attempt ended, before error mapping.
enum Attempt {
    Completed,
    /// The produced cause no longer covers the configured materials: the
    /// configuration changed mid-resolution, or upstream pipelines have not
    /// been built yet.
    MaterialMismatch,
}

/// Orchestrates a scheduling attempt: eligibility, revision resolution,
/// change detection, cause construction, and enqueueing.
///
/// The trigger monitor is the sole per-pipeline serialization point. All
/// three entry points run under it; expected failures are absorbed into
/// health states and operation results, never returned as errors.
///
/// Cloning is cheap: every collaborator is shared.
#[derive(Clone)]
pub struct BuildCauseProducer {
    config: SchedulerConfig,
    config_service: Arc<dyn ConfigService>,
    scheduling_checker: Arc<dyn SchedulingChecker>,
    health_service: Arc<dyn ServerHealthService>,
    material_update_service: Arc<dyn MaterialUpdateService>,
    dependency_resolver: Arc<dyn DependencyResolver>,
    material_checker: MaterialChecker,
    trigger_monitor: Arc<TriggerMonitor>,
    schedule_queue: Arc<PipelineScheduleQueue>,
    update_notifier: Arc<MaterialUpdateNotifier>,
}

impl BuildCauseProducer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SchedulerConfig,
        config_service: Arc<dyn ConfigService>,
        scheduling_checker: Arc<dyn SchedulingChecker>,
        health_service: Arc<dyn ServerHealthService>,
        material_update_service: Arc<dyn MaterialUpdateService>,
        dependency_resolver: Arc<dyn DependencyResolver>,
        material_repository: Arc<dyn MaterialRepository>,
        trigger_monitor: Arc<TriggerMonitor>,
        schedule_queue: Arc<PipelineScheduleQueue>,
        update_notifier: Arc<MaterialUpdateNotifier>,
    ) -> Self {
        Self {
            config,
            config_service,
            scheduling_checker,
            health_service,
            material_update_service,
            dependency_resolver,
            material_checker: MaterialChecker::new(material_repository),
            trigger_monitor,
            schedule_queue,
            update_notifier,
        }
    }

    /// One auto-poll attempt for a pipeline. A pipeline that is already
    /// triggered, or whose configuration is unavailable, skips this cycle
    /// silently.
    pub async fn auto_schedule_pipeline(&self, name: &PipelineName, result: &mut OperationResult) {
        let pipeline = match self.config_service.pipeline_config_named(name).await {
            Ok(pipeline) => pipeline,
            Err(err) => {
                debug!(pipeline = %name, error = %err, "skipping auto-schedule; configuration unavailable");
                return;
            }
        };
        let build_type = AutoBuild::new(
            pipeline.name.clone(),
            Arc::clone(&self.dependency_resolver),
            &self.config,
        );
        self.schedule_exclusively(&pipeline, &build_type, &ScheduleOptions::new(), result)
            .await;
    }

    /// One timer firing for a pipeline. Same skip semantics as the auto
    /// path.
    pub async fn timer_schedule_pipeline(
        &self,
        pipeline: &PipelineDefinition,
        result: &mut OperationResult,
    ) {
        let build_type = TimedBuild::for_pipeline(pipeline);
        self.schedule_exclusively(pipeline, &build_type, &ScheduleOptions::new(), result)
            .await;
    }

    /// A user-requested trigger. Overlapping requests for the same pipeline
    /// are rejected with a conflict; an accepted request returns
    /// immediately and completes in the background once all material
    /// updates report in.
    pub async fn manual_schedule_pipeline(
        &self,
        username: &str,
        name: &PipelineName,
        options: ScheduleOptions,
        result: &mut OperationResult,
    ) {
        let pipeline = match self.config_service.pipeline_config_named(name).await {
            Ok(pipeline) => pipeline,
            Err(err) => {
                result.unprocessable_entity(
                    &format!("Failed to trigger pipeline: {name}"),
                    &err.to_string(),
                    HealthScope::for_pipeline(name.clone()),
                );
                return;
            }
        };
        let build_type = ManualBuild::new(username, options.specified_revisions.clone());
        if !build_type
            .can_produce(&pipeline, self.scheduling_checker.as_ref(), result)
            .await
        {
            return;
        }
        if !self.trigger_monitor.mark_as_already_triggered(name).await {
            result.conflict(
                &format!("Failed to trigger pipeline: {name}"),
                "Pipeline already triggered",
                HealthScope::for_pipeline(name.clone()),
            );
            return;
        }

        // One pending entry per distinct fingerprint: two configured
        // materials that share a fingerprint update once.
        let mut pending: HashMap<Fingerprint, Material> = HashMap::new();
        if options.update_materials_before_scheduling() {
            for material in Material::from_configs(&pipeline.materials) {
                pending
                    .entry(material.fingerprint().clone())
                    .or_insert(material);
            }
        }

        if pending.is_empty() {
            self.produce_build_cause(&pipeline, &build_type, &options, result)
                .await;
            self.trigger_monitor.mark_as_can_be_triggered(name).await;
            if !result.can_continue() {
                return;
            }
            result.accepted(
                &format!("Request to schedule pipeline {name} accepted"),
                "",
                HealthScope::for_pipeline(name.clone()),
            );
            return;
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        self.update_notifier.register(name.clone(), sender).await;
        for material in pending.values() {
            self.material_update_service.update_material(material).await;
        }

        let producer = self.clone();
        let wait = PendingTrigger {
            pipeline: name.clone(),
            build_type,
            options,
            pending,
            failed: false,
        };
        tokio::spawn(async move {
            producer.wait_for_material_updates(wait, receiver).await;
        });

        result.accepted(
            &format!("Request to schedule pipeline {name} accepted"),
            "",
            HealthScope::for_pipeline(name.clone()),
        );
    }

    /// Run one attempt under the trigger monitor, clearing the flag on
    /// every outcome.
    async fn schedule_exclusively(
        &self,
        pipeline: &PipelineDefinition,
        build_type: &dyn BuildType,
        options: &ScheduleOptions,
        result: &mut OperationResult,
    ) {
        let name = &pipeline.name;
        if !self.trigger_monitor.mark_as_already_triggered(name).await {
            debug!(pipeline = %name, "already triggered; skipping this cycle");
            return;
        }
        self.produce_build_cause(pipeline, build_type, options, result)
            .await;
        self.trigger_monitor.mark_as_can_be_triggered(name).await;
    }

    /// The production state machine. Expected conditions are absorbed here:
    /// nothing below this point returns an error to the trigger caller.
    pub async fn produce_build_cause(
        &self,
        pipeline: &PipelineDefinition,
        build_type: &dyn BuildType,
        options: &ScheduleOptions,
        result: &mut OperationResult,
    ) -> ServerHealthState {
        if !build_type
            .can_produce(pipeline, self.scheduling_checker.as_ref(), result)
            .await
        {
            return result.server_health_state();
        }
        let name = pipeline.name.clone();
        debug!(pipeline = %name, "start producing build cause");

        match self.try_produce(pipeline, build_type, options).await {
            Ok(Attempt::Completed) => {
                let scope = HealthScope::for_pipeline(name.clone());
                self.health_service.remove_by_scope(&scope).await;
                debug!(pipeline = %name, "finished producing build cause");
                ServerHealthState::success(scope)
            }
            Ok(Attempt::MaterialMismatch) => {
                ServerHealthState::success(HealthScope::for_pipeline(name))
            }
            Err(err @ Error::NoCompatibleUpstreamRevisions { .. }) => {
                let message = format!(
                    "Error while scheduling pipeline: {name} as no compatible revisions were identified."
                );
                debug!(pipeline = %name, error = %err, "no compatible upstream revisions");
                self.show_error(&name, &message, &err.to_string()).await
            }
            Err(Error::NoModificationsForDependentMaterial(material)) => {
                // An upstream that has produced nothing schedulable yet is
                // an ordering gap, not a fault: skip this cycle.
                error!(pipeline = %name, material = %material, "no modifications present for dependent material");
                ServerHealthState::success(HealthScope::for_pipeline(name))
            }
            Err(err) => {
                let message = format!("Error while scheduling pipeline: {name}");
                error!(pipeline = %name, error = %err, "unexpected error while producing build cause");
                result.unprocessable_entity(
                    &message,
                    &err.to_string(),
                    HealthScope::for_pipeline(name.clone()),
                );
                self.show_error(&name, &message, &err.to_string()).await
            }
        }
    }

    async fn try_produce(
        &self,
        pipeline: &PipelineDefinition,
        build_type: &dyn BuildType,
        options: &ScheduleOptions,
    ) -> Result<Attempt> {
        let name = &pipeline.name;
        let pegged = self
            .material_checker
            .resolve_pegged(name, pipeline, &options.specified_revisions)
            .await?;
        let previous = self.schedule_queue.most_recent_scheduled(name).await;
        let materials = Material::from_configs(&pipeline.materials);
        let config_changed = !previous.materials_match(&pipeline.materials);

        let mut build_cause = None;
        if previous.has_never_run() || config_changed {
            debug!(pipeline = %name, "using latest modifications from repository");
            let revisions = self
                .material_checker
                .find_latest_revisions(&pegged, &materials)
                .await?;
            if revisions.is_missing_modifications() {
                debug!(pipeline = %name, "latest revisions are missing modifications; not scheduling");
            } else {
                build_cause = build_type
                    .on_modifications(revisions, config_changed, None)
                    .await?;
                if let Some(cause) = &build_cause {
                    if !cause.materials_match(&pipeline.materials) {
                        warn!(
                            pipeline = %name,
                            "materials do not match between configuration and build cause; \
                             upstream pipelines may not have been built yet"
                        );
                        return Ok(Attempt::MaterialMismatch);
                    }
                }
            }
        } else {
            debug!(pipeline = %name, "checking whether materials are different");
            let latest = self
                .material_checker
                .find_latest_revisions(&pegged, &materials)
                .await?;
            if latest.is_missing_modifications() {
                debug!(pipeline = %name, "latest revisions are missing modifications; not scheduling");
            } else {
                let original = previous.material_revisions();
                let revisions = self
                    .material_checker
                    .find_revisions_since(&pegged, &materials, original, &latest)
                    .await?;
                let unchanged = !revisions.has_changed_since(original);
                let already_run = build_type
                    .should_check_whether_older_runs_have_run_with_latest_materials()
                    && self
                        .material_checker
                        .has_pipeline_ever_run_with(name, &latest)
                        .await?;
                if unchanged || already_run {
                    debug!(pipeline = %name, "repository not modified");
                    build_cause = build_type.on_empty_modifications(pipeline, latest)?;
                } else {
                    debug!(pipeline = %name, "repository modified; scheduling");
                    build_cause = build_type
                        .on_modifications(revisions, config_changed, Some(original))
                        .await?;
                }
            }
        }

        match build_cause {
            Some(mut cause) => {
                cause.add_overridden_variables(options.all_variables());
                self.material_checker
                    .update_changed_revisions(name, &cause)
                    .await?;
                if config_changed || build_type.is_valid_build_cause(pipeline, &cause) {
                    debug!(pipeline = %name, trigger = ?cause.trigger(), "scheduling pipeline");
                    self.schedule_queue.schedule(name, cause).await;
                } else {
                    build_type.notify_pipeline_not_scheduled(pipeline);
                }
            }
            None => build_type.notify_pipeline_not_scheduled(pipeline),
        }
        Ok(Attempt::Completed)
    }

    /// Consume material update completions until every pending material has
    /// reported, then resume production. The trigger flag is cleared here,
    /// whatever the outcome.
    async fn wait_for_material_updates(
        &self,
        mut wait: PendingTrigger,
        mut receiver: mpsc::UnboundedReceiver<MaterialUpdateMessage>,
    ) {
        while let Some(message) = receiver.recv().await {
            let fingerprint = message.material().fingerprint().clone();
            if !wait.pending.contains_key(&fingerprint) {
                continue;
            }
            if let MaterialUpdateMessage::Failed { material, reason } = &message {
                error!(
                    pipeline = %wait.pipeline,
                    material = %material.display_name(),
                    reason = %reason,
                    "not scheduling pipeline after manual trigger: material update failed"
                );
                let failure = Error::MaterialUpdateFailed {
                    material: material.display_name(),
                    reason: reason.clone(),
                };
                self.show_error(
                    &wait.pipeline,
                    &format!("Could not trigger pipeline '{}'", wait.pipeline),
                    &failure.to_string(),
                )
                .await;
                wait.failed = true;
            }
            wait.pending.remove(&fingerprint);
            if wait.pending.is_empty() {
                break;
            }
        }

        self.update_notifier.remove(&wait.pipeline).await;
        self.trigger_monitor
            .mark_as_can_be_triggered(&wait.pipeline)
            .await;
        if wait.failed || !wait.pending.is_empty() {
            return;
        }

        // The configuration may have changed while materials were updating;
        // the pipeline may even be gone.
        if !self.config_service.has_pipeline_named(&wait.pipeline).await {
            error!(pipeline = %wait.pipeline, "not scheduling pipeline after manual trigger: configuration was removed");
            self.show_error(
                &wait.pipeline,
                &format!("Could not trigger pipeline '{}'", wait.pipeline),
                &format!("Pipeline '{}' configuration has been removed", wait.pipeline),
            )
            .await;
            return;
        }
        match self.config_service.pipeline_config_named(&wait.pipeline).await {
            Ok(pipeline) => {
                let mut result = OperationResult::new();
                self.produce_build_cause(&pipeline, &wait.build_type, &wait.options, &mut result)
                    .await;
            }
            Err(err) => {
                error!(pipeline = %wait.pipeline, error = %err, "not scheduling pipeline after manual trigger");
                self.show_error(
                    &wait.pipeline,
                    &format!("Could not trigger pipeline '{}'", wait.pipeline),
                    &err.to_string(),
                )
                .await;
            }
        }
    }

    async fn show_error(
        &self,
        pipeline: &PipelineName,
        message: &str,
        description: &str,
    ) -> ServerHealthState {
        let description = if description.is_empty() {
            "Details not available, please check server logs."
        } else {
            description
        };
        let state = ServerHealthState::error(
            message,
            description,
            HealthScope::for_pipeline(pipeline.clone()),
        );
        self.health_service.update(state.clone()).await;
        state
    }
}

/// State carried by one accepted manual trigger while its materials update.
struct PendingTrigger {
    pipeline: PipelineName,
    build_type: ManualBuild,
    options: ScheduleOptions,
    pending: HashMap<Fingerprint, Material>,
    failed: bool,
}
