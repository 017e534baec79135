//! A fully wired scheduler with in-memory collaborators.

use crate::fakes::{
    ApprovingChecker, DenyingChecker, DependencyResolution, FakeMaterialUpdateService,
    InMemoryConfigService, InMemoryMaterialRepository, RecordingHealthService,
    StaticDependencyResolver,
};
use cadence_core::buildcause::BuildCause;
use cadence_core::config::{MaterialConfig, PipelineDefinition};
use cadence_core::options::ScheduleOptions;
use cadence_core::ports::{
    ConfigService, MaterialRepository, MaterialUpdateService, SchedulingChecker,
    ServerHealthService,
};
use cadence_core::result::OperationResult;
use cadence_core::PipelineName;
use cadence_scheduler::{
    BuildCauseProducer, MaterialUpdateNotifier, PipelineScheduleQueue, SchedulerConfig,
    TriggerMonitor,
};
use std::sync::Arc;

/// Builder for [`SchedulerContext`].
pub struct SchedulerContextBuilder {
    config: SchedulerConfig,
    resolution: DependencyResolution,
    deny_reason: Option<String>,
    inert_updates: bool,
    failing_materials: Vec<(MaterialConfig, String)>,
}

impl SchedulerContextBuilder {
    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dependency_resolution(mut self, resolution: DependencyResolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Make the policy gate reject every trigger.
    pub fn deny_scheduling(mut self, reason: &str) -> Self {
        self.deny_reason = Some(reason.to_string());
        self
    }

    /// Material update requests never complete.
    pub fn inert_material_updates(mut self) -> Self {
        self.inert_updates = true;
        self
    }

    /// The update of this material reports failure.
    pub fn failing_material(mut self, config: MaterialConfig, reason: &str) -> Self {
        self.failing_materials.push((config, reason.to_string()));
        self
    }

    pub async fn build(self) -> SchedulerContext {
        let config_service = Arc::new(InMemoryConfigService::new());
        let repository = Arc::new(InMemoryMaterialRepository::new());
        let health = Arc::new(RecordingHealthService::new());
        let monitor = Arc::new(TriggerMonitor::new());
        let queue = Arc::new(PipelineScheduleQueue::new());
        let notifier = Arc::new(MaterialUpdateNotifier::new());

        let update_service = Arc::new(if self.inert_updates {
            FakeMaterialUpdateService::inert()
        } else {
            FakeMaterialUpdateService::completing(Arc::clone(&notifier))
        });
        for (config, reason) in &self.failing_materials {
            update_service.fail_material(config, reason).await;
        }

        let checker: Arc<dyn SchedulingChecker> = match &self.deny_reason {
            Some(reason) => Arc::new(DenyingChecker::new(reason)),
            None => Arc::new(ApprovingChecker),
        };

        let producer = BuildCauseProducer::new(
            self.config,
            Arc::clone(&config_service) as Arc<dyn ConfigService>,
            checker,
            Arc::clone(&health) as Arc<dyn ServerHealthService>,
            Arc::clone(&update_service) as Arc<dyn MaterialUpdateService>,
            Arc::new(StaticDependencyResolver::new(self.resolution)),
            Arc::clone(&repository) as Arc<dyn MaterialRepository>,
            Arc::clone(&monitor),
            Arc::clone(&queue),
            Arc::clone(&notifier),
        );

        SchedulerContext {
            config_service,
            repository,
            health,
            update_service,
            monitor,
            queue,
            notifier,
            producer,
        }
    }
}

/// Everything a producer test needs, wired together.
pub struct SchedulerContext {
    pub config_service: Arc<InMemoryConfigService>,
    pub repository: Arc<InMemoryMaterialRepository>,
    pub health: Arc<RecordingHealthService>,
    pub update_service: Arc<FakeMaterialUpdateService>,
    pub monitor: Arc<TriggerMonitor>,
    pub queue: Arc<PipelineScheduleQueue>,
    pub notifier: Arc<MaterialUpdateNotifier>,
    pub producer: BuildCauseProducer,
}

impl SchedulerContext {
    pub fn builder() -> SchedulerContextBuilder {
        SchedulerContextBuilder {
            config: SchedulerConfig::default(),
            resolution: DependencyResolution::PassThrough,
            deny_reason: None,
            inert_updates: false,
            failing_materials: Vec::new(),
        }
    }

    pub async fn new() -> Self {
        Self::builder().build().await
    }

    pub async fn add_pipeline(&self, pipeline: PipelineDefinition) {
        self.config_service.add(pipeline).await;
    }

    pub async fn auto_trigger(&self, name: &str) -> OperationResult {
        let mut result = OperationResult::new();
        self.producer
            .auto_schedule_pipeline(&name.into(), &mut result)
            .await;
        result
    }

    pub async fn timer_trigger(&self, name: &str) -> OperationResult {
        let pipeline = self
            .config_service
            .pipeline_config_named(&name.into())
            .await
            .expect("timer-triggered pipeline must be configured");
        let mut result = OperationResult::new();
        self.producer
            .timer_schedule_pipeline(&pipeline, &mut result)
            .await;
        result
    }

    pub async fn manual_trigger(
        &self,
        username: &str,
        name: &str,
        options: ScheduleOptions,
    ) -> OperationResult {
        let mut result = OperationResult::new();
        self.producer
            .manual_schedule_pipeline(username, &name.into(), options, &mut result)
            .await;
        result
    }

    pub async fn scheduled_cause(&self, name: &str) -> BuildCause {
        self.queue
            .most_recent_scheduled(&PipelineName::new(name))
            .await
    }

    /// Wait for an accepted manual trigger's background work to finish.
    pub async fn wait_for_trigger_cleared(&self, name: &str) -> bool {
        let pipeline = PipelineName::new(name);
        crate::helpers::eventually(std::time::Duration::from_secs(2), || async {
            !self.monitor.is_already_triggered(&pipeline).await
        })
        .await
    }
}
