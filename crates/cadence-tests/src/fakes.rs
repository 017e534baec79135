//! In-memory implementations of the scheduler's ports.
//!
//! These stand in for the configuration, persistence, health, update, and
//! policy collaborators so producer behavior can be exercised end-to-end
//! without external services.

use async_trait::async_trait;
use cadence_core::buildcause::BuildCause;
use cadence_core::config::{MaterialConfig, PipelineDefinition};
use cadence_core::health::{HealthLevel, HealthScope, ServerHealthState};
use cadence_core::ids::Fingerprint;
use cadence_core::material::{Material, Modification};
use cadence_core::ports::{
    ConfigService, DependencyResolver, MaterialRepository, MaterialUpdateService,
    SchedulingChecker, ServerHealthService, TriggerKind,
};
use cadence_core::result::OperationResult;
use cadence_core::revision::MaterialRevisions;
use cadence_core::{Error, PipelineName, Result};
use cadence_scheduler::waiter::{MaterialUpdateMessage, MaterialUpdateNotifier};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Configuration service backed by a map.
pub struct InMemoryConfigService {
    pipelines: RwLock<HashMap<PipelineName, PipelineDefinition>>,
}

impl InMemoryConfigService {
    pub fn new() -> Self {
        Self {
            pipelines: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add(&self, pipeline: PipelineDefinition) {
        self.pipelines
            .write()
            .await
            .insert(pipeline.name.clone(), pipeline);
    }

    pub async fn remove(&self, name: &PipelineName) {
        self.pipelines.write().await.remove(name);
    }
}

impl Default for InMemoryConfigService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigService for InMemoryConfigService {
    async fn pipeline_config_named(&self, name: &PipelineName) -> Result<PipelineDefinition> {
        self.pipelines
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::PipelineNotFound(name.clone()))
    }

    async fn has_pipeline_named(&self, name: &PipelineName) -> bool {
        self.pipelines.read().await.contains_key(name)
    }
}

/// Material repository backed by per-material history vectors.
pub struct InMemoryMaterialRepository {
    /// Newest first, as material history is ordered.
    history: RwLock<HashMap<Fingerprint, Vec<Modification>>>,
    runs: RwLock<HashMap<PipelineName, Vec<HashMap<Fingerprint, String>>>>,
    saved: RwLock<Vec<(PipelineName, BuildCause)>>,
    fail_lookups_with: RwLock<Option<String>>,
}

impl InMemoryMaterialRepository {
    pub fn new() -> Self {
        Self {
            history: RwLock::new(HashMap::new()),
            runs: RwLock::new(HashMap::new()),
            saved: RwLock::new(Vec::new()),
            fail_lookups_with: RwLock::new(None),
        }
    }

    /// Record a new modification as the latest for a material.
    pub async fn push_modification(&self, config: &MaterialConfig, modification: Modification) {
        self.history
            .write()
            .await
            .entry(config.fingerprint())
            .or_default()
            .insert(0, modification);
    }

    /// Record that a pipeline has run with the given material revisions.
    pub async fn record_run(&self, pipeline: &PipelineName, revisions: &[(MaterialConfig, &str)]) {
        let run = revisions
            .iter()
            .map(|(config, revision)| (config.fingerprint(), revision.to_string()))
            .collect();
        self.runs
            .write()
            .await
            .entry(pipeline.clone())
            .or_default()
            .push(run);
    }

    /// Make every subsequent modification lookup fail, to exercise the
    /// producer's unexpected-error path.
    pub async fn fail_lookups_with(&self, reason: &str) {
        *self.fail_lookups_with.write().await = Some(reason.to_string());
    }

    pub async fn saved_causes(&self) -> Vec<(PipelineName, BuildCause)> {
        self.saved.read().await.clone()
    }
}

impl Default for InMemoryMaterialRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MaterialRepository for InMemoryMaterialRepository {
    async fn find_latest_modification(&self, material: &Material) -> Result<Option<Modification>> {
        if let Some(reason) = self.fail_lookups_with.read().await.clone() {
            return Err(Error::Repository(reason));
        }
        Ok(self
            .history
            .read()
            .await
            .get(material.fingerprint())
            .and_then(|history| history.first().cloned()))
    }

    async fn find_modification_with(
        &self,
        material: &Material,
        revision: &str,
    ) -> Result<Option<Modification>> {
        if let Some(reason) = self.fail_lookups_with.read().await.clone() {
            return Err(Error::Repository(reason));
        }
        Ok(self
            .history
            .read()
            .await
            .get(material.fingerprint())
            .and_then(|history| history.iter().find(|m| m.revision == revision).cloned()))
    }

    async fn has_pipeline_ever_run_with(
        &self,
        pipeline: &PipelineName,
        revisions: &MaterialRevisions,
    ) -> Result<bool> {
        let wanted: HashMap<Fingerprint, String> = revisions
            .iter()
            .filter_map(|r| {
                r.latest_revision()
                    .map(|rev| (r.fingerprint().clone(), rev.to_string()))
            })
            .collect();
        Ok(self
            .runs
            .read()
            .await
            .get(pipeline)
            .is_some_and(|runs| runs.iter().any(|run| run == &wanted)))
    }

    async fn save_changed_revisions(
        &self,
        pipeline: &PipelineName,
        cause: &BuildCause,
    ) -> Result<()> {
        self.saved
            .write()
            .await
            .push((pipeline.clone(), cause.clone()));
        Ok(())
    }
}

/// Health service that records everything sent to it.
pub struct RecordingHealthService {
    states: Mutex<Vec<ServerHealthState>>,
    removed: Mutex<Vec<HealthScope>>,
}

impl RecordingHealthService {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
        }
    }

    pub async fn states(&self) -> Vec<ServerHealthState> {
        self.states.lock().await.clone()
    }

    pub async fn errors(&self) -> Vec<ServerHealthState> {
        self.states
            .lock()
            .await
            .iter()
            .filter(|s| s.level == HealthLevel::Error)
            .cloned()
            .collect()
    }

    pub async fn errors_for(&self, scope: &HealthScope) -> Vec<ServerHealthState> {
        self.errors()
            .await
            .into_iter()
            .filter(|s| &s.scope == scope)
            .collect()
    }

    pub async fn removed_scopes(&self) -> Vec<HealthScope> {
        self.removed.lock().await.clone()
    }
}

impl Default for RecordingHealthService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServerHealthService for RecordingHealthService {
    async fn update(&self, state: ServerHealthState) {
        self.states.lock().await.push(state);
    }

    async fn remove_by_scope(&self, scope: &HealthScope) {
        self.removed.lock().await.push(scope.clone());
    }
}

/// Policy gate that approves everything.
pub struct ApprovingChecker;

#[async_trait]
impl SchedulingChecker for ApprovingChecker {
    async fn can_trigger(
        &self,
        _pipeline: &PipelineDefinition,
        _trigger: &TriggerKind,
        _result: &mut OperationResult,
    ) -> bool {
        true
    }
}

/// Policy gate that rejects everything with a fixed reason.
pub struct DenyingChecker {
    reason: String,
}

impl DenyingChecker {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl SchedulingChecker for DenyingChecker {
    async fn can_trigger(
        &self,
        pipeline: &PipelineDefinition,
        _trigger: &TriggerKind,
        result: &mut OperationResult,
    ) -> bool {
        result.error(
            &format!("Cannot schedule pipeline {}", pipeline.name),
            &self.reason,
            HealthScope::for_pipeline(pipeline.name.clone()),
        );
        false
    }
}

/// Material update service that records requests and, unless inert, reports
/// completion back through the notifier the way the real update subsystem
/// does.
pub struct FakeMaterialUpdateService {
    notifier: Option<Arc<MaterialUpdateNotifier>>,
    failures: RwLock<HashMap<Fingerprint, String>>,
    updated: Mutex<Vec<Material>>,
}

impl FakeMaterialUpdateService {
    /// Requests are recorded but never complete; the waiter stays pending.
    pub fn inert() -> Self {
        Self {
            notifier: None,
            failures: RwLock::new(HashMap::new()),
            updated: Mutex::new(Vec::new()),
        }
    }

    /// Every request completes successfully (or fails, if registered via
    /// [`fail_material`](Self::fail_material)).
    pub fn completing(notifier: Arc<MaterialUpdateNotifier>) -> Self {
        Self {
            notifier: Some(notifier),
            failures: RwLock::new(HashMap::new()),
            updated: Mutex::new(Vec::new()),
        }
    }

    pub async fn fail_material(&self, config: &MaterialConfig, reason: &str) {
        self.failures
            .write()
            .await
            .insert(config.fingerprint(), reason.to_string());
    }

    pub async fn updated_materials(&self) -> Vec<Material> {
        self.updated.lock().await.clone()
    }
}

#[async_trait]
impl MaterialUpdateService for FakeMaterialUpdateService {
    async fn update_material(&self, material: &Material) {
        self.updated.lock().await.push(material.clone());
        let Some(notifier) = &self.notifier else {
            return;
        };
        let failure = self
            .failures
            .read()
            .await
            .get(material.fingerprint())
            .cloned();
        let message = match failure {
            Some(reason) => MaterialUpdateMessage::Failed {
                material: material.clone(),
                reason,
            },
            None => MaterialUpdateMessage::Completed {
                material: material.clone(),
            },
        };
        notifier.on_material_update(message).await;
    }
}

/// How a [`StaticDependencyResolver`] answers.
pub enum DependencyResolution {
    /// Return the revisions unchanged.
    PassThrough,
    /// Return a fixed revision set regardless of input.
    Fixed(MaterialRevisions),
    /// Fail with a no-compatible-upstream-revisions error.
    NoCompatible(String),
    /// Fail with a no-modifications-for-dependent-material error.
    NoModifications(String),
}

/// Dependency resolver with canned behavior.
pub struct StaticDependencyResolver {
    resolution: DependencyResolution,
}

impl StaticDependencyResolver {
    pub fn new(resolution: DependencyResolution) -> Self {
        Self { resolution }
    }

    pub fn pass_through() -> Self {
        Self::new(DependencyResolution::PassThrough)
    }
}

#[async_trait]
impl DependencyResolver for StaticDependencyResolver {
    async fn revisions_based_on_dependencies(
        &self,
        pipeline: &PipelineName,
        revisions: MaterialRevisions,
    ) -> Result<MaterialRevisions> {
        match &self.resolution {
            DependencyResolution::PassThrough => Ok(revisions),
            DependencyResolution::Fixed(fixed) => Ok(fixed.clone()),
            DependencyResolution::NoCompatible(reason) => {
                Err(Error::NoCompatibleUpstreamRevisions {
                    pipeline: pipeline.clone(),
                    reason: reason.clone(),
                })
            }
            DependencyResolution::NoModifications(material) => Err(
                Error::NoModificationsForDependentMaterial(material.clone()),
            ),
        }
    }
}
