//! Material revision resolution and change bookkeeping.

use cadence_core::config::PipelineDefinition;
use cadence_core::buildcause::BuildCause;
use cadence_core::ids::Fingerprint;
use cadence_core::material::Material;
use cadence_core::ports::MaterialRepository;
use cadence_core::revision::{MaterialRevision, MaterialRevisions};
use cadence_core::{Error, PipelineName, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves the revision set a scheduling attempt should consider.
#[derive(Clone)]
pub struct MaterialChecker {
    repository: Arc<dyn MaterialRepository>,
}

impl MaterialChecker {
    pub fn new(repository: Arc<dyn MaterialRepository>) -> Self {
        Self { repository }
    }

    /// Resolve explicitly pinned revisions against the pipeline's configured
    /// materials.
    ///
    /// A pin naming a fingerprint that is not configured, or a revision the
    /// repository has never seen, is a no-compatible-revisions error: the
    /// request referenced history that does not exist for this pipeline.
    pub async fn resolve_pegged(
        &self,
        pipeline: &PipelineName,
        config: &PipelineDefinition,
        specified: &HashMap<Fingerprint, String>,
    ) -> Result<MaterialRevisions> {
        let mut pegged = MaterialRevisions::new();
        for (fingerprint, revision) in specified {
            let material = config
                .materials
                .iter()
                .find(|m| &m.fingerprint() == fingerprint)
                .cloned()
                .map(Material::new)
                .ok_or_else(|| Error::NoCompatibleUpstreamRevisions {
                    pipeline: pipeline.clone(),
                    reason: format!(
                        "revision '{revision}' was specified for a material that is not \
                         configured for this pipeline"
                    ),
                })?;
            let modification = self
                .repository
                .find_modification_with(&material, revision)
                .await?
                .ok_or_else(|| Error::NoCompatibleUpstreamRevisions {
                    pipeline: pipeline.clone(),
                    reason: format!(
                        "revision '{revision}' could not be found for material '{}'",
                        material.display_name()
                    ),
                })?;
            pegged.add(MaterialRevision::new(material, vec![modification]).changed());
        }
        Ok(pegged)
    }

    /// The latest known revision for each material, honoring pegged
    /// revisions.
    ///
    /// A material with no resolvable modification produces an unresolved
    /// entry, so the returned set reports
    /// [`is_missing_modifications`](MaterialRevisions::is_missing_modifications)
    /// and the caller must not schedule from it.
    pub async fn find_latest_revisions(
        &self,
        pegged: &MaterialRevisions,
        materials: &[Material],
    ) -> Result<MaterialRevisions> {
        let mut revisions = MaterialRevisions::new();
        for material in materials {
            if let Some(entry) = pegged.find(material.fingerprint()) {
                revisions.add(entry.clone());
                continue;
            }
            match self.repository.find_latest_modification(material).await? {
                Some(modification) => {
                    revisions.add(MaterialRevision::new(material.clone(), vec![modification]).changed());
                }
                None => revisions.add(MaterialRevision::unresolved(material.clone())),
            }
        }
        Ok(revisions)
    }

    /// Diff the latest revisions against the previous build's: unchanged
    /// materials copy the original entry, changed materials take the latest.
    ///
    /// A dependency material with nothing schedulable in the latest set is a
    /// dedicated error so callers can distinguish an upstream ordering gap
    /// from a real failure.
    pub async fn find_revisions_since(
        &self,
        pegged: &MaterialRevisions,
        materials: &[Material],
        original: &MaterialRevisions,
        latest: &MaterialRevisions,
    ) -> Result<MaterialRevisions> {
        let mut revisions = MaterialRevisions::new();
        for material in materials {
            let fingerprint = material.fingerprint();
            let latest_entry = match (pegged.find(fingerprint), latest.find(fingerprint)) {
                (Some(entry), _) => entry,
                (None, Some(entry)) if entry.has_modifications() => entry,
                _ => {
                    if material.is_dependency() {
                        return Err(Error::NoModificationsForDependentMaterial(
                            material.display_name(),
                        ));
                    }
                    revisions.add(MaterialRevision::unresolved(material.clone()));
                    continue;
                }
            };

            match original.find(fingerprint) {
                Some(previous)
                    if previous.latest_revision() == latest_entry.latest_revision() =>
                {
                    let mut unchanged = previous.clone();
                    unchanged.mark_as_not_changed();
                    revisions.add(unchanged);
                }
                _ => revisions.add(latest_entry.clone().changed()),
            }
        }
        Ok(revisions)
    }

    /// Whether any earlier run of the pipeline already used exactly these
    /// revisions.
    pub async fn has_pipeline_ever_run_with(
        &self,
        pipeline: &PipelineName,
        revisions: &MaterialRevisions,
    ) -> Result<bool> {
        self.repository
            .has_pipeline_ever_run_with(pipeline, revisions)
            .await
    }

    /// Persist which revisions the newly produced cause selected.
    pub async fn update_changed_revisions(
        &self,
        pipeline: &PipelineName,
        cause: &BuildCause,
    ) -> Result<()> {
        self.repository.save_changed_revisions(pipeline, cause).await
    }
}
