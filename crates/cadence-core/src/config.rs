//! Pipeline and material configuration types.
//!
//! These types are owned by the configuration subsystem and are read-only to
//! the scheduler. A [`MaterialConfig`] is identified by its fingerprint, a
//! content hash of its defining attributes.

use crate::ids::{Fingerprint, PipelineName};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Immutable definition of a pipeline: its materials and stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: PipelineName,
    pub materials: Vec<MaterialConfig>,
    pub stages: Vec<StageDefinition>,
    #[serde(default)]
    pub timer: Option<TimerConfig>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<PipelineName>, materials: Vec<MaterialConfig>) -> Self {
        Self {
            name: name.into(),
            materials,
            stages: vec![],
            timer: None,
        }
    }

    /// Dependency materials configured on this pipeline.
    pub fn dependency_materials(&self) -> impl Iterator<Item = &MaterialConfig> {
        self.materials.iter().filter(|m| m.is_dependency())
    }
}

/// A stage of a pipeline. The scheduler only needs stage identity; execution
/// is a downstream concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub name: String,
    #[serde(default)]
    pub jobs: Vec<String>,
}

/// Timer trigger configuration for a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Cron expression describing when the timer fires.
    pub spec: String,
    /// When set, a timer firing with no material changes does not schedule.
    #[serde(default)]
    pub only_on_changes: bool,
}

/// Configuration of a single material: an external change source a pipeline
/// depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaterialConfig {
    /// A git repository.
    Git {
        url: String,
        #[serde(default = "default_branch")]
        branch: String,
        #[serde(default)]
        username: Option<String>,
    },
    /// A stage of an upstream pipeline.
    Dependency {
        pipeline: PipelineName,
        stage: String,
        #[serde(default)]
        ignore_for_scheduling: bool,
    },
    /// A package in a package repository.
    Package { repository: String, package: String },
    /// An SCM resolved through a plugin.
    PluggableScm { plugin_id: String, scm_id: String },
}

fn default_branch() -> String {
    "master".to_string()
}

impl MaterialConfig {
    /// Stable identity of this material.
    ///
    /// Credentials are excluded: a git material keeps the same fingerprint
    /// regardless of the username configured for it.
    pub fn fingerprint(&self) -> Fingerprint {
        // Field values are newline-delimited so adjacent attributes cannot
        // run together and collide.
        let seed = match self {
            MaterialConfig::Git { url, branch, .. } => format!("git\n{url}\n{branch}"),
            MaterialConfig::Dependency {
                pipeline, stage, ..
            } => format!(
                "dependency\n{}\n{stage}",
                pipeline.as_str().to_ascii_lowercase()
            ),
            MaterialConfig::Package {
                repository,
                package,
            } => format!("package\n{repository}\n{package}"),
            MaterialConfig::PluggableScm { plugin_id, scm_id } => {
                format!("pluggable_scm\n{plugin_id}\n{scm_id}")
            }
        };
        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        Fingerprint::new(hex::encode(hasher.finalize()))
    }

    pub fn is_dependency(&self) -> bool {
        matches!(self, MaterialConfig::Dependency { .. })
    }

    /// The upstream pipeline this material points at, for dependency
    /// materials.
    pub fn upstream_pipeline(&self) -> Option<&PipelineName> {
        match self {
            MaterialConfig::Dependency { pipeline, .. } => Some(pipeline),
            _ => None,
        }
    }
}
