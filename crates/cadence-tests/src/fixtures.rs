//! Test fixtures for creating sample configuration and history.

use cadence_core::config::{MaterialConfig, PipelineDefinition, StageDefinition, TimerConfig};
use cadence_core::material::Modification;
use chrono::Utc;

/// Factory for material configurations.
pub struct MaterialFixture;

impl MaterialFixture {
    pub fn git(url: &str) -> MaterialConfig {
        MaterialConfig::Git {
            url: url.to_string(),
            branch: "master".to_string(),
            username: None,
        }
    }

    pub fn dependency(pipeline: &str, stage: &str) -> MaterialConfig {
        MaterialConfig::Dependency {
            pipeline: pipeline.into(),
            stage: stage.to_string(),
            ignore_for_scheduling: false,
        }
    }

    pub fn ignored_dependency(pipeline: &str, stage: &str) -> MaterialConfig {
        MaterialConfig::Dependency {
            pipeline: pipeline.into(),
            stage: stage.to_string(),
            ignore_for_scheduling: true,
        }
    }
}

/// Factory for pipeline definitions.
pub struct PipelineFixture;

impl PipelineFixture {
    pub fn with_materials(name: &str, materials: Vec<MaterialConfig>) -> PipelineDefinition {
        PipelineDefinition {
            name: name.into(),
            materials,
            stages: vec![StageDefinition {
                name: "build".to_string(),
                jobs: vec!["compile".to_string()],
            }],
            timer: None,
        }
    }

    pub fn single_git(name: &str, url: &str) -> PipelineDefinition {
        Self::with_materials(name, vec![MaterialFixture::git(url)])
    }

    pub fn with_timer(name: &str, url: &str, only_on_changes: bool) -> PipelineDefinition {
        let mut pipeline = Self::single_git(name, url);
        pipeline.timer = Some(TimerConfig {
            spec: "0 0 2 * * *".to_string(),
            only_on_changes,
        });
        pipeline
    }
}

/// Factory for modifications.
pub struct ModificationFixture;

impl ModificationFixture {
    pub fn revision(revision: &str) -> Modification {
        Modification::new(revision, Utc::now())
    }

    pub fn authored(revision: &str, author: &str, comment: &str) -> Modification {
        let mut modification = Modification::new(revision, Utc::now());
        modification.author = Some(author.to_string());
        modification.comment = Some(comment.to_string());
        modification
    }
}
