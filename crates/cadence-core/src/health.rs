//! Server health vocabulary.
//!
//! Scheduling outcomes are reported to operators as health states scoped to
//! a pipeline. The health service itself is an external collaborator; this
//! module only defines what gets sent to it.

use crate::ids::PipelineName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a health state is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthScope {
    Global,
    Pipeline(PipelineName),
}

impl HealthScope {
    pub fn for_pipeline(name: impl Into<PipelineName>) -> Self {
        HealthScope::Pipeline(name.into())
    }
}

impl fmt::Display for HealthScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthScope::Global => write!(f, "global"),
            HealthScope::Pipeline(name) => write!(f, "pipeline/{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    Ok,
    Warning,
    Error,
}

/// A human-readable scheduling state, scoped for later removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerHealthState {
    pub level: HealthLevel,
    pub message: String,
    pub description: String,
    pub scope: HealthScope,
}

impl ServerHealthState {
    pub fn success(scope: HealthScope) -> Self {
        Self {
            level: HealthLevel::Ok,
            message: String::new(),
            description: String::new(),
            scope,
        }
    }

    pub fn warning(message: impl Into<String>, description: impl Into<String>, scope: HealthScope) -> Self {
        Self {
            level: HealthLevel::Warning,
            message: message.into(),
            description: description.into(),
            scope,
        }
    }

    pub fn error(message: impl Into<String>, description: impl Into<String>, scope: HealthScope) -> Self {
        Self {
            level: HealthLevel::Error,
            message: message.into(),
            description: description.into(),
            scope,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>, description: impl Into<String>) -> Self {
        self.message = message.into();
        self.description = description.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.level == HealthLevel::Ok
    }
}
