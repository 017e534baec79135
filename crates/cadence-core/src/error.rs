//! Error types for Cadence.

use crate::ids::PipelineName;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors
    #[error("Pipeline not found: {0}")]
    PipelineNotFound(PipelineName),

    #[error("Invalid timer spec '{spec}': {reason}")]
    InvalidTimerSpec { spec: String, reason: String },

    // Revision resolution errors
    #[error("No compatible upstream revisions for pipeline '{pipeline}': {reason}")]
    NoCompatibleUpstreamRevisions {
        pipeline: PipelineName,
        reason: String,
    },

    #[error("No modifications present for dependent material revision '{0}'")]
    NoModificationsForDependentMaterial(String),

    // Material update errors
    #[error("Material update failed for material '{material}' because: {reason}")]
    MaterialUpdateFailed { material: String, reason: String },

    // Infrastructure errors
    #[error("Repository error: {0}")]
    Repository(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
