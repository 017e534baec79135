//! Strongly-typed identifiers for domain entities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Case-insensitive pipeline identity.
///
/// Pipeline names preserve the spelling they were configured with, but two
/// names that differ only in ASCII case identify the same pipeline. Every
/// per-pipeline map in the scheduler is keyed by this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineName(String);

impl PipelineName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn folded(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl PartialEq for PipelineName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for PipelineName {}

impl std::hash::Hash for PipelineName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.folded().hash(state);
    }
}

impl PartialOrd for PipelineName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PipelineName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.folded().cmp(&other.folded())
    }
}

impl fmt::Display for PipelineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PipelineName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Stable content-hash identity of a material configuration.
///
/// Lowercase hex SHA-256 over the defining attributes of the material.
/// Credentials never participate in the hash, so two materials that differ
/// only in authentication share a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_name_ignores_case() {
        assert_eq!(PipelineName::new("Deploy"), PipelineName::new("deploy"));
        assert_ne!(PipelineName::new("deploy"), PipelineName::new("release"));
    }

    #[test]
    fn test_pipeline_name_preserves_original_spelling() {
        let name = PipelineName::new("My-Pipeline");
        assert_eq!(name.to_string(), "My-Pipeline");
    }

    #[test]
    fn test_pipeline_name_hashes_case_insensitively() {
        let mut set = std::collections::HashSet::new();
        set.insert(PipelineName::new("Deploy"));
        assert!(set.contains(&PipelineName::new("DEPLOY")));
    }
}
