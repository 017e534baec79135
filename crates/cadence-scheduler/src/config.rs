//! Scheduler configuration.

use serde::{Deserialize, Serialize};

/// Tunables for the scheduling engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Enforce a consistent revision set across upstream pipeline
    /// dependencies before auto-scheduling. When off, a change that only
    /// touches dependency materials does not schedule.
    #[serde(default = "default_true")]
    pub enforce_upstream_compatibility: bool,
    /// Before rescheduling on the auto path, check whether an earlier run
    /// already used the latest materials.
    #[serde(default = "default_true")]
    pub check_older_runs_with_latest_materials: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enforce_upstream_compatibility: true,
            check_older_runs_with_latest_materials: true,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_strict() {
        let config = SchedulerConfig::default();
        assert!(config.enforce_upstream_compatibility);
        assert!(config.check_older_runs_with_latest_materials);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: SchedulerConfig =
            serde_yaml::from_str("enforce_upstream_compatibility: false\n").unwrap();
        assert!(!config.enforce_upstream_compatibility);
        assert!(config.check_older_runs_with_latest_materials);
    }
}
