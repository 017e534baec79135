//! Build causes: the authoritative record of why a pipeline run was
//! scheduled.

use crate::config::MaterialConfig;
use crate::revision::MaterialRevisions;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Approver recorded on automatically produced build causes.
pub const AUTO_APPROVER: &str = "changes";
/// Approver recorded on timer-produced build causes.
pub const TIMER_APPROVER: &str = "timer";

/// Provenance of a build cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildTrigger {
    /// Sentinel for a pipeline that has never been scheduled.
    NeverRun,
    /// A user forced the pipeline.
    Forced,
    /// New modifications on one or more materials.
    Modifications,
    /// A rerun with the same material revisions as the previous build.
    EmptyModifications,
}

/// The scheduling decision artifact: which material revisions, which kind of
/// trigger, and who approved it. Immutable after construction apart from
/// attaching override variables before enqueue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildCause {
    material_revisions: MaterialRevisions,
    trigger: BuildTrigger,
    approver: String,
    #[serde(default)]
    variables: HashMap<String, String>,
}

impl BuildCause {
    /// The sentinel cause returned for pipelines with no scheduling history.
    pub fn never_run() -> Self {
        Self {
            material_revisions: MaterialRevisions::new(),
            trigger: BuildTrigger::NeverRun,
            approver: String::new(),
            variables: HashMap::new(),
        }
    }

    /// A cause forced by a user, regardless of material changes.
    pub fn forced(material_revisions: MaterialRevisions, approver: impl Into<String>) -> Self {
        Self {
            material_revisions,
            trigger: BuildTrigger::Forced,
            approver: approver.into(),
            variables: HashMap::new(),
        }
    }

    /// A cause produced because materials changed.
    pub fn with_modifications(
        material_revisions: MaterialRevisions,
        approver: impl Into<String>,
    ) -> Self {
        Self {
            material_revisions,
            trigger: BuildTrigger::Modifications,
            approver: approver.into(),
            variables: HashMap::new(),
        }
    }

    /// A rerun cause carrying the previous revisions unchanged.
    pub fn empty_modifications(
        material_revisions: MaterialRevisions,
        approver: impl Into<String>,
    ) -> Self {
        Self {
            material_revisions,
            trigger: BuildTrigger::EmptyModifications,
            approver: approver.into(),
            variables: HashMap::new(),
        }
    }

    pub fn has_never_run(&self) -> bool {
        self.trigger == BuildTrigger::NeverRun
    }

    pub fn is_forced(&self) -> bool {
        self.trigger == BuildTrigger::Forced
    }

    pub fn trigger(&self) -> BuildTrigger {
        self.trigger
    }

    pub fn approver(&self) -> &str {
        &self.approver
    }

    pub fn material_revisions(&self) -> &MaterialRevisions {
        &self.material_revisions
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    /// Attach per-trigger environment variable overrides. Called once,
    /// before the cause is enqueued.
    pub fn add_overridden_variables(&mut self, variables: HashMap<String, String>) {
        self.variables.extend(variables);
    }

    /// True when this cause covers exactly the given material
    /// configurations. Guards against a configuration change racing the
    /// revision resolution.
    pub fn materials_match(&self, configs: &[MaterialConfig]) -> bool {
        let mine: HashSet<_> = self
            .material_revisions
            .iter()
            .map(|r| r.fingerprint().clone())
            .collect();
        let theirs: HashSet<_> = configs.iter().map(|c| c.fingerprint()).collect();
        mine == theirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MaterialConfig;
    use crate::material::{Material, Modification};
    use crate::revision::MaterialRevision;
    use chrono::Utc;

    fn git(url: &str) -> MaterialConfig {
        MaterialConfig::Git {
            url: url.to_string(),
            branch: "master".to_string(),
            username: None,
        }
    }

    fn revisions_for(configs: &[MaterialConfig]) -> MaterialRevisions {
        configs
            .iter()
            .map(|c| {
                MaterialRevision::new(
                    Material::new(c.clone()),
                    vec![Modification::new("r1", Utc::now())],
                )
            })
            .collect()
    }

    #[test]
    fn test_never_run_sentinel() {
        let cause = BuildCause::never_run();
        assert!(cause.has_never_run());
        assert!(!cause.is_forced());
    }

    #[test]
    fn test_materials_match_same_set() {
        let configs = vec![git("a"), git("b")];
        let cause = BuildCause::with_modifications(revisions_for(&configs), AUTO_APPROVER);
        assert!(cause.materials_match(&configs));
    }

    #[test]
    fn test_materials_match_detects_removed_material() {
        let cause =
            BuildCause::with_modifications(revisions_for(&[git("a"), git("b")]), AUTO_APPROVER);
        assert!(!cause.materials_match(&[git("a")]));
    }

    #[test]
    fn test_overridden_variables_are_attached() {
        let mut cause = BuildCause::forced(revisions_for(&[git("a")]), "alice");
        cause.add_overridden_variables(HashMap::from([(
            "DEPLOY_ENV".to_string(),
            "staging".to_string(),
        )]));
        assert_eq!(cause.variables()["DEPLOY_ENV"], "staging");
    }
}
