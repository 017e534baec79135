//! Per-request scheduling options.

use crate::ids::Fingerprint;
use std::collections::HashMap;

/// Ephemeral input accompanying a single trigger request. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleOptions {
    /// Revisions pinned per material fingerprint, overriding "latest".
    pub specified_revisions: HashMap<Fingerprint, String>,
    /// Environment variable overrides for the produced build cause.
    pub variables: HashMap<String, String>,
    /// Secure variable overrides, kept apart so they can be masked at the
    /// edges.
    pub secure_variables: HashMap<String, String>,
    update_materials_before_scheduling: bool,
}

impl ScheduleOptions {
    pub fn new() -> Self {
        Self {
            update_materials_before_scheduling: true,
            ..Default::default()
        }
    }

    pub fn with_specified_revision(mut self, fingerprint: Fingerprint, revision: &str) -> Self {
        self.specified_revisions
            .insert(fingerprint, revision.to_string());
        self
    }

    pub fn with_variable(mut self, name: &str, value: &str) -> Self {
        self.variables.insert(name.to_string(), value.to_string());
        self
    }

    /// Whether a manual trigger refreshes material history before
    /// scheduling. On by default.
    pub fn update_materials_before_scheduling(&self) -> bool {
        self.update_materials_before_scheduling
    }

    pub fn set_update_materials_before_scheduling(&mut self, update: bool) {
        self.update_materials_before_scheduling = update;
    }

    /// All variable overrides, secure ones last.
    pub fn all_variables(&self) -> HashMap<String, String> {
        let mut all = self.variables.clone();
        all.extend(self.secure_variables.clone());
        all
    }
}
