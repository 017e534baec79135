//! Material revisions: the resolved state of a pipeline's materials.

use crate::ids::Fingerprint;
use crate::material::{Material, Modification};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A material paired with the modifications selected for a build, plus a
/// flag recording whether those modifications differ from the previous
/// build's.
///
/// An entry with no modifications marks a material that could not be
/// resolved (empty repository, unreachable remote).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRevision {
    material: Material,
    /// Newest first.
    modifications: Vec<Modification>,
    changed: bool,
}

impl MaterialRevision {
    pub fn new(material: Material, modifications: Vec<Modification>) -> Self {
        Self {
            material,
            modifications,
            changed: false,
        }
    }

    /// An entry for a material whose history could not be resolved.
    pub fn unresolved(material: Material) -> Self {
        Self::new(material, vec![])
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        self.material.fingerprint()
    }

    pub fn modifications(&self) -> &[Modification] {
        &self.modifications
    }

    pub fn has_modifications(&self) -> bool {
        !self.modifications.is_empty()
    }

    /// The newest selected revision identifier, if any resolved.
    pub fn latest_revision(&self) -> Option<&str> {
        self.modifications.first().map(|m| m.revision.as_str())
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn mark_as_changed(&mut self) {
        self.changed = true;
    }

    pub fn mark_as_not_changed(&mut self) {
        self.changed = false;
    }

    /// Consuming variant of [`mark_as_changed`](Self::mark_as_changed) for
    /// construction chains.
    pub fn changed(mut self) -> Self {
        self.changed = true;
        self
    }
}

/// Ordered collection of [`MaterialRevision`], one entry per distinct
/// material fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialRevisions {
    revisions: Vec<MaterialRevision>,
}

impl MaterialRevisions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. A second entry for an already-present fingerprint
    /// replaces the first in place, preserving order, so the
    /// one-per-fingerprint invariant holds by construction.
    pub fn add(&mut self, revision: MaterialRevision) {
        match self
            .revisions
            .iter_mut()
            .find(|r| r.fingerprint() == revision.fingerprint())
        {
            Some(existing) => *existing = revision,
            None => self.revisions.push(revision),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialRevision> {
        self.revisions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MaterialRevision> {
        self.revisions.iter_mut()
    }

    pub fn find(&self, fingerprint: &Fingerprint) -> Option<&MaterialRevision> {
        self.revisions
            .iter()
            .find(|r| r.fingerprint() == fingerprint)
    }

    pub fn materials(&self) -> Vec<&Material> {
        self.revisions.iter().map(|r| r.material()).collect()
    }

    fn fingerprints(&self) -> HashSet<&Fingerprint> {
        self.revisions.iter().map(|r| r.fingerprint()).collect()
    }

    /// True when no revision set could be produced for at least one
    /// material. Callers must treat a missing set as "do not schedule".
    pub fn is_missing_modifications(&self) -> bool {
        self.is_empty() || self.revisions.iter().any(|r| !r.has_modifications())
    }

    /// Pure change detection against a previous revision set: true iff any
    /// entry carries the changed flag or the set of materials differs.
    pub fn has_changed_since(&self, previous: &MaterialRevisions) -> bool {
        self.revisions.iter().any(|r| r.is_changed())
            || self.fingerprints() != previous.fingerprints()
    }
}

impl FromIterator<MaterialRevision> for MaterialRevisions {
    fn from_iter<I: IntoIterator<Item = MaterialRevision>>(iter: I) -> Self {
        let mut revisions = MaterialRevisions::new();
        for revision in iter {
            revisions.add(revision);
        }
        revisions
    }
}

impl<'a> IntoIterator for &'a MaterialRevisions {
    type Item = &'a MaterialRevision;
    type IntoIter = std::slice::Iter<'a, MaterialRevision>;

    fn into_iter(self) -> Self::IntoIter {
        self.revisions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MaterialConfig;
    use chrono::Utc;

    fn material(url: &str) -> Material {
        Material::new(MaterialConfig::Git {
            url: url.to_string(),
            branch: "master".to_string(),
            username: None,
        })
    }

    fn revision(url: &str, rev: &str) -> MaterialRevision {
        MaterialRevision::new(material(url), vec![Modification::new(rev, Utc::now())])
    }

    #[test]
    fn test_one_entry_per_fingerprint() {
        let mut revisions = MaterialRevisions::new();
        revisions.add(revision("url-a", "1"));
        revisions.add(revision("url-a", "2"));
        assert_eq!(revisions.len(), 1);
        let entry = revisions.iter().next().unwrap();
        assert_eq!(entry.latest_revision(), Some("2"));
    }

    #[test]
    fn test_empty_set_is_missing_modifications() {
        assert!(MaterialRevisions::new().is_missing_modifications());
    }

    #[test]
    fn test_unresolved_entry_is_missing_modifications() {
        let revisions: MaterialRevisions = [
            revision("url-a", "1"),
            MaterialRevision::unresolved(material("url-b")),
        ]
        .into_iter()
        .collect();
        assert!(revisions.is_missing_modifications());
    }

    #[test]
    fn test_fully_resolved_set_is_not_missing_modifications() {
        let revisions: MaterialRevisions =
            [revision("url-a", "1"), revision("url-b", "2")].into_iter().collect();
        assert!(!revisions.is_missing_modifications());
    }

    #[test]
    fn test_no_changed_flags_means_unchanged() {
        let previous: MaterialRevisions = [revision("url-a", "1")].into_iter().collect();
        let current: MaterialRevisions = [revision("url-a", "1")].into_iter().collect();
        assert!(!current.has_changed_since(&previous));
    }

    #[test]
    fn test_changed_flag_is_detected() {
        let previous: MaterialRevisions = [revision("url-a", "1")].into_iter().collect();
        let current: MaterialRevisions = [revision("url-a", "2").changed()].into_iter().collect();
        assert!(current.has_changed_since(&previous));
    }

    #[test]
    fn test_added_material_is_a_change() {
        let previous: MaterialRevisions = [revision("url-a", "1")].into_iter().collect();
        let current: MaterialRevisions =
            [revision("url-a", "1"), revision("url-b", "1")].into_iter().collect();
        assert!(current.has_changed_since(&previous));
    }

    #[test]
    fn test_removed_material_is_a_change() {
        let previous: MaterialRevisions =
            [revision("url-a", "1"), revision("url-b", "1")].into_iter().collect();
        let current: MaterialRevisions = [revision("url-a", "1")].into_iter().collect();
        assert!(current.has_changed_since(&previous));
    }
}
