//! Referential integrity checks on a finished result set.
//!
//! A broken reference is a diagnostic, not an error: validation never
//! changes the result set and never aborts a run.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::merge::ResultSet;
use crate::registry::RelationRegistry;
use crate::resolve::ReferenceResolver;
use crate::types::{EntityKey, Reference};

/// A mandatory reference whose target is not in the result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BrokenReference {
    /// The match entry holding the reference.
    pub source: EntityKey,

    /// The relation the reference was found under.
    pub relation: String,

    /// The referenced type.
    pub target_type: String,

    /// The referenced id.
    pub target_id: String,
}

impl BrokenReference {
    /// Returns the key the reference points at.
    pub fn target(&self) -> EntityKey {
        EntityKey::new(self.target_type.clone(), self.target_id.clone())
    }
}

impl fmt::Display for BrokenReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}/{} not found",
            self.source, self.relation, self.target_type, self.target_id
        )
    }
}

/// Checks mandatory references of match entries.
#[derive(Debug, Clone)]
pub struct IntegrityValidator {
    registry: RelationRegistry,
}

impl Default for IntegrityValidator {
    fn default() -> Self {
        Self::new(RelationRegistry::directory())
    }
}

impl IntegrityValidator {
    /// Creates a validator using the mandatory relations of `registry`.
    pub fn new(registry: RelationRegistry) -> Self {
        Self { registry }
    }

    /// Returns one diagnostic per distinct broken reference, in match order.
    ///
    /// A mandatory relation with no value at all is not reported.
    pub fn validate(&self, result_set: &ResultSet) -> Vec<BrokenReference> {
        let resolver = ReferenceResolver::new(result_set);
        let mut seen = HashSet::new();
        let mut diagnostics = Vec::new();

        for entry in result_set.matches() {
            for def in self.registry.mandatory(&entry.key.resource_type) {
                for value in entry.resource.references(&def.relation) {
                    let Some(raw) = value.reference.as_deref() else {
                        continue;
                    };
                    let Some(reference) = Reference::parse(raw) else {
                        warn!(
                            source = %entry.key,
                            relation = %def.relation,
                            reference = raw,
                            "Skipping unparseable reference"
                        );
                        continue;
                    };
                    if resolver.resolve(&reference).is_some() {
                        continue;
                    }

                    let broken = BrokenReference {
                        source: entry.key.clone(),
                        relation: def.relation.clone(),
                        target_type: reference.target_type,
                        target_id: reference.target_id,
                    };
                    if seen.insert(broken.clone()) {
                        diagnostics.push(broken);
                    }
                }
            }
        }

        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::BundleMerger;
    use crate::types::{
        Entry, EntryRole, Page, Practitioner, PractitionerRole, ReferenceValue, Resource,
    };

    fn role(id: &str, practitioner: Option<&str>) -> Entry {
        Entry::new(
            EntryRole::Match,
            id,
            Resource::PractitionerRole(PractitionerRole {
                id: id.to_string(),
                practitioner: practitioner.map(ReferenceValue::literal),
                location: vec![ReferenceValue::literal("Location/not-harvested")],
                ..Default::default()
            }),
        )
    }

    fn practitioner(id: &str) -> Entry {
        Entry::new(
            EntryRole::Include,
            id,
            Resource::Practitioner(Practitioner {
                id: id.to_string(),
                ..Default::default()
            }),
        )
    }

    fn fold(entries: Vec<Entry>) -> ResultSet {
        let mut merger = BundleMerger::new();
        merger.fold(Page::new(entries, None));
        merger.finish()
    }

    #[test]
    fn test_missing_practitioner_reported_once() {
        let set = fold(vec![
            role("r1", Some("Practitioner/999")),
            role("r2", Some("Practitioner/123")),
            practitioner("123"),
        ]);

        let diagnostics = IntegrityValidator::default().validate(&set);
        assert_eq!(
            diagnostics,
            vec![BrokenReference {
                source: EntityKey::new("PractitionerRole", "r1"),
                relation: "practitioner".to_string(),
                target_type: "Practitioner".to_string(),
                target_id: "999".to_string(),
            }]
        );
        assert_eq!(diagnostics[0].target(), EntityKey::new("Practitioner", "999"));
        assert_eq!(
            diagnostics[0].to_string(),
            "PractitionerRole/r1 practitioner -> Practitioner/999 not found"
        );
    }

    #[test]
    fn test_repeated_match_not_reported_twice() {
        let set = fold(vec![
            role("r1", Some("Practitioner/999")),
            role("r1", Some("Practitioner/999")),
        ]);
        assert_eq!(IntegrityValidator::default().validate(&set).len(), 1);
    }

    #[test]
    fn test_absent_or_unparseable_reference_is_skipped() {
        let set = fold(vec![role("r1", None), role("r2", Some("#contained"))]);
        assert!(IntegrityValidator::default().validate(&set).is_empty());
    }

    #[test]
    fn test_validation_leaves_result_set_untouched() {
        let set = fold(vec![role("r1", Some("Practitioner/999"))]);
        let before = set.len();
        IntegrityValidator::default().validate(&set);
        assert_eq!(set.len(), before);
    }

    #[test]
    fn test_types_without_mandatory_relations() {
        let mut included_role = role("r1", Some("Practitioner/999"));
        included_role.role = EntryRole::Include;
        let set = fold(vec![included_role]);
        assert!(IntegrityValidator::default().validate(&set).is_empty());
        assert!(
            IntegrityValidator::new(RelationRegistry::new())
                .validate(&fold(vec![role("r2", Some("Practitioner/1"))]))
                .is_empty()
        );
    }
}
