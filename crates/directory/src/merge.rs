//! Folding search pages into a single result set.
//!
//! Match entries are kept exactly as the server returned them, including
//! repeats across overlapping pages, so match counts line up with the
//! server's totals. Included entries are joined data and are stored once per
//! key: the first occurrence wins and later copies are dropped.

use std::collections::HashMap;

use tracing::trace;

use crate::types::{Entry, EntityKey, EntryRole, Page};

/// The accumulated entries of a harvest run.
///
/// Entries are only ever appended. Every stored key stays reachable through
/// [`ResultSet::get`], which returns the first entry stored under it.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    entries: Vec<Entry>,
    index: HashMap<EntityKey, usize>,
    matches: Vec<usize>,
    includes: Vec<usize>,
}

impl ResultSet {
    /// Creates an empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the first entry stored under `key`.
    pub fn get(&self, key: &EntityKey) -> Option<&Entry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    /// Returns true if any entry is stored under `key`.
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.index.contains_key(key)
    }

    /// Match entries in fetch order, repeats included.
    pub fn matches(&self) -> impl Iterator<Item = &Entry> {
        self.matches.iter().map(|&i| &self.entries[i])
    }

    /// Included entries in fetch order, one per key.
    pub fn includes(&self) -> impl Iterator<Item = &Entry> {
        self.includes.iter().map(|&i| &self.entries[i])
    }

    /// Every stored entry in fetch order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of match entries, repeats included.
    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Number of distinct included entries.
    pub fn include_count(&self) -> usize {
        self.includes.len()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: Entry) -> usize {
        let position = self.entries.len();
        self.index.entry(entry.key.clone()).or_insert(position);
        self.entries.push(entry);
        position
    }
}

/// Folds pages into a [`ResultSet`].
#[derive(Debug, Default)]
pub struct BundleMerger {
    result_set: ResultSet,
}

impl BundleMerger {
    /// Creates a merger with an empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one page and returns its continuation indicator.
    pub fn fold(&mut self, page: Page) -> Option<String> {
        let mut dropped = 0usize;

        for entry in page.entries {
            match entry.role {
                EntryRole::Match => {
                    let position = self.result_set.push(entry);
                    self.result_set.matches.push(position);
                }
                EntryRole::Include => {
                    if self.result_set.contains(&entry.key) {
                        trace!(key = %entry.key, "Dropping repeated include");
                        dropped += 1;
                        continue;
                    }
                    let position = self.result_set.push(entry);
                    self.result_set.includes.push(position);
                }
            }
        }

        trace!(
            matches = self.result_set.match_count(),
            includes = self.result_set.include_count(),
            dropped,
            "Folded page"
        );

        page.continuation
    }

    /// Returns true once the match count has reached `cap`.
    ///
    /// An absent cap never stops the run.
    pub fn cap_reached(&self, cap: Option<usize>) -> bool {
        cap.is_some_and(|cap| self.result_set.match_count() >= cap)
    }

    /// The result set accumulated so far.
    pub fn result_set(&self) -> &ResultSet {
        &self.result_set
    }

    /// Consumes the merger and returns the terminal result set.
    pub fn finish(self) -> ResultSet {
        self.result_set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Location, Practitioner, PractitionerRole, Resource};

    fn role(id: &str) -> Entry {
        Entry::new(
            EntryRole::Match,
            id,
            Resource::PractitionerRole(PractitionerRole {
                id: id.to_string(),
                ..Default::default()
            }),
        )
    }

    fn practitioner(id: &str, family: &str) -> Entry {
        let mut p = Practitioner {
            id: id.to_string(),
            ..Default::default()
        };
        p.name.push(crate::types::HumanName {
            family: Some(family.to_string()),
            ..Default::default()
        });
        Entry::new(EntryRole::Include, id, Resource::Practitioner(p))
    }

    fn location(id: &str) -> Entry {
        Entry::new(
            EntryRole::Include,
            id,
            Resource::Location(Location {
                id: id.to_string(),
                ..Default::default()
            }),
        )
    }

    fn keys<'a>(entries: impl Iterator<Item = &'a Entry>) -> Vec<String> {
        entries.map(|e| e.key.to_string()).collect()
    }

    #[test]
    fn test_single_page_keeps_order() {
        let mut merger = BundleMerger::new();
        let next = merger.fold(Page::new(
            vec![role("a"), practitioner("x", "Kidman"), role("b"), location("y")],
            None,
        ));

        assert_eq!(next, None);
        let set = merger.finish();
        assert_eq!(
            keys(set.matches()),
            vec!["PractitionerRole/a", "PractitionerRole/b"]
        );
        assert_eq!(keys(set.includes()), vec!["Practitioner/x", "Location/y"]);
    }

    #[test]
    fn test_includes_deduplicated_across_pages() {
        let mut merger = BundleMerger::new();
        let next = merger.fold(Page::new(
            vec![role("a"), practitioner("x", "Kidman")],
            Some("_getpagesoffset=1".to_string()),
        ));
        assert_eq!(next.as_deref(), Some("_getpagesoffset=1"));
        merger.fold(Page::new(
            vec![role("b"), practitioner("x", "Urban"), location("y")],
            None,
        ));

        let set = merger.finish();
        assert_eq!(set.match_count(), 2);
        assert_eq!(set.include_count(), 2);
        assert_eq!(set.len(), 4);
        assert_eq!(keys(set.includes()), vec!["Practitioner/x", "Location/y"]);

        let kept = set.get(&EntityKey::new("Practitioner", "x")).unwrap();
        assert_eq!(kept.resource.display_name().as_deref(), Some("Kidman"));
    }

    #[test]
    fn test_repeated_matches_are_kept() {
        let mut merger = BundleMerger::new();
        merger.fold(Page::new(vec![role("a"), role("b")], Some("next".into())));
        merger.fold(Page::new(vec![role("b"), role("c")], None));

        let set = merger.finish();
        assert_eq!(set.match_count(), 4);
        assert_eq!(
            keys(set.matches()),
            vec![
                "PractitionerRole/a",
                "PractitionerRole/b",
                "PractitionerRole/b",
                "PractitionerRole/c"
            ]
        );
        assert!(set.contains(&EntityKey::new("PractitionerRole", "b")));
    }

    #[test]
    fn test_include_after_match_with_same_key_is_dropped() {
        let mut merger = BundleMerger::new();
        let mut included_role = role("a");
        included_role.role = EntryRole::Include;
        merger.fold(Page::new(vec![role("a"), included_role], None));

        let set = merger.result_set();
        assert_eq!(set.match_count(), 1);
        assert_eq!(set.include_count(), 0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_earlier_entries_stay_reachable() {
        let mut merger = BundleMerger::new();
        merger.fold(Page::new(vec![role("a"), location("y")], Some("n".into())));
        let before: Vec<EntityKey> = merger
            .result_set()
            .entries()
            .iter()
            .map(|e| e.key.clone())
            .collect();
        merger.fold(Page::new(vec![role("a"), location("y"), location("z")], None));

        let set = merger.finish();
        for key in &before {
            assert!(set.get(key).is_some(), "{key} lost");
        }
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_cap_reached() {
        let mut merger = BundleMerger::new();
        assert!(!merger.cap_reached(None));
        assert!(merger.cap_reached(Some(0)));

        merger.fold(Page::new(vec![role("a"), role("b"), role("c")], None));
        assert!(!merger.cap_reached(Some(5)));
        merger.fold(Page::new(vec![role("d"), role("e"), role("f")], None));
        assert!(merger.cap_reached(Some(5)));
        assert!(merger.cap_reached(Some(6)));
        assert!(!merger.cap_reached(Some(7)));
        assert!(!merger.cap_reached(None));
    }

    #[test]
    fn test_empty_result_set() {
        let set = ResultSet::new();
        assert!(set.is_empty());
        assert_eq!(set.matches().count(), 0);
        assert!(set.get(&EntityKey::new("Practitioner", "123")).is_none());
    }
}
