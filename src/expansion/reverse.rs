//! Per-path record of produced values and the originals behind them.
use std::collections::HashMap;

use dashmap::DashMap;

/// What one produced value was expanded from, for one path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReverseEntry {
    pub count: usize,
    /// Distinct originals in first-seen order.
    pub originals: Vec<String>,
}

impl ReverseEntry {
    pub fn is_ambiguous(&self) -> bool {
        self.originals.len() > 1
    }
}

/// One value to put back during un-expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restoration {
    pub value: String,
    pub original: String,
    pub count: usize,
}

#[derive(Debug, Default)]
struct PathEntries {
    order: Vec<String>,
    by_value: HashMap<String, ReverseEntry>,
}

impl PathEntries {
    fn slot(&mut self, value: &str) -> &mut ReverseEntry {
        if !self.by_value.contains_key(value) {
            self.order.push(value.to_string());
        }
        self.by_value.entry(value.to_string()).or_default()
    }
}

/// `path -> value -> (count, originals)`.
///
/// Each path lives in its own map slot; the sharded map locks per slot, so
/// tasks working on different paths never contend on the same entry.
#[derive(Debug, Default)]
pub struct ReverseIndex {
    paths: DashMap<String, PathEntries>,
}

impl ReverseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate `original` for `value`. Returns the originals recorded
    /// before this call when they differ from `original`.
    pub fn record(&self, path: &str, value: &str, original: &str) -> Option<Vec<String>> {
        let mut entries = self.paths.entry(path.to_string()).or_default();
        let entry = entries.slot(value);
        entry.count += 1;
        if entry.originals.iter().any(|o| o == original) {
            return None;
        }
        let previous = entry.originals.clone();
        entry.originals.push(original.to_string());
        if previous.is_empty() {
            None
        } else {
            Some(previous)
        }
    }

    /// Make `original` the only source of `value`. Returns the original it
    /// displaced, if it was a different one.
    pub fn record_latest(&self, path: &str, value: &str, original: &str) -> Option<String> {
        let mut entries = self.paths.entry(path.to_string()).or_default();
        let entry = entries.slot(value);
        entry.count += 1;
        let displaced = entry
            .originals
            .last()
            .filter(|previous| previous.as_str() != original)
            .cloned();
        entry.originals = vec![original.to_string()];
        displaced
    }

    /// Whether anything was recorded for `path`.
    pub fn contains_path(&self, path: &str) -> bool {
        self.paths.contains_key(path)
    }

    pub fn entry(&self, path: &str, value: &str) -> Option<ReverseEntry> {
        self.paths
            .get(path)
            .and_then(|entries| entries.by_value.get(value).cloned())
    }

    /// Values of `path` produced from more than one original.
    pub fn ambiguous(&self, path: &str) -> Vec<(String, Vec<String>)> {
        let Some(entries) = self.paths.get(path) else {
            return Vec::new();
        };
        entries
            .order
            .iter()
            .filter_map(|value| {
                let entry = entries.by_value.get(value)?;
                entry
                    .is_ambiguous()
                    .then(|| (value.clone(), entry.originals.clone()))
            })
            .collect()
    }

    /// Pick one original per value of `path`, longest value first so that a
    /// value containing another one is restored before it.
    ///
    /// An ambiguous entry gives up its most recent original on each call;
    /// an entry with a single original keeps it.
    pub fn take_restorations(&self, path: &str) -> Vec<Restoration> {
        let Some(mut entries) = self.paths.get_mut(path) else {
            return Vec::new();
        };
        let entries = &mut *entries;
        let mut out = Vec::with_capacity(entries.order.len());
        for value in &entries.order {
            let Some(entry) = entries.by_value.get_mut(value) else {
                continue;
            };
            let original = if entry.originals.len() > 1 {
                entry.originals.pop()
            } else {
                entry.originals.first().cloned()
            };
            if let Some(original) = original {
                out.push(Restoration {
                    value: value.clone(),
                    original,
                    count: entry.count,
                });
            }
        }
        // Stable sort keeps first-seen order among equal lengths.
        out.sort_by(|a, b| b.value.len().cmp(&a.value.len()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_counts_and_flags_collisions() {
        let index = ReverseIndex::new();
        assert_eq!(index.record("a.sql", "1", "${foo}"), None);
        assert_eq!(index.record("a.sql", "1", "${foo}"), None);
        assert_eq!(
            index.record("a.sql", "1", "${bar}"),
            Some(vec!["${foo}".to_string()])
        );
        let entry = index.entry("a.sql", "1").unwrap();
        assert_eq!(entry.count, 3);
        assert_eq!(entry.originals, vec!["${foo}", "${bar}"]);
        assert_eq!(index.ambiguous("a.sql").len(), 1);
    }

    #[test]
    fn record_latest_replaces() {
        let index = ReverseIndex::new();
        assert_eq!(index.record_latest("a", "1", "x"), None);
        assert_eq!(index.record_latest("a", "1", "x"), None);
        assert_eq!(index.record_latest("a", "1", "y"), Some("x".to_string()));
        assert_eq!(index.entry("a", "1").unwrap().originals, vec!["y"]);
    }

    #[test]
    fn paths_are_isolated() {
        let index = ReverseIndex::new();
        index.record("a.sql", "1", "${foo}");
        assert!(index.contains_path("a.sql"));
        assert!(!index.contains_path("b.sql"));
        assert!(index.take_restorations("b.sql").is_empty());
    }

    #[test]
    fn restorations_longest_first_and_drain_ambiguous() {
        let index = ReverseIndex::new();
        index.record("p", "1", "${one}");
        index.record("p", "10", "${ten}");
        index.record("p", "10", "${TEN}");

        let first = index.take_restorations("p");
        assert_eq!(first[0].value, "10");
        assert_eq!(first[0].original, "${TEN}");
        assert_eq!(first[1].value, "1");

        let second = index.take_restorations("p");
        assert_eq!(second[0].original, "${ten}");
        let third = index.take_restorations("p");
        assert_eq!(third[0].original, "${ten}");
        assert_eq!(third[1].original, "${one}");
    }
}
