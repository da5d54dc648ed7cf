//! Incremental change detection for the dynamic corpus.
//!
//! Compares a fresh source listing with the recorded modification times and
//! classifies every uri. Nothing here touches an index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::SourceEntry;

pub type FreshnessRecords = BTreeMap<String, DateTime<Utc>>;

/// Outcome of [`diff`]. Every list is sorted by uri.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<SourceEntry>,
    pub changed: Vec<SourceEntry>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool { self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty() }

    /// Entries that have to be (re)loaded and indexed.
    pub fn to_index(&self) -> impl Iterator<Item = &SourceEntry> { self.added.iter().chain(self.changed.iter()) }
}

/// A file counts as changed only when its listed mtime is strictly newer than
/// the recorded one; an older mtime (restored backup, clock skew) is ignored.
pub fn diff(listing: &[SourceEntry], records: &FreshnessRecords) -> ChangeSet {
    let mut set = ChangeSet::default();
    let mut seen = BTreeSet::new();

    for entry in listing {
        if !seen.insert(entry.uri.as_str()) { continue; }
        match records.get(&entry.uri) {
            None => set.added.push(entry.clone()),
            Some(recorded) if entry.modified_at > *recorded => set.changed.push(entry.clone()),
            Some(_) => set.unchanged.push(entry.uri.clone()),
        }
    }
    set.removed = records.keys().filter(|uri| !seen.contains(uri.as_str())).cloned().collect();

    set.added.sort_by(|a, b| a.uri.cmp(&b.uri));
    set.changed.sort_by(|a, b| a.uri.cmp(&b.uri));
    set.unchanged.sort();
    set
}
