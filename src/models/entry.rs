// src/models/entry.rs

use std::collections::BTreeSet;
use std::fmt;

/// A normalized URL taken from the feed. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entry(String);

impl Entry {
    /// Trim a raw candidate; blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deduplicated entries in ascending byte order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntrySet {
    entries: BTreeSet<Entry>,
}

impl EntrySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning `false` if it was already present.
    pub fn insert(&mut self, entry: Entry) -> bool {
        self.entries.insert(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        Entry::parse(url).is_some_and(|e| self.entries.contains(&e))
    }

    /// Entries in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Snapshot file body: one entry per line, newline-terminated.
    pub fn to_snapshot_bytes(&self) -> Vec<u8> {
        let capacity = self.entries.iter().map(|e| e.0.len() + 1).sum();
        let mut out = Vec::with_capacity(capacity);
        for entry in &self.entries {
            out.extend_from_slice(entry.0.as_bytes());
            out.push(b'\n');
        }
        out
    }

    /// Read a snapshot body back, skipping blank lines.
    pub fn from_snapshot(text: &str) -> Self {
        text.lines().filter_map(Entry::parse).collect()
    }
}

impl FromIterator<Entry> for EntrySet {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EntrySet {
    type Item = &'a Entry;
    type IntoIter = std::collections::btree_set::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
