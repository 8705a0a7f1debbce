//! The ordered path index: a sorted map from full path to [`Entry`].
//!
//! This is the single source of truth for existence. There are no explicit
//! parent/child edges; the hierarchy is derived from byte-wise lexicographic
//! path order (see [`crate::readdir`]).

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use crate::entry::Entry;

/// Path of the always-present root directory.
pub const ROOT_PATH: &str = "/";

/// Ordered associative store for filesystem entries.
///
/// The root directory exists from construction until [`drain_all`].
///
/// [`drain_all`]: PathIndex::drain_all
#[derive(Debug, Default)]
pub struct PathIndex {
    entries: BTreeMap<String, Entry>,
}

impl PathIndex {
    /// A new index holding only the root directory.
    pub fn new() -> Self {
        let mut index = PathIndex {
            entries: BTreeMap::new(),
        };
        index.insert_if_absent(Entry::new_dir(ROOT_PATH));
        index
    }

    /// Store `entry` unless its path is already present. Returns whether
    /// the entry was stored; on `false` the entry is discarded and the
    /// existing one is untouched.
    pub fn insert_if_absent(&mut self, entry: Entry) -> bool {
        use std::collections::btree_map::Entry as Slot;
        match self.entries.entry(entry.path().to_string()) {
            Slot::Occupied(_) => false,
            Slot::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Exact-match lookup. Absence is not an error at this layer.
    pub fn find(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    /// Exact-match lookup, mutable.
    pub fn find_mut(&mut self, path: &str) -> Option<&mut Entry> {
        self.entries.get_mut(path)
    }

    /// Release the entry at `path`. Returns whether one was present.
    pub fn remove(&mut self, path: &str) -> bool {
        self.entries.remove(path).is_some()
    }

    /// The entry with the next-greater key, if any.
    pub fn successor<'a>(&'a self, path: &'a str) -> Option<&'a Entry> {
        self.range_after(path).next()
    }

    /// Entries with keys strictly greater than `path`, in sorted order.
    pub fn range_after<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.entries
            .range::<str, _>((Excluded(path), Unbounded))
            .map(|(_, entry)| entry)
    }

    /// Remove and return every stored entry. Used only at teardown; each
    /// entry is visited exactly once and the index is left empty (the root
    /// included).
    pub fn drain_all(&mut self) -> Vec<Entry> {
        std::mem::take(&mut self.entries).into_values().collect()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries (only after teardown).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
