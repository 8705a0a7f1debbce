//! Inode-to-path mapping for the bridge.
//!
//! The core is keyed by full path; the kernel speaks inode numbers. This
//! map assigns a stable inode per path for the life of the mapping and
//! tracks kernel lookup counts so `forget` can release slots.

use std::collections::HashMap;

/// Inode number of the root directory.
pub const ROOT_INO: u64 = 1;

#[derive(Debug)]
struct Slot {
    path: String,
    lookups: u64,
}

/// Bidirectional inode/path map with lookup counting.
#[derive(Debug)]
pub struct InodeMap {
    by_ino: HashMap<u64, Slot>,
    by_path: HashMap<String, u64>,
    next_ino: u64,
}

impl InodeMap {
    /// A fresh map with the root preassigned to [`ROOT_INO`].
    pub fn new() -> Self {
        let mut map = InodeMap {
            by_ino: HashMap::new(),
            by_path: HashMap::new(),
            next_ino: ROOT_INO + 1,
        };
        map.by_ino.insert(
            ROOT_INO,
            Slot {
                path: "/".to_string(),
                lookups: 1,
            },
        );
        map.by_path.insert("/".to_string(), ROOT_INO);
        map
    }

    /// Inode for `path`, allocating one if needed. Does not touch the
    /// lookup count; callers replying to a kernel lookup must also call
    /// [`add_lookup`](InodeMap::add_lookup).
    pub fn assign(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.by_path.get(path) {
            return ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.by_ino.insert(
            ino,
            Slot {
                path: path.to_string(),
                lookups: 0,
            },
        );
        self.by_path.insert(path.to_string(), ino);
        ino
    }

    /// Record one kernel reference to `ino`.
    pub fn add_lookup(&mut self, ino: u64) {
        if let Some(slot) = self.by_ino.get_mut(&ino) {
            slot.lookups += 1;
        }
    }

    /// Drop `n` kernel references; the slot is released when the count
    /// reaches zero. The root is never released.
    pub fn forget(&mut self, ino: u64, n: u64) {
        if ino == ROOT_INO {
            return;
        }
        let release = match self.by_ino.get_mut(&ino) {
            Some(slot) => {
                slot.lookups = slot.lookups.saturating_sub(n);
                slot.lookups == 0
            }
            None => false,
        };
        if release {
            if let Some(slot) = self.by_ino.remove(&ino) {
                self.by_path.remove(&slot.path);
            }
        }
    }

    /// Path mapped to `ino`, if any.
    pub fn path_of(&self, ino: u64) -> Option<&str> {
        self.by_ino.get(&ino).map(|slot| slot.path.as_str())
    }

    /// Inode mapped to `path`, if any.
    pub fn ino_of(&self, path: &str) -> Option<u64> {
        self.by_path.get(path).copied()
    }

    /// Remove the mapping for `path` after the entry itself is gone.
    pub fn drop_path(&mut self, path: &str) {
        if let Some(ino) = self.by_path.remove(path) {
            self.by_ino.remove(&ino);
        }
    }

    /// Reset to a fresh map holding only the root.
    pub fn clear(&mut self) {
        *self = InodeMap::new();
    }

    /// Number of mapped inodes.
    pub fn len(&self) -> usize {
        self.by_ino.len()
    }

    /// Whether only mappings beyond the root exist.
    pub fn is_empty(&self) -> bool {
        self.by_ino.is_empty()
    }
}

impl Default for InodeMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Join a directory path and a child name into a full path.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}
