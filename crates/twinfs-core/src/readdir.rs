//! Directory enumeration derived from sorted path order.
//!
//! No child lists are maintained anywhere; a directory's contents are
//! recovered by scanning the index forward from the directory's own key.
//! Every descendant of `/a` sorts after `/a` and before the first
//! non-descendant, so the scan stops at the first path that no longer
//! carries the parent prefix. This assumes the separator byte (`/`, 0x2F)
//! sorts below every byte legal in a segment name.

use crate::error::{FsError, Result};
use crate::index::{PathIndex, ROOT_PATH};

/// The remainder of `candidate` after its parent prefix, if `candidate`
/// is a strict descendant of `parent`.
///
/// `child_suffix("/a", "/a/b/c")` is `Some("b/c")`; `child_suffix("/a",
/// "/ab")` is `None`.
pub fn child_suffix<'a>(parent: &str, candidate: &'a str) -> Option<&'a str> {
    if parent == ROOT_PATH {
        let rest = candidate.strip_prefix('/')?;
        return (!rest.is_empty()).then_some(rest);
    }
    candidate.strip_prefix(parent)?.strip_prefix('/')
}

/// Whether `candidate` lies strictly below `parent`.
pub fn is_descendant(parent: &str, candidate: &str) -> bool {
    child_suffix(parent, candidate).is_some()
}

/// Names contained in the directory at `path`: `.`, `..` (except for the
/// root), and the direct children in index order.
pub fn list_names(index: &PathIndex, path: &str) -> Result<Vec<String>> {
    let entry = index.find(path).ok_or_else(|| FsError::not_found(path))?;
    if !entry.is_dir() {
        return Err(FsError::NotADirectory {
            path: path.to_string(),
        });
    }

    let mut names = vec![".".to_string()];
    if path != ROOT_PATH {
        names.push("..".to_string());
    }

    for candidate in index.range_after(path) {
        let Some(rest) = child_suffix(path, candidate.path()) else {
            // Sorted order guarantees no descendant appears later.
            break;
        };
        // A deeper descendant (grandchild or beyond); keep scanning.
        if rest.contains('/') {
            continue;
        }
        names.push(rest.to_string());
    }

    Ok(names)
}
