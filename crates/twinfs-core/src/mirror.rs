//! Mirrored channel resolution.
//!
//! A dyad file is a file exactly one level inside a single top-level
//! directory: syntactically `/X/Y` with exactly two separators. Its twin
//! is `/Y/X`, the two segments swapped. Writes to a dyad file are
//! duplicated into the twin when it exists.

/// The twin path of a dyad file, or `None` if `path` is not dyad-shaped.
pub fn twin_path(path: &str) -> Option<String> {
    let rest = path.strip_prefix('/')?;
    let (first, second) = rest.split_once('/')?;
    if first.is_empty() || second.is_empty() || second.contains('/') {
        return None;
    }
    Some(format!("/{second}/{first}"))
}

/// Whether `path` names a dyad file.
pub fn is_dyad_path(path: &str) -> bool {
    twin_path(path).is_some()
}
