//! The operation surface consumed by the FUSE bridge.
//!
//! [`MemFs`] owns the path index behind a single read/write lock. Every
//! mutating operation, the mirrored twin write included, runs under one
//! write guard; read-only operations share a read guard. Operations are
//! synchronous and bounded: they complete or fail immediately.

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::entry::{Entry, EntryKind};
use crate::error::{FsError, Result};
use crate::index::{PathIndex, ROOT_PATH};
use crate::{mirror, readdir};

/// Path of the operation journal file, when enabled.
pub const OPLOG_PATH: &str = "/log";

/// Journal growth stops once the file reaches this size.
const OPLOG_CAP: usize = 64 * 1024;

/// Filesystem construction options.
#[derive(Debug, Clone, Default)]
pub struct MemFsConfig {
    /// Keep an operation journal in a regular file at [`OPLOG_PATH`].
    pub oplog: bool,
}

/// Attributes reported for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attrs {
    /// File or directory.
    pub kind: EntryKind,
    /// Apparent size in bytes; zero for directories.
    pub size: u64,
}

/// How a file is being opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenRequest {
    /// Create the file if it is missing.
    pub create: bool,
    /// The access mode is read-only.
    pub read_only: bool,
}

/// The in-memory filesystem.
pub struct MemFs {
    state: RwLock<PathIndex>,
    oplog: bool,
}

impl MemFs {
    /// A filesystem holding only the root directory (plus the journal
    /// file when enabled).
    pub fn new(config: MemFsConfig) -> Self {
        let mut index = PathIndex::new();
        if config.oplog {
            index.insert_if_absent(Entry::new_file(OPLOG_PATH));
        }
        MemFs {
            state: RwLock::new(index),
            oplog: config.oplog,
        }
    }

    /// Append one journal line. Best-effort: stops silently once the
    /// journal file is gone or full.
    fn record(&self, op: &str, path: &str) {
        if !self.oplog {
            return;
        }
        let mut index = self.state.write();
        let Some(buf) = index.find_mut(OPLOG_PATH).and_then(Entry::content_mut) else {
            return;
        };
        let line = format!("call [{op}] for path: [{path}]\n");
        let offset = buf.len();
        if offset + line.len() <= OPLOG_CAP {
            let _ = buf.write(offset, line.as_bytes());
        }
    }

    /// Attributes of the entry at `path`.
    pub fn getattr(&self, path: &str) -> Result<Attrs> {
        self.record("getattr", path);
        let index = self.state.read();
        let entry = index.find(path).ok_or_else(|| FsError::not_found(path))?;
        Ok(Attrs {
            kind: entry.kind(),
            size: entry.size(),
        })
    }

    /// Create a directory at `path`.
    pub fn mkdir(&self, path: &str) -> Result<()> {
        self.record("mkdir", path);
        self.create_entry(Entry::new_dir(path))
    }

    /// Create an empty file at `path`.
    pub fn create_file(&self, path: &str) -> Result<()> {
        self.record("mknod", path);
        self.create_entry(Entry::new_file(path))
    }

    fn create_entry(&self, entry: Entry) -> Result<()> {
        let mut index = self.state.write();
        ensure_parent(&index, entry.path())?;
        let path = entry.path().to_string();
        if index.insert_if_absent(entry) {
            Ok(())
        } else {
            Err(FsError::AlreadyExists { path })
        }
    }

    /// Open the file at `path`, creating it when `req.create` is set and
    /// the access mode allows writing.
    pub fn open(&self, path: &str, req: OpenRequest) -> Result<Attrs> {
        self.record("open", path);
        let mut index = self.state.write();
        match index.find(path) {
            Some(entry) if entry.is_dir() => Err(FsError::IsADirectory {
                path: path.to_string(),
            }),
            Some(entry) => Ok(Attrs {
                kind: entry.kind(),
                size: entry.size(),
            }),
            None => {
                if req.read_only || !req.create {
                    return Err(FsError::PermissionDenied {
                        path: path.to_string(),
                    });
                }
                ensure_parent(&index, path)?;
                index.insert_if_absent(Entry::new_file(path));
                Ok(Attrs {
                    kind: EntryKind::File,
                    size: 0,
                })
            }
        }
    }

    /// Read up to `size` bytes from `path` starting at `offset`.
    pub fn read(&self, path: &str, offset: u64, size: u32) -> Result<Vec<u8>> {
        self.record("read", path);
        let index = self.state.read();
        let entry = index.find(path).ok_or_else(|| FsError::not_found(path))?;
        let buf = entry.content().ok_or_else(|| FsError::IsADirectory {
            path: path.to_string(),
        })?;
        Ok(buf.read(offset as usize, size as usize).to_vec())
    }

    /// Write `data` at `offset` into the file at `path`, then duplicate
    /// the same write into the twin file when `path` is a dyad file and
    /// the twin exists. Both writes happen under one critical section; a
    /// mirror failure never rolls back or fails the primary write.
    pub fn write(&self, path: &str, offset: u64, data: &[u8]) -> Result<usize> {
        self.record("write", path);
        let mut index = self.state.write();
        let entry = index
            .find_mut(path)
            .ok_or_else(|| FsError::not_found(path))?;
        let buf = entry.content_mut().ok_or_else(|| FsError::IsADirectory {
            path: path.to_string(),
        })?;
        let written = buf.write(offset as usize, data)?;

        if let Some(twin) = mirror::twin_path(path) {
            if let Some(twin_buf) = index.find_mut(&twin).and_then(Entry::content_mut) {
                if let Err(err) = twin_buf.write(offset as usize, data) {
                    warn!(path, twin = %twin, %err, "mirrored write failed");
                }
            }
        }

        Ok(written)
    }

    /// Remove the file at `path`.
    pub fn unlink(&self, path: &str) -> Result<()> {
        self.record("unlink", path);
        let mut index = self.state.write();
        match index.find(path) {
            None => Err(FsError::not_found(path)),
            Some(entry) if entry.is_dir() => Err(FsError::IsADirectory {
                path: path.to_string(),
            }),
            Some(_) => {
                index.remove(path);
                Ok(())
            }
        }
    }

    /// Remove the directory at `path`. Fails on the root, on files, and
    /// on directories that still have descendants.
    pub fn rmdir(&self, path: &str) -> Result<()> {
        self.record("rmdir", path);
        let mut index = self.state.write();
        if path == ROOT_PATH {
            return Err(FsError::PermissionDenied {
                path: path.to_string(),
            });
        }
        match index.find(path) {
            None => Err(FsError::not_found(path)),
            Some(entry) if !entry.is_dir() => Err(FsError::NotADirectory {
                path: path.to_string(),
            }),
            Some(_) => {
                let occupied = matches!(
                    index.successor(path),
                    Some(next) if readdir::is_descendant(path, next.path())
                );
                if occupied {
                    return Err(FsError::NotEmpty {
                        path: path.to_string(),
                    });
                }
                index.remove(path);
                Ok(())
            }
        }
    }

    /// Names contained in the directory at `path`.
    pub fn list(&self, path: &str) -> Result<Vec<String>> {
        self.record("readdir", path);
        let index = self.state.read();
        readdir::list_names(&index, path)
    }

    /// Release every entry. After this the index is empty; the instance
    /// is only valid for unmount, not continued use.
    pub fn destroy(&self) {
        let mut index = self.state.write();
        let drained = index.drain_all();
        info!(entries = drained.len(), "filesystem destroyed");
    }

    /// Number of live entries.
    pub fn entry_count(&self) -> usize {
        self.state.read().len()
    }
}

/// Path of the containing directory; the root is its own parent.
pub fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => ROOT_PATH,
        Some(pos) => &path[..pos],
    }
}

fn ensure_parent(index: &PathIndex, path: &str) -> Result<()> {
    if path == ROOT_PATH {
        return Ok(());
    }
    let parent = parent_of(path);
    match index.find(parent) {
        None => Err(FsError::not_found(parent)),
        Some(entry) if !entry.is_dir() => Err(FsError::NotADirectory {
            path: parent.to_string(),
        }),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_fs() -> MemFs {
        MemFs::new(MemFsConfig::default())
    }

    fn make_dyad_fs() -> MemFs {
        let fs = make_fs();
        fs.mkdir("/room1").unwrap();
        fs.mkdir("/room2").unwrap();
        fs.create_file("/room1/room2").unwrap();
        fs.create_file("/room2/room1").unwrap();
        fs
    }

    #[test]
    fn test_new_fs_has_root_only() {
        let fs = make_fs();
        assert_eq!(fs.entry_count(), 1);
        let attrs = fs.getattr("/").unwrap();
        assert_eq!(attrs.kind, EntryKind::Directory);
    }

    #[test]
    fn test_getattr_missing_is_not_found() {
        let fs = make_fs();
        assert!(matches!(
            fs.getattr("/missing"),
            Err(FsError::NotFound { .. })
        ));
    }

    #[test]
    fn test_create_file_twice_fails() {
        let fs = make_fs();
        fs.create_file("/a").unwrap();
        assert!(matches!(
            fs.create_file("/a"),
            Err(FsError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_mkdir_twice_fails() {
        let fs = make_fs();
        fs.mkdir("/d").unwrap();
        assert!(matches!(fs.mkdir("/d"), Err(FsError::AlreadyExists { .. })));
    }

    #[test]
    fn test_duplicate_create_keeps_original_content() {
        let fs = make_fs();
        fs.create_file("/a").unwrap();
        fs.write("/a", 0, b"keep me").unwrap();
        assert!(fs.create_file("/a").is_err());
        assert_eq!(fs.read("/a", 0, 16).unwrap(), b"keep me");
    }

    #[test]
    fn test_create_without_parent_fails() {
        let fs = make_fs();
        let err = fs.create_file("/a/b").unwrap_err();
        assert!(matches!(err, FsError::NotFound { ref path } if path == "/a"));
    }

    #[test]
    fn test_create_under_file_fails() {
        let fs = make_fs();
        fs.create_file("/f").unwrap();
        assert!(matches!(
            fs.mkdir("/f/sub"),
            Err(FsError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_write_read_round_trip() {
        let fs = make_fs();
        fs.create_file("/a").unwrap();
        let written = fs.write("/a", 0, b"hello world").unwrap();
        assert_eq!(written, 11);
        assert_eq!(fs.read("/a", 0, 11).unwrap(), b"hello world");
        assert_eq!(fs.getattr("/a").unwrap().size, 11);
    }

    #[test]
    fn test_write_beyond_end_grows_file() {
        let fs = make_fs();
        fs.create_file("/a").unwrap();
        fs.write("/a", 0, b"ab").unwrap();
        fs.write("/a", 100, b"tail").unwrap();

        let attrs = fs.getattr("/a").unwrap();
        assert_eq!(attrs.size, 104);
        assert_eq!(fs.read("/a", 100, 4).unwrap(), b"tail");
        // Gap reads as zeros.
        assert_eq!(fs.read("/a", 2, 4).unwrap(), vec![0u8; 4]);
    }

    #[test]
    fn test_read_past_end_is_empty() {
        let fs = make_fs();
        fs.create_file("/a").unwrap();
        fs.write("/a", 0, b"abc").unwrap();
        assert!(fs.read("/a", 3, 10).unwrap().is_empty());
        assert!(fs.read("/a", 999, 10).unwrap().is_empty());
    }

    #[test]
    fn test_read_write_on_directory_fails() {
        let fs = make_fs();
        fs.mkdir("/d").unwrap();
        assert!(matches!(
            fs.read("/d", 0, 1),
            Err(FsError::IsADirectory { .. })
        ));
        assert!(matches!(
            fs.write("/d", 0, b"x"),
            Err(FsError::IsADirectory { .. })
        ));
    }

    #[test]
    fn test_write_with_interior_zero_keeps_length() {
        let fs = make_fs();
        fs.create_file("/a").unwrap();
        fs.write("/a", 0, b"a\0\0b").unwrap();
        assert_eq!(fs.getattr("/a").unwrap().size, 4);
        assert_eq!(fs.read("/a", 0, 4).unwrap(), b"a\0\0b");
    }

    #[test]
    fn test_dyad_write_mirrors_into_twin() {
        let fs = make_dyad_fs();
        fs.write("/room1/room2", 0, b"hi there").unwrap();

        assert_eq!(fs.read("/room1/room2", 0, 8).unwrap(), b"hi there");
        assert_eq!(fs.read("/room2/room1", 0, 8).unwrap(), b"hi there");
    }

    #[test]
    fn test_dyad_write_mirrors_at_offset() {
        let fs = make_dyad_fs();
        fs.write("/room1/room2", 5, b"later").unwrap();
        assert_eq!(fs.read("/room2/room1", 5, 5).unwrap(), b"later");
        assert_eq!(fs.getattr("/room2/room1").unwrap().size, 10);
    }

    #[test]
    fn test_dyad_write_without_twin_creates_nothing() {
        let fs = make_fs();
        fs.mkdir("/room1").unwrap();
        fs.create_file("/room1/room2").unwrap();

        let written = fs.write("/room1/room2", 0, b"solo").unwrap();
        assert_eq!(written, 4);
        assert!(matches!(
            fs.getattr("/room2/room1"),
            Err(FsError::NotFound { .. })
        ));
    }

    #[test]
    fn test_dyad_write_skips_directory_twin() {
        let fs = make_fs();
        fs.mkdir("/a").unwrap();
        fs.mkdir("/b").unwrap();
        fs.create_file("/a/b").unwrap();
        fs.mkdir("/b/a").unwrap();

        fs.write("/a/b", 0, b"data").unwrap();
        assert_eq!(fs.getattr("/b/a").unwrap().kind, EntryKind::Directory);
    }

    #[test]
    fn test_non_dyad_write_is_not_mirrored() {
        let fs = make_fs();
        fs.mkdir("/a").unwrap();
        fs.mkdir("/a/b").unwrap();
        fs.create_file("/a/b/c").unwrap();
        fs.create_file("/top").unwrap();

        fs.write("/a/b/c", 0, b"deep").unwrap();
        fs.write("/top", 0, b"flat").unwrap();
        // Nothing new appeared.
        assert_eq!(fs.entry_count(), 5);
    }

    #[test]
    fn test_unlink_removes_file() {
        let fs = make_fs();
        fs.create_file("/a").unwrap();
        fs.unlink("/a").unwrap();
        assert!(matches!(fs.getattr("/a"), Err(FsError::NotFound { .. })));
    }

    #[test]
    fn test_unlink_missing_fails() {
        let fs = make_fs();
        assert!(matches!(fs.unlink("/a"), Err(FsError::NotFound { .. })));
    }

    #[test]
    fn test_unlink_directory_fails() {
        let fs = make_fs();
        fs.mkdir("/d").unwrap();
        assert!(matches!(
            fs.unlink("/d"),
            Err(FsError::IsADirectory { .. })
        ));
    }

    #[test]
    fn test_rmdir_removes_empty_directory() {
        let fs = make_fs();
        fs.mkdir("/d").unwrap();
        fs.rmdir("/d").unwrap();
        assert!(matches!(fs.getattr("/d"), Err(FsError::NotFound { .. })));
    }

    #[test]
    fn test_rmdir_non_empty_fails_without_cascade() {
        let fs = make_fs();
        fs.mkdir("/d").unwrap();
        fs.create_file("/d/f").unwrap();

        assert!(matches!(fs.rmdir("/d"), Err(FsError::NotEmpty { .. })));
        // Descendant untouched.
        assert!(fs.getattr("/d/f").is_ok());
    }

    #[test]
    fn test_rmdir_file_fails() {
        let fs = make_fs();
        fs.create_file("/f").unwrap();
        assert!(matches!(
            fs.rmdir("/f"),
            Err(FsError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_rmdir_root_is_rejected() {
        let fs = make_fs();
        assert!(matches!(
            fs.rmdir("/"),
            Err(FsError::PermissionDenied { .. })
        ));
        assert!(fs.getattr("/").is_ok());
    }

    #[test]
    fn test_open_existing_file() {
        let fs = make_fs();
        fs.create_file("/a").unwrap();
        let attrs = fs.open("/a", OpenRequest::default()).unwrap();
        assert_eq!(attrs.kind, EntryKind::File);
    }

    #[test]
    fn test_open_directory_fails() {
        let fs = make_fs();
        fs.mkdir("/d").unwrap();
        let err = fs.open("/d", OpenRequest::default()).unwrap_err();
        assert!(matches!(err, FsError::IsADirectory { .. }));
    }

    #[test]
    fn test_open_missing_without_create_is_denied() {
        let fs = make_fs();
        let err = fs
            .open(
                "/a",
                OpenRequest {
                    create: false,
                    read_only: false,
                },
            )
            .unwrap_err();
        assert!(matches!(err, FsError::PermissionDenied { .. }));
    }

    #[test]
    fn test_open_missing_read_only_is_denied_even_with_create() {
        let fs = make_fs();
        let err = fs
            .open(
                "/a",
                OpenRequest {
                    create: true,
                    read_only: true,
                },
            )
            .unwrap_err();
        assert!(matches!(err, FsError::PermissionDenied { .. }));
    }

    #[test]
    fn test_open_with_create_makes_file() {
        let fs = make_fs();
        let attrs = fs
            .open(
                "/a",
                OpenRequest {
                    create: true,
                    read_only: false,
                },
            )
            .unwrap();
        assert_eq!(attrs.kind, EntryKind::File);
        assert_eq!(attrs.size, 0);
        assert!(fs.getattr("/a").is_ok());
    }

    #[test]
    fn test_list_hierarchy() {
        let fs = make_fs();
        fs.mkdir("/a").unwrap();
        fs.create_file("/a/b").unwrap();
        fs.mkdir("/a/c").unwrap();
        fs.create_file("/a/c/d").unwrap();

        let names = fs.list("/a").unwrap();
        assert_eq!(names, vec![".", "..", "b", "c"]);
    }

    #[test]
    fn test_destroy_releases_everything() {
        let fs = make_fs();
        fs.mkdir("/a").unwrap();
        fs.create_file("/a/b").unwrap();
        fs.destroy();

        assert_eq!(fs.entry_count(), 0);
        assert!(matches!(fs.getattr("/"), Err(FsError::NotFound { .. })));
        assert!(matches!(fs.getattr("/a/b"), Err(FsError::NotFound { .. })));
    }

    #[test]
    fn test_oplog_file_exists_and_grows() {
        let fs = MemFs::new(MemFsConfig { oplog: true });
        assert!(fs.getattr(OPLOG_PATH).is_ok());

        fs.mkdir("/a").unwrap();
        let size = fs.getattr(OPLOG_PATH).unwrap().size;
        assert!(size > 0);

        let contents = fs.read(OPLOG_PATH, 0, size as u32).unwrap();
        let text = String::from_utf8(contents).unwrap();
        assert!(text.contains("call [mkdir] for path: [/a]"));
    }

    #[test]
    fn test_oplog_absent_by_default() {
        let fs = make_fs();
        assert!(matches!(
            fs.getattr(OPLOG_PATH),
            Err(FsError::NotFound { .. })
        ));
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("/a"), "/");
        assert_eq!(parent_of("/a/b"), "/a");
        assert_eq!(parent_of("/a/b/c"), "/a/b");
        assert_eq!(parent_of("/"), "/");
    }
}
