//! Stored filesystem objects: file and directory records keyed by path.

use crate::buffer::FileBuffer;

/// Entry variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Directory record; carries no content.
    Directory,
    /// Regular file record with a content buffer.
    File,
}

/// A single filesystem object.
///
/// The path is the unique key: absolute, `/`-separated, no trailing slash
/// except the root itself. Content is present only for files.
#[derive(Debug, Clone)]
pub struct Entry {
    path: String,
    kind: EntryKind,
    content: Option<FileBuffer>,
}

impl Entry {
    /// A new directory entry.
    pub fn new_dir(path: &str) -> Self {
        Entry {
            path: path.to_string(),
            kind: EntryKind::Directory,
            content: None,
        }
    }

    /// A new file entry with an empty buffer.
    pub fn new_file(path: &str) -> Self {
        Entry {
            path: path.to_string(),
            kind: EntryKind::File,
            content: Some(FileBuffer::new()),
        }
    }

    /// Full path of this entry.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Entry variant.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Whether this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Content buffer, present only for files.
    pub fn content(&self) -> Option<&FileBuffer> {
        self.content.as_ref()
    }

    /// Mutable content buffer, present only for files.
    pub fn content_mut(&mut self) -> Option<&mut FileBuffer> {
        self.content.as_mut()
    }

    /// Apparent size in bytes; directories report zero.
    pub fn size(&self) -> u64 {
        self.content.as_ref().map_or(0, |buf| buf.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_dir_has_no_content() {
        let entry = Entry::new_dir("/a");
        assert!(entry.is_dir());
        assert_eq!(entry.kind(), EntryKind::Directory);
        assert!(entry.content().is_none());
        assert_eq!(entry.size(), 0);
    }

    #[test]
    fn test_new_file_has_empty_content() {
        let entry = Entry::new_file("/a/b");
        assert!(!entry.is_dir());
        assert_eq!(entry.kind(), EntryKind::File);
        assert!(entry.content().unwrap().is_empty());
        assert_eq!(entry.size(), 0);
    }

    #[test]
    fn test_size_tracks_content() {
        let mut entry = Entry::new_file("/f");
        entry.content_mut().unwrap().write(0, b"hello").unwrap();
        assert_eq!(entry.size(), 5);
    }

    #[test]
    fn test_path_accessor() {
        let entry = Entry::new_file("/room1/room2");
        assert_eq!(entry.path(), "/room1/room2");
    }
}
