use thiserror::Error;

/// Errors surfaced by the operation surface and its components.
#[derive(Debug, Error)]
pub enum FsError {
    /// Path absent from the index.
    #[error("no entry at {path}")]
    NotFound { path: String },

    /// Create targeted an existing path.
    #[error("entry already exists at {path}")]
    AlreadyExists { path: String },

    /// Directory operation on a file.
    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    /// File operation on a directory.
    #[error("is a directory: {path}")]
    IsADirectory { path: String },

    /// Open without a create flag on a missing path, or a read-only
    /// access mode that cannot create.
    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    /// Remove targeted a directory that still has descendants.
    #[error("directory not empty: {path}")]
    NotEmpty { path: String },

    /// Buffer growth failed; the operation did not mutate anything.
    #[error("cannot grow buffer by {bytes} bytes")]
    ResourceExhausted { bytes: usize },
}

/// Convenience alias used across the core.
pub type Result<T> = std::result::Result<T, FsError>;

impl FsError {
    /// POSIX errno for this error, for the bridge to reply with.
    pub fn to_errno(&self) -> i32 {
        use libc::*;
        match self {
            FsError::NotFound { .. } => ENOENT,
            FsError::AlreadyExists { .. } => EEXIST,
            FsError::NotADirectory { .. } => ENOTDIR,
            FsError::IsADirectory { .. } => EISDIR,
            FsError::PermissionDenied { .. } => EPERM,
            FsError::NotEmpty { .. } => ENOTEMPTY,
            FsError::ResourceExhausted { .. } => ENOMEM,
        }
    }

    pub(crate) fn not_found(path: &str) -> Self {
        FsError::NotFound {
            path: path.to_string(),
        }
    }
}
