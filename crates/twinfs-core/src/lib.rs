#![warn(missing_docs)]

//! twinfs core: an in-memory filesystem keyed by full path.
//!
//! The ordered path index is the single source of truth; hierarchy is
//! derived from sorted path order rather than parent/child pointers.
//! Files one level inside a top-level directory (`/X/Y`) are mirrored
//! channels: writes to them are duplicated into the twin file `/Y/X`
//! when it exists.

pub mod buffer;
pub mod entry;
pub mod error;
pub mod fs;
pub mod index;
pub mod mirror;
pub mod readdir;

pub use buffer::FileBuffer;
pub use entry::{Entry, EntryKind};
pub use error::{FsError, Result};
pub use fs::{Attrs, MemFs, MemFsConfig, OpenRequest};
pub use index::PathIndex;
