#![warn(missing_docs)]

//! twinfs FUSE bridge.
//!
//! Translates inode-addressed kernel callbacks into path-addressed calls
//! on the in-memory core, and manages the mount lifecycle.

pub mod filesystem;
pub mod inomap;
pub mod mount;

pub use filesystem::TwinFs;
pub use mount::{MountError, MountOptions};
