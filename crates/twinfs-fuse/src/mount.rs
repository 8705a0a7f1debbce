//! Mount lifecycle: option parsing, mountpoint validation, and the
//! blocking mount call that serves the filesystem until unmount.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::filesystem::TwinFs;

/// Mount options twinfs understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOptions {
    /// Allow other users to access the mount.
    pub allow_other: bool,
    /// Allow root to access the mount.
    pub allow_root: bool,
    /// Let the kernel enforce permissions from mode bits.
    pub default_permissions: bool,
    /// Unmount automatically when the process exits.
    pub auto_unmount: bool,
    /// Read-only mount.
    pub ro: bool,
}

impl Default for MountOptions {
    fn default() -> Self {
        MountOptions {
            allow_other: false,
            allow_root: false,
            default_permissions: false,
            auto_unmount: true,
            ro: false,
        }
    }
}

/// Errors from mount setup and teardown.
#[derive(Debug, Error)]
pub enum MountError {
    /// Mountpoint does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// Mountpoint is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// Unrecognized mount option.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// The FUSE session could not be established or ended abnormally.
    #[error("Mount failed at {mountpoint}: {reason}")]
    MountFailed { mountpoint: String, reason: String },
}

/// Validate a mountpoint path.
pub fn validate_mountpoint(path: &Path) -> Result<(), MountError> {
    if !path.exists() {
        return Err(MountError::PathNotFound(path.display().to_string()));
    }
    if !path.is_dir() {
        return Err(MountError::NotADirectory(path.display().to_string()));
    }
    Ok(())
}

/// Parse mount options from a comma-separated string.
///
/// Valid options: allow_other, allow_root, default_permissions,
/// auto_unmount, ro, rw.
pub fn parse_mount_options(opts_str: &str) -> Result<MountOptions, MountError> {
    let mut options = MountOptions::default();

    for opt in opts_str.split(',') {
        match opt.trim() {
            "allow_other" => options.allow_other = true,
            "allow_root" => options.allow_root = true,
            "default_permissions" => options.default_permissions = true,
            "auto_unmount" => options.auto_unmount = true,
            "ro" => options.ro = true,
            "rw" => options.ro = false,
            "" => {}
            other => return Err(MountError::InvalidOption(other.to_string())),
        }
    }

    Ok(options)
}

/// Convert [`MountOptions`] to the fuser option list.
pub fn options_to_fuser(opts: &MountOptions) -> Vec<fuser::MountOption> {
    let mut fuser_opts = vec![fuser::MountOption::FSName("twinfs".to_string())];

    if opts.allow_other {
        fuser_opts.push(fuser::MountOption::AllowOther);
    }
    if opts.allow_root {
        fuser_opts.push(fuser::MountOption::AllowRoot);
    }
    if opts.default_permissions {
        fuser_opts.push(fuser::MountOption::DefaultPermissions);
    }
    if opts.auto_unmount {
        fuser_opts.push(fuser::MountOption::AutoUnmount);
    }
    if opts.ro {
        fuser_opts.push(fuser::MountOption::RO);
    }

    fuser_opts
}

/// Mount `fs` at `mountpoint` and serve kernel requests until the
/// filesystem is unmounted.
pub fn mount(fs: TwinFs, mountpoint: &Path, opts: &MountOptions) -> Result<(), MountError> {
    validate_mountpoint(mountpoint)?;
    let fuser_opts = options_to_fuser(opts);
    info!(mountpoint = %mountpoint.display(), "mounting twinfs");
    fuser::mount2(fs, mountpoint, &fuser_opts).map_err(|e| MountError::MountFailed {
        mountpoint: mountpoint.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn test_default_options() {
        let opts = MountOptions::default();
        assert!(!opts.allow_other);
        assert!(!opts.allow_root);
        assert!(!opts.default_permissions);
        assert!(opts.auto_unmount);
        assert!(!opts.ro);
    }

    #[test]
    fn test_parse_empty_returns_default() {
        let opts = parse_mount_options("").unwrap();
        assert_eq!(opts, MountOptions::default());
    }

    #[test]
    fn test_parse_multiple_options() {
        let opts = parse_mount_options("allow_other,default_permissions,ro").unwrap();
        assert!(opts.allow_other);
        assert!(opts.default_permissions);
        assert!(opts.ro);
        assert!(!opts.allow_root);
    }

    #[test]
    fn test_parse_rw_clears_ro() {
        let opts = parse_mount_options("ro,rw").unwrap();
        assert!(!opts.ro);
    }

    #[test]
    fn test_parse_unknown_option_fails() {
        let result = parse_mount_options("bogus");
        assert!(matches!(result, Err(MountError::InvalidOption(_))));
    }

    #[test]
    fn test_parse_tolerates_spaces() {
        let opts = parse_mount_options("allow_other, ro ").unwrap();
        assert!(opts.allow_other);
        assert!(opts.ro);
    }

    #[test]
    fn test_options_to_fuser_always_sets_fsname() {
        let fuser_opts = options_to_fuser(&MountOptions::default());
        assert!(fuser_opts
            .iter()
            .any(|o| matches!(o, fuser::MountOption::FSName(name) if name == "twinfs")));
    }

    #[test]
    fn test_options_to_fuser_includes_selected() {
        let opts = MountOptions {
            allow_other: true,
            allow_root: true,
            default_permissions: true,
            auto_unmount: true,
            ro: true,
        };
        let fuser_opts = options_to_fuser(&opts);
        assert!(fuser_opts
            .iter()
            .any(|o| matches!(o, fuser::MountOption::AllowOther)));
        assert!(fuser_opts
            .iter()
            .any(|o| matches!(o, fuser::MountOption::AllowRoot)));
        assert!(fuser_opts
            .iter()
            .any(|o| matches!(o, fuser::MountOption::DefaultPermissions)));
        assert!(fuser_opts
            .iter()
            .any(|o| matches!(o, fuser::MountOption::AutoUnmount)));
        assert!(fuser_opts.iter().any(|o| matches!(o, fuser::MountOption::RO)));
    }

    #[test]
    fn test_validate_mountpoint_missing_path() {
        let result = validate_mountpoint(Path::new("/nonexistent_twinfs_mount"));
        assert!(matches!(result, Err(MountError::PathNotFound(_))));
    }

    #[test]
    fn test_validate_mountpoint_file_not_dir() {
        let temp_file: PathBuf = std::env::temp_dir().join("twinfs_mount_test_file");
        fs::write(&temp_file, "x").unwrap();

        let result = validate_mountpoint(&temp_file);

        fs::remove_file(&temp_file).ok();
        assert!(matches!(result, Err(MountError::NotADirectory(_))));
    }

    #[test]
    fn test_validate_mountpoint_directory_ok() {
        assert!(validate_mountpoint(&std::env::temp_dir()).is_ok());
    }
}
