//! `fuser::Filesystem` implementation bridging the kernel to the core.
//!
//! The kernel addresses entries by inode; the core is keyed by path. Each
//! callback resolves the inode through the [`InodeMap`], issues one
//! operation-surface call, and maps core errors onto errnos. Attributes
//! are synthetic: fixed mode bits, epoch timestamps, the mounting user as
//! owner.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::os::raw::c_int;
use std::time::{Duration, SystemTime};

use fuser::{
    FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use tracing::debug;

use twinfs_core::fs::parent_of;
use twinfs_core::{Attrs, EntryKind, MemFs, MemFsConfig, OpenRequest};

use crate::inomap::{child_path, InodeMap, ROOT_INO};

/// Cache validity window handed to the kernel for attrs and entries.
const TTL: Duration = Duration::from_secs(1);

/// The mounted filesystem: core plus bridge bookkeeping.
pub struct TwinFs {
    fs: MemFs,
    inodes: InodeMap,
    open_handles: HashMap<u64, String>,
    next_fh: u64,
    uid: u32,
    gid: u32,
}

impl TwinFs {
    /// A bridge around a fresh in-memory filesystem.
    pub fn new(config: MemFsConfig) -> Self {
        TwinFs {
            fs: MemFs::new(config),
            inodes: InodeMap::new(),
            open_handles: HashMap::new(),
            next_fh: 1,
            uid: unsafe { libc::geteuid() },
            gid: unsafe { libc::getegid() },
        }
    }

    /// The wrapped operation surface.
    pub fn core(&self) -> &MemFs {
        &self.fs
    }

    fn file_attr(&self, ino: u64, attrs: &Attrs) -> fuser::FileAttr {
        let (kind, perm, nlink, size) = match attrs.kind {
            EntryKind::Directory => (FileType::Directory, 0o755, 2, 4096),
            EntryKind::File => (FileType::RegularFile, 0o644, 1, attrs.size),
        };
        let epoch = SystemTime::UNIX_EPOCH;
        fuser::FileAttr {
            ino,
            size,
            blocks: size.div_ceil(512),
            atime: epoch,
            mtime: epoch,
            ctime: epoch,
            crtime: epoch,
            kind,
            perm,
            nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: 4096,
            flags: 0,
        }
    }

    fn alloc_fh(&mut self, path: &str) -> u64 {
        let fh = self.next_fh;
        self.next_fh += 1;
        self.open_handles.insert(fh, path.to_string());
        fh
    }

    fn reply_entry(&mut self, path: &str, attrs: &Attrs, reply: ReplyEntry) {
        let ino = self.inodes.assign(path);
        self.inodes.add_lookup(ino);
        reply.entry(&TTL, &self.file_attr(ino, attrs), 0);
    }
}

impl Filesystem for TwinFs {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        debug!("init");
        Ok(())
    }

    fn destroy(&mut self) {
        debug!("destroy");
        self.fs.destroy();
        self.inodes.clear();
        self.open_handles.clear();
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let name_str = name.to_string_lossy();
        debug!("lookup parent={} name={}", parent, name_str);

        let Some(parent_path) = self.inodes.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = child_path(parent_path, &name_str);
        match self.fs.getattr(&path) {
            Ok(attrs) => self.reply_entry(&path, &attrs, reply),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        debug!("forget ino={} nlookup={}", ino, nlookup);
        self.inodes.forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        debug!("getattr ino={}", ino);
        let Some(path) = self.inodes.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.getattr(path) {
            Ok(attrs) => reply.attr(&TTL, &self.file_attr(ino, &attrs)),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    // Accepted and ignored: timestamps are placeholders and buffers never
    // shrink, so there is nothing to apply. Replies with current attrs.
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        debug!("setattr ino={}", ino);
        let Some(path) = self.inodes.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.getattr(path) {
            Ok(attrs) => reply.attr(&TTL, &self.file_attr(ino, &attrs)),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        let name_str = name.to_string_lossy();
        debug!("mknod parent={} name={} mode={:o}", parent, name_str, mode);

        if mode & libc::S_IFMT != libc::S_IFREG {
            reply.error(libc::ENOSYS);
            return;
        }
        let Some(parent_path) = self.inodes.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = child_path(parent_path, &name_str);
        match self.fs.create_file(&path) {
            Ok(()) => {
                let attrs = Attrs {
                    kind: EntryKind::File,
                    size: 0,
                };
                self.reply_entry(&path, &attrs, reply);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let name_str = name.to_string_lossy();
        debug!("mkdir parent={} name={} mode={:o}", parent, name_str, mode);

        let Some(parent_path) = self.inodes.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = child_path(parent_path, &name_str);
        match self.fs.mkdir(&path) {
            Ok(()) => {
                let attrs = Attrs {
                    kind: EntryKind::Directory,
                    size: 0,
                };
                self.reply_entry(&path, &attrs, reply);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let name_str = name.to_string_lossy();
        debug!("unlink parent={} name={}", parent, name_str);

        let Some(parent_path) = self.inodes.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = child_path(parent_path, &name_str);
        match self.fs.unlink(&path) {
            Ok(()) => {
                self.inodes.drop_path(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let name_str = name.to_string_lossy();
        debug!("rmdir parent={} name={}", parent, name_str);

        let Some(parent_path) = self.inodes.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = child_path(parent_path, &name_str);
        match self.fs.rmdir(&path) {
            Ok(()) => {
                self.inodes.drop_path(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        debug!("open ino={} flags={}", ino, flags);

        let Some(path) = self.inodes.path_of(ino).map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };
        let request = OpenRequest {
            create: flags & libc::O_CREAT != 0,
            read_only: flags & libc::O_ACCMODE == libc::O_RDONLY,
        };
        match self.fs.open(&path, request) {
            Ok(_) => {
                let fh = self.alloc_fh(&path);
                reply.opened(fh, 0);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let name_str = name.to_string_lossy();
        debug!(
            "create parent={} name={} mode={:o} flags={}",
            parent, name_str, mode, flags
        );

        let Some(parent_path) = self.inodes.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = child_path(parent_path, &name_str);
        let request = OpenRequest {
            create: true,
            read_only: flags & libc::O_ACCMODE == libc::O_RDONLY,
        };
        match self.fs.open(&path, request) {
            Ok(attrs) => {
                let ino = self.inodes.assign(&path);
                self.inodes.add_lookup(ino);
                let fh = self.alloc_fh(&path);
                let attr = self.file_attr(ino, &attrs);
                reply.created(&TTL, &attr, 0, fh, flags as u32);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        debug!("read ino={} offset={} size={}", ino, offset, size);

        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        let Some(path) = self.inodes.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.read(path, offset as u64, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        debug!("write ino={} offset={} size={}", ino, offset, data.len());

        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        let Some(path) = self.inodes.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.write(path, offset as u64, data) {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn flush(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _lock_owner: u64,
        reply: ReplyEmpty,
    ) {
        debug!("flush");
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        debug!("release fh={}", fh);
        self.open_handles.remove(&fh);
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!("opendir ino={}", ino);

        let Some(path) = self.inodes.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.getattr(path) {
            Ok(attrs) if attrs.kind == EntryKind::Directory => reply.opened(0, 0),
            Ok(_) => reply.error(libc::ENOTDIR),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!("readdir ino={} offset={}", ino, offset);

        let Some(path) = self.inodes.path_of(ino).map(str::to_string) else {
            reply.error(libc::ENOENT);
            return;
        };
        let names = match self.fs.list(&path) {
            Ok(names) => names,
            Err(e) => {
                reply.error(e.to_errno());
                return;
            }
        };

        for (i, name) in names.iter().enumerate() {
            if (i as i64) < offset {
                continue;
            }
            let (entry_ino, kind) = match name.as_str() {
                "." => (ino, FileType::Directory),
                ".." => {
                    let parent_ino = self.inodes.ino_of(parent_of(&path)).unwrap_or(ROOT_INO);
                    (parent_ino, FileType::Directory)
                }
                child => {
                    let child = child_path(&path, child);
                    // Entries removed mid-scan are skipped.
                    let Ok(attrs) = self.fs.getattr(&child) else {
                        continue;
                    };
                    let kind = match attrs.kind {
                        EntryKind::Directory => FileType::Directory,
                        EntryKind::File => FileType::RegularFile,
                    };
                    (self.inodes.assign(&child), kind)
                }
            };
            if reply.add(entry_ino, (i + 1) as i64, kind, name) {
                break;
            }
        }

        reply.ok();
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        debug!("releasedir");
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        debug!("statfs");
        reply.statfs(1024 * 1024, 1024 * 1024, 1024 * 1024, 0, 0, 4096, 255, 4096);
    }
}
