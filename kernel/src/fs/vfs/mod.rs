//! The virtual filesystem: dentry/inode/file/superblock quartet, mount
//! table, path lookup and the open/read/write/stat entry points
//! syscalls dispatch into (C10).

pub mod dentry;
pub mod error;
pub mod file;
pub mod inode;
pub mod mount;
pub mod ops;
pub mod path;
pub mod superblock;

extern crate alloc;

use alloc::sync::Arc;

use dentry::DentryRef;
use error::{VfsError, VfsResult};
use file::{File, FileRef, OpenFlags};
use mount::MountTable;

use crate::fs::mode::FileMode;

/// The process-wide VFS state: one mount table, reachable through the
/// root dentry. Per-process `cwd` lives on the process, not here.
pub struct Vfs {
    root: DentryRef,
    pub mounts: MountTable,
}

impl Vfs {
    pub fn new(root: DentryRef) -> Self {
        Self {
            root,
            mounts: MountTable::new(),
        }
    }

    pub fn root(&self) -> DentryRef {
        self.root.clone()
    }

    pub fn mount(&self, target: DentryRef, sb: Arc<dyn superblock::Superblock>) -> VfsResult<()> {
        self.mounts.mount(target, sb)
    }

    /// `open(path, flags, mode)`, performing path lookup, the
    /// `O_CREAT`/`O_EXCL` dance, and the read/write permission check
    /// against the caller's effective uid/gid before returning a file
    /// object.
    pub fn open(
        &self,
        cwd: &DentryRef,
        path_str: &str,
        flags: OpenFlags,
        create_mode: u32,
        euid: u32,
        egid: u32,
    ) -> VfsResult<FileRef> {
        let lookup_flags = path::LookupFlags {
            follow_symlinks: !flags.contains(OpenFlags::DIRECTORY),
        };
        let found = path::lookup(&self.root, cwd, path_str, &lookup_flags);

        let dentry = match found {
            Ok(d) if d.is_negative() && flags.contains(OpenFlags::CREATE) => {
                self.create(cwd, path_str, create_mode)?
            }
            Ok(d) if flags.contains(OpenFlags::CREATE) && flags.contains(OpenFlags::EXCLUSIVE) => {
                return Err(VfsError::AlreadyExists);
            }
            Ok(d) => d,
            Err(VfsError::NoSuchEntry) if flags.contains(OpenFlags::CREATE) => {
                self.create(cwd, path_str, create_mode)?
            }
            Err(e) => return Err(e),
        };

        let inode = dentry.get_inode().ok_or(VfsError::NoSuchEntry)?;
        let file_mode = FileMode {
            mode: inode.mode.load(core::sync::atomic::Ordering::Relaxed),
            owner_uid: inode.uid.load(core::sync::atomic::Ordering::Relaxed),
            owner_gid: inode.gid.load(core::sync::atomic::Ordering::Relaxed),
        };
        if flags.contains(OpenFlags::READ) && !file_mode.can_read(euid, egid) {
            return Err(VfsError::PermissionDenied);
        }
        if flags.contains(OpenFlags::WRITE) && !file_mode.can_write(euid, egid) {
            return Err(VfsError::PermissionDenied);
        }
        if flags.contains(OpenFlags::DIRECTORY) && !inode.is_dir() {
            return Err(VfsError::NotADirectory);
        }
        if flags.contains(OpenFlags::TRUNCATE) && flags.contains(OpenFlags::WRITE) && inode.is_file() {
            inode.ops.truncate(&inode, 0)?;
        }

        Ok(File::new(dentry, flags))
    }

    fn create(&self, cwd: &DentryRef, path_str: &str, mode: u32) -> VfsResult<DentryRef> {
        let (parent, name) = path::lookup_parent(&self.root, cwd, path_str)?;
        let parent_inode = parent.get_inode().ok_or(VfsError::NoSuchEntry)?;
        if !parent_inode.is_dir() {
            return Err(VfsError::NotADirectory);
        }
        let new_inode = parent_inode.ops.create(&parent_inode, name, mode)?;
        let child = Arc::new(dentry::Dentry::new(
            alloc::string::String::from(name),
            Some(Arc::downgrade(&parent)),
            Some(new_inode),
        ));
        parent.add_child(child.clone());
        Ok(child)
    }

    pub fn stat(&self, cwd: &DentryRef, path_str: &str) -> VfsResult<Arc<inode::Inode>> {
        let dentry = path::lookup(&self.root, cwd, path_str, &path::LookupFlags::default())?;
        dentry.get_inode().ok_or(VfsError::NoSuchEntry)
    }
}

