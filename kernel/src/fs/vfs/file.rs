//! Open file object: refcount, open flags, atomic seek position, and a
//! pointer to the dentry/ops it was opened through.

extern crate alloc;

use alloc::boxed::Box;
use alloc::sync::Arc;
use bitflags::bitflags;
use core::any::Any;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use super::dentry::DentryRef;
use super::error::VfsResult;
use super::ops::FileOps;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const CREATE = 1 << 2;
        const EXCLUSIVE = 1 << 3;
        const TRUNCATE = 1 << 4;
        const APPEND = 1 << 5;
        const NONBLOCK = 1 << 6;
        const DIRECTORY = 1 << 7;
        const CLOEXEC = 1 << 8;
    }
}

pub struct File {
    /// `None` for dentry-less files (pipes, sockets): `ops` must be
    /// `Some` in that case, since there is no inode to fall back to.
    pub dentry: Option<DentryRef>,
    pub flags: OpenFlags,
    pub position: AtomicU64,
    refcount: AtomicU32,
    /// File-specific operations (pipes, device nodes, procfs entries);
    /// `None` falls back to the inode's own `InodeOps::read`/`write`.
    pub ops: Option<&'static dyn FileOps>,
    /// Per-open-instance state a stateless `FileOps` impl reads back
    /// out via [`File::private_data`] (e.g. which `Pipe` and end).
    pub private: Box<dyn Any + Send + Sync>,
}

pub type FileRef = Arc<File>;

impl File {
    pub fn new(dentry: DentryRef, flags: OpenFlags) -> FileRef {
        Arc::new(Self {
            dentry: Some(dentry),
            flags,
            position: AtomicU64::new(0),
            refcount: AtomicU32::new(1),
            ops: None,
            private: Box::new(()),
        })
    }

    pub fn with_ops(dentry: DentryRef, flags: OpenFlags, ops: &'static dyn FileOps) -> FileRef {
        Arc::new(Self {
            dentry: Some(dentry),
            flags,
            position: AtomicU64::new(0),
            refcount: AtomicU32::new(1),
            ops: Some(ops),
            private: Box::new(()),
        })
    }

    /// A dentry-less open file (pipes, IPC-backed descriptors): `ops`
    /// is mandatory since there is no inode to delegate to.
    pub fn anonymous(
        flags: OpenFlags,
        ops: &'static dyn FileOps,
        private: Box<dyn Any + Send + Sync>,
    ) -> FileRef {
        Arc::new(Self {
            dentry: None,
            flags,
            position: AtomicU64::new(0),
            refcount: AtomicU32::new(1),
            ops: Some(ops),
            private,
        })
    }

    pub fn private_data<T: 'static>(&self) -> Option<&T> {
        self.private.downcast_ref::<T>()
    }

    pub fn get(self: &Arc<Self>) -> Arc<Self> {
        self.refcount.fetch_add(1, Ordering::Relaxed);
        self.clone()
    }

    /// Drop a reference to this file handle; returns `true` when this
    /// was the last one and `ops.release` should run (the VFS boundary
    /// does not call it automatically: callers decide when to commit
    /// to closing, matching close()'s two-step fd-table/file-object
    /// lifetime).
    pub fn put(&self) -> bool {
        self.refcount.fetch_sub(1, Ordering::AcqRel) == 1
    }

    pub fn read(&self, buf: &mut [u8]) -> VfsResult<usize> {
        if !self.flags.contains(OpenFlags::READ) {
            return Err(super::error::VfsError::BadFileDescriptor);
        }
        if let Some(ops) = self.ops {
            return ops.read(self, buf);
        }
        let inode = self
            .dentry
            .as_ref()
            .and_then(|d| d.get_inode())
            .ok_or(super::error::VfsError::NoSuchEntry)?;
        let offset = self.position.load(Ordering::Relaxed);
        let n = inode.ops.read(&inode, offset, buf)?;
        self.position.fetch_add(n as u64, Ordering::Relaxed);
        inode.touch_atime(0);
        Ok(n)
    }

    pub fn write(&self, buf: &[u8]) -> VfsResult<usize> {
        if !self.flags.contains(OpenFlags::WRITE) {
            return Err(super::error::VfsError::BadFileDescriptor);
        }
        if let Some(ops) = self.ops {
            return ops.write(self, buf);
        }
        let inode = self
            .dentry
            .as_ref()
            .and_then(|d| d.get_inode())
            .ok_or(super::error::VfsError::NoSuchEntry)?;
        let offset = if self.flags.contains(OpenFlags::APPEND) {
            inode.size.load(Ordering::Relaxed)
        } else {
            self.position.load(Ordering::Relaxed)
        };
        let n = inode.ops.write(&inode, offset, buf)?;
        self.position.store(offset + n as u64, Ordering::Relaxed);
        inode.touch_mtime(0);
        Ok(n)
    }

    pub fn seek(&self, offset: i64, whence: super::ops::SeekWhence) -> VfsResult<u64> {
        if let Some(ops) = self.ops {
            return ops.seek(self, offset, whence);
        }
        default_seek(self, offset, whence)
    }
}

fn default_seek(file: &File, offset: i64, whence: super::ops::SeekWhence) -> VfsResult<u64> {
    use super::ops::SeekWhence;
    let current = file.position.load(Ordering::Relaxed);
    let size = file
        .dentry
        .as_ref()
        .and_then(|d| d.get_inode())
        .map(|i| i.size.load(Ordering::Relaxed))
        .unwrap_or(0);
    let base = match whence {
        SeekWhence::Set => 0i64,
        SeekWhence::Cur => current as i64,
        SeekWhence::End => size as i64,
    };
    let new_offset = base
        .checked_add(offset)
        .filter(|v| *v >= 0)
        .ok_or(super::error::VfsError::InvalidArgument)?;
    file.position.store(new_offset as u64, Ordering::Relaxed);
    Ok(new_offset as u64)
}
