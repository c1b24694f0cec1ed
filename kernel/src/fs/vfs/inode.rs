//! Inode: fs-assigned metadata record for a file, directory, or special
//! object. Grounded on the teacher's `fs::vfs::inode::Inode`
//! (`crates/kernel/src/fs/vfs/inode.rs`), trimmed of the `Stat`
//! conversion (kept in `fs::vfs::file` instead) and widened with the
//! xattr map spec.md §3 names.

extern crate alloc;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::any::Any;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use kernel_sync::spinlock::Spinlock;

use super::ops::InodeOps;
use super::superblock::Superblock;

pub type InodeRef = Arc<Inode>;
pub type WeakInodeRef = Weak<Inode>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeType {
    Regular,
    Directory,
    Symlink,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
}

pub struct Inode {
    pub ino: u64,
    pub dev: u64,
    pub inode_type: InodeType,
    pub mode: AtomicU32,
    pub nlink: AtomicU32,
    pub uid: AtomicU32,
    pub gid: AtomicU32,
    pub rdev: u64,
    pub size: AtomicU64,
    pub blksize: u64,
    pub atime: AtomicU64,
    pub mtime: AtomicU64,
    pub ctime: AtomicU64,
    /// Reference count: the number of dentries pointing at this inode
    /// (invariant (ii) of spec.md §3). Dropping to zero runs `ops.release`.
    refcount: AtomicU32,
    pub xattrs: Spinlock<BTreeMap<String, Vec<u8>>>,
    pub private: Box<dyn Any + Send + Sync>,
    pub ops: &'static dyn InodeOps,
    pub sb: Weak<dyn Superblock>,
}

// SAFETY: all mutable fields are atomics or internally-locked.
unsafe impl Send for Inode {}
unsafe impl Sync for Inode {}

impl Inode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ino: u64,
        dev: u64,
        inode_type: InodeType,
        mode: u32,
        ops: &'static dyn InodeOps,
        sb: Weak<dyn Superblock>,
        private: Box<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            ino,
            dev,
            inode_type,
            mode: AtomicU32::new(mode),
            nlink: AtomicU32::new(1),
            uid: AtomicU32::new(0),
            gid: AtomicU32::new(0),
            rdev: 0,
            size: AtomicU64::new(0),
            blksize: 4096,
            atime: AtomicU64::new(0),
            mtime: AtomicU64::new(0),
            ctime: AtomicU64::new(0),
            refcount: AtomicU32::new(1),
            xattrs: Spinlock::new(BTreeMap::new()),
            private,
            ops,
            sb,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.inode_type == InodeType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.inode_type == InodeType::Regular
    }

    pub fn is_symlink(&self) -> bool {
        self.inode_type == InodeType::Symlink
    }

    pub fn get(self: &Arc<Self>) {
        self.refcount.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop a reference. Returns `true` if this was the last one, in
    /// which case the caller must invoke `ops.release` — invariant
    /// (iii): dropping the last file reference runs the release hook.
    pub fn put(&self) -> bool {
        self.refcount.fetch_sub(1, Ordering::AcqRel) == 1
    }

    pub fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::Acquire)
    }

    pub fn touch_atime(&self, now: u64) {
        self.atime.store(now, Ordering::Relaxed);
    }

    pub fn touch_mtime(&self, now: u64) {
        self.mtime.store(now, Ordering::Relaxed);
        self.ctime.store(now, Ordering::Relaxed);
    }

    pub fn inc_nlink(&self) -> u32 {
        self.nlink.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the hard-link count, returning the new value.
    pub fn dec_nlink(&self) -> u32 {
        self.nlink.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn private_data<T: 'static>(&self) -> Option<&T> {
        self.private.downcast_ref::<T>()
    }

    pub fn lookup(&self, name: &str) -> super::error::VfsResult<Arc<Inode>> {
        self.ops.lookup(self, name)
    }
}

impl core::fmt::Debug for Inode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Inode")
            .field("ino", &self.ino)
            .field("type", &self.inode_type)
            .field("nlink", &self.nlink.load(Ordering::Relaxed))
            .field("refcount", &self.refcount())
            .finish()
    }
}
