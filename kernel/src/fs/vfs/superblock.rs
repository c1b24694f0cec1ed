//! In-memory record describing a mounted filesystem instance.

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;

use kernel_sync::spinlock::Spinlock;

use super::inode::Inode;
use super::ops::SuperblockOps;

/// Every concrete filesystem (tmpfs, procfs, ext4, ...) implements this
/// to plug into the mount table and dentry cache.
pub trait Superblock: Send + Sync {
    fn root_inode(&self) -> Arc<Inode>;
    fn fs_type_name(&self) -> &'static str;
    fn device_id(&self) -> u64 {
        0
    }
    fn block_size(&self) -> u32 {
        4096
    }
    fn ops(&self) -> Option<&dyn SuperblockOps> {
        None
    }
}

/// Generic bookkeeping shared by all superblock implementations: the
/// list of live inodes (so a `sync`/teardown can walk them without a
/// separate registry).
pub struct SuperblockState {
    pub inodes: Spinlock<Vec<Arc<Inode>>>,
}

impl SuperblockState {
    pub const fn new() -> Self {
        Self {
            inodes: Spinlock::new(Vec::new()),
        }
    }

    pub fn register(&self, inode: Arc<Inode>) {
        self.inodes.lock().push(inode);
    }
}

impl Default for SuperblockState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FilesystemFlags {
    pub read_only: bool,
    pub no_device: bool,
}

/// Registration record a filesystem driver provides at init (spec.md
/// §6 "A filesystem driver registers a FilesystemType").
pub struct FilesystemType {
    pub name: &'static str,
    pub flags: FilesystemFlags,
    pub mount: fn(device: Option<&dyn crate::fs::ext4::BlockDevice>) -> super::error::VfsResult<Arc<dyn Superblock>>,
    pub kill_sb: fn(sb: &Arc<dyn Superblock>),
}
