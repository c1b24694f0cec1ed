//! Mount table: a tree rooted at the root mount. `mount()` installs a
//! [`Mount`] entry and marks the target dentry as a mount point; path
//! lookup crosses it transparently via `Dentry::get_inode`.

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;

use kernel_sync::spinlock::Spinlock;

use super::dentry::DentryRef;
use super::error::{VfsError, VfsResult};
use super::superblock::Superblock;

pub struct Mount {
    pub mountpoint: DentryRef,
    pub superblock: Arc<dyn Superblock>,
}

pub struct MountTable {
    mounts: Spinlock<Vec<Mount>>,
}

impl MountTable {
    pub const fn new() -> Self {
        Self {
            mounts: Spinlock::new(Vec::new()),
        }
    }

    pub fn mount(&self, target: DentryRef, sb: Arc<dyn Superblock>) -> VfsResult<()> {
        if target.is_mountpoint() {
            return Err(VfsError::AlreadyExists);
        }
        target.mount(sb.clone());
        self.mounts.lock().push(Mount {
            mountpoint: target,
            superblock: sb,
        });
        Ok(())
    }

    pub fn unmount(&self, target: &DentryRef) -> VfsResult<()> {
        let mut mounts = self.mounts.lock();
        let idx = mounts
            .iter()
            .position(|m| Arc::ptr_eq(&m.mountpoint, target))
            .ok_or(VfsError::NoSuchEntry)?;
        mounts.remove(idx);
        target.unmount();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.mounts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}
