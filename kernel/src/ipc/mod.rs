//! System V-style IPC (§4.7): shared memory, message queues, and
//! semaphore sets, each built over a common permission base. The
//! teacher has no IPC module; this is grounded on the VFS's own
//! permission-check shape (`fs::mode::FileMode`) applied to IPC's
//! owner/group/other 9-bit mask instead of a filesystem mode, per
//! SPEC_FULL.md §4.7.

pub mod msgq;
pub mod semaphore;
pub mod shm;

extern crate alloc;

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::fs::mode::FileMode;

/// Shared base every IPC object embeds (spec.md §3 `IpcObject`).
pub struct IpcObject {
    pub id: i32,
    pub owner_uid: AtomicU32,
    pub owner_gid: AtomicU32,
    pub creator_uid: u32,
    /// Owner/group/other r/w/x mask, same bit layout as a file mode's
    /// low 9 bits.
    pub permissions: AtomicU32,
    pub ctime: AtomicU64,
    pub atime: AtomicU64,
    refcount: AtomicU32,
}

impl IpcObject {
    pub fn new(id: i32, uid: u32, gid: u32, permissions: u32, now: u64) -> Self {
        Self {
            id,
            owner_uid: AtomicU32::new(uid),
            owner_gid: AtomicU32::new(gid),
            creator_uid: uid,
            permissions: AtomicU32::new(permissions & 0o777),
            ctime: AtomicU64::new(now),
            atime: AtomicU64::new(now),
            refcount: AtomicU32::new(1),
        }
    }

    fn mode(&self) -> FileMode {
        FileMode {
            mode: self.permissions.load(Ordering::Relaxed),
            owner_uid: self.owner_uid.load(Ordering::Relaxed),
            owner_gid: self.owner_gid.load(Ordering::Relaxed),
        }
    }

    pub fn can_read(&self, uid: u32, gid: u32) -> bool {
        self.mode().can_read(uid, gid)
    }

    pub fn can_write(&self, uid: u32, gid: u32) -> bool {
        self.mode().can_write(uid, gid)
    }

    pub fn touch(&self, now: u64) {
        self.atime.store(now, Ordering::Relaxed);
    }

    pub fn get(&self) {
        self.refcount.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns `true` when this was the last reference.
    pub fn put(&self) -> bool {
        self.refcount.fetch_sub(1, Ordering::AcqRel) == 1
    }

    pub fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::Acquire)
    }
}

/// Monotonic id allocator shared by `shmget`/`msgget`/`semget`: ids are
/// small non-negative integers, distinct per IPC kind (Linux itself
/// only guarantees uniqueness within one kind too).
pub struct IdAllocator {
    next: AtomicU32,
}

impl IdAllocator {
    pub const fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    pub fn alloc(&self) -> i32 {
        self.next.fetch_add(1, Ordering::Relaxed) as i32
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
