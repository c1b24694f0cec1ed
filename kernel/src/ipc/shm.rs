//! System V shared memory segments: fixed-size byte regions processes
//! attach into their own address space. The attach/detach bookkeeping
//! lives here; wiring a segment's pages into a caller's `AddressSpace`
//! is `task::fork`/the `shmat` syscall handler's job.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

use kernel_sync::spinlock::Spinlock;

use crate::memory::PAGE_SIZE;
use kernel_error::{KernelError, KernelResult};

use super::{IdAllocator, IpcObject};

pub struct SharedMemorySegment {
    pub ipc: IpcObject,
    pub key: i32,
    pub size: usize,
    pub pages: Spinlock<Vec<u8>>,
    attach_count: core::sync::atomic::AtomicU32,
}

impl SharedMemorySegment {
    fn new(id: i32, key: i32, size: usize, uid: u32, gid: u32, perms: u32, now: u64) -> Self {
        let page_aligned = size.next_multiple_of(PAGE_SIZE);
        Self {
            ipc: IpcObject::new(id, uid, gid, perms, now),
            key,
            size: page_aligned,
            pages: Spinlock::new(alloc::vec![0u8; page_aligned]),
            attach_count: core::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn attach(&self) -> u32 {
        self.attach_count.fetch_add(1, core::sync::atomic::Ordering::AcqRel) + 1
    }

    /// Returns the new attach count; callers reclaim the segment (if
    /// also marked for removal) once this reaches zero.
    pub fn detach(&self) -> u32 {
        self.attach_count
            .fetch_sub(1, core::sync::atomic::Ordering::AcqRel)
            .saturating_sub(1)
    }

    pub fn attach_count(&self) -> u32 {
        self.attach_count.load(core::sync::atomic::Ordering::Acquire)
    }
}

pub struct ShmTable {
    ids: IdAllocator,
    by_key: Spinlock<BTreeMap<i32, Arc<SharedMemorySegment>>>,
    by_id: Spinlock<BTreeMap<i32, Arc<SharedMemorySegment>>>,
}

impl ShmTable {
    pub const fn new() -> Self {
        Self {
            ids: IdAllocator::new(),
            by_key: Spinlock::new(BTreeMap::new()),
            by_id: Spinlock::new(BTreeMap::new()),
        }
    }

    /// `shmget`: returns the existing segment for `key` if present,
    /// otherwise allocates one of `size` bytes.
    pub fn get_or_create(
        &self,
        key: i32,
        size: usize,
        uid: u32,
        gid: u32,
        perms: u32,
        create: bool,
        exclusive: bool,
        now: u64,
    ) -> KernelResult<i32> {
        if let Some(existing) = self.by_key.lock().get(&key) {
            if create && exclusive {
                return Err(KernelError::AlreadyExists);
            }
            if size > existing.size {
                return Err(KernelError::InvalidArgument);
            }
            return Ok(existing.ipc.id);
        }
        if !create {
            return Err(KernelError::NoSuchEntry);
        }
        let id = self.ids.alloc();
        let segment = Arc::new(SharedMemorySegment::new(id, key, size, uid, gid, perms, now));
        self.by_key.lock().insert(key, segment.clone());
        self.by_id.lock().insert(id, segment);
        Ok(id)
    }

    pub fn lookup(&self, id: i32) -> Option<Arc<SharedMemorySegment>> {
        self.by_id.lock().get(&id).cloned()
    }

    /// `shmctl(IPC_RMID)`: drop the segment from both indices. A
    /// segment with live attaches is freed once the last `detach`
    /// brings its count to zero — callers check `attach_count()`
    /// before reclaiming backing pages.
    pub fn remove(&self, id: i32) -> KernelResult<()> {
        let segment = self.by_id.lock().remove(&id).ok_or(KernelError::NoSuchEntry)?;
        self.by_key.lock().remove(&segment.key);
        Ok(())
    }
}

impl Default for ShmTable {
    fn default() -> Self {
        Self::new()
    }
}
