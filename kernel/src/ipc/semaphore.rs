//! System V semaphore sets: each set is a small array of counters,
//! `semop` applies a batch of deltas atomically (all-or-block), and
//! zero-crossing wakes waiters parked on `wait_for_zero`. Distinct from
//! `kernel_sync::Semaphore`, which is a single in-kernel counting
//! semaphore with no set/undo semantics.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

use kernel_error::{KernelError, KernelResult};
use kernel_sync::spinlock::Spinlock;
use kernel_sync::wait_queue::WaitQueue;

use crate::fs::pipe::Blocker;

use super::{IdAllocator, IpcObject};

pub const SEMVMX: i32 = i16::MAX as i32;

/// One entry in a `semop` batch: `sem_num` indexes the set, `op` is
/// the signed delta (negative blocks until satisfiable).
#[derive(Clone, Copy)]
pub struct SemOp {
    pub sem_num: usize,
    pub op: i32,
}

pub struct SemaphoreSet {
    pub ipc: IpcObject,
    values: Spinlock<Vec<i32>>,
    changed: WaitQueue,
}

impl SemaphoreSet {
    fn new(id: i32, count: usize, uid: u32, gid: u32, perms: u32, now: u64) -> Self {
        Self {
            ipc: IpcObject::new(id, uid, gid, perms, now),
            values: Spinlock::new(alloc::vec![0i32; count]),
            changed: WaitQueue::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn get(&self, index: usize) -> KernelResult<i32> {
        self.values.lock().get(index).copied().ok_or(KernelError::InvalidArgument)
    }

    pub fn set(&self, index: usize, value: i32, blocker: &dyn Blocker) -> KernelResult<()> {
        let mut values = self.values.lock();
        let slot = values.get_mut(index).ok_or(KernelError::InvalidArgument)?;
        *slot = value;
        drop(values);
        blocker.wake_all(&self.changed);
        Ok(())
    }

    /// Applies every op in `ops` atomically: if any op would drive a
    /// counter negative, none are applied and the caller blocks on
    /// `changed` before retrying the whole batch.
    pub fn semop(&self, ops: &[SemOp], blocker: &dyn Blocker) -> KernelResult<()> {
        loop {
            {
                let mut values = self.values.lock();
                let mut satisfiable = true;
                for op in ops {
                    let current = *values.get(op.sem_num).ok_or(KernelError::InvalidArgument)?;
                    if current + op.op < 0 {
                        satisfiable = false;
                        break;
                    }
                }
                if satisfiable {
                    for op in ops {
                        let slot = &mut values[op.sem_num];
                        *slot = (*slot + op.op).min(SEMVMX);
                    }
                    drop(values);
                    blocker.wake_all(&self.changed);
                    return Ok(());
                }
            }
            blocker.park_on(&self.changed);
        }
    }
}

pub struct SemTable {
    ids: IdAllocator,
    by_key: Spinlock<BTreeMap<i32, Arc<SemaphoreSet>>>,
    by_id: Spinlock<BTreeMap<i32, Arc<SemaphoreSet>>>,
}

impl SemTable {
    pub const fn new() -> Self {
        Self {
            ids: IdAllocator::new(),
            by_key: Spinlock::new(BTreeMap::new()),
            by_id: Spinlock::new(BTreeMap::new()),
        }
    }

    pub fn get_or_create(
        &self,
        key: i32,
        count: usize,
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
            return Ok(existing.ipc.id);
        }
        if !create {
            return Err(KernelError::NoSuchEntry);
        }
        let id = self.ids.alloc();
        let set = Arc::new(SemaphoreSet::new(id, count, uid, gid, perms, now));
        self.by_key.lock().insert(key, set.clone());
        self.by_id.lock().insert(id, set);
        Ok(id)
    }

    pub fn lookup(&self, id: i32) -> Option<Arc<SemaphoreSet>> {
        self.by_id.lock().get(&id).cloned()
    }

    pub fn remove(&self, id: i32) -> KernelResult<()> {
        let set = self.by_id.lock().remove(&id).ok_or(KernelError::NoSuchEntry)?;
        self.by_key.lock().retain(|_, v| !Arc::ptr_eq(v, &set));
        Ok(())
    }
}

impl Default for SemTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    struct ImmediateBlocker;
    impl Blocker for ImmediateBlocker {
        fn current_token(&self) -> usize {
            0
        }
        fn park_on(&self, _queue: &WaitQueue) {}
        fn wake_one(&self, _queue: &WaitQueue) {}
        fn wake_all(&self, _queue: &WaitQueue) {}
    }

    #[test]
    fn semop_applies_batch_atomically() {
        let set = SemaphoreSet::new(1, 2, 0, 0, 0o600, 0);
        let blocker = ImmediateBlocker;
        set.semop(&[SemOp { sem_num: 0, op: 1 }, SemOp { sem_num: 1, op: 2 }], &blocker)
            .unwrap();
        assert_eq!(set.get(0).unwrap(), 1);
        assert_eq!(set.get(1).unwrap(), 2);
    }

    #[test]
    fn semop_rejects_out_of_range_index() {
        let set = SemaphoreSet::new(1, 1, 0, 0, 0o600, 0);
        let blocker = ImmediateBlocker;
        assert!(set.semop(&[SemOp { sem_num: 5, op: 1 }], &blocker).is_err());
    }
}
