//! System V message queues: typed byte messages, `msgrcv`'s three
//! matching modes (exact type, any type, "lowest type not exceeding
//! |mtype|"), and blocking send/receive via the same `Blocker`
//! abstraction `fs::pipe` uses.

extern crate alloc;

use alloc::collections::{BTreeMap, VecDeque};
use alloc::sync::Arc;
use alloc::vec::Vec;

use kernel_error::{KernelError, KernelResult};
use kernel_sync::spinlock::Spinlock;
use kernel_sync::wait_queue::WaitQueue;

use crate::fs::pipe::Blocker;

use super::{IdAllocator, IpcObject};

/// Default total queue capacity in bytes (Linux's `MSGMNB` default).
pub const DEFAULT_MAX_BYTES: usize = 16 * 1024;

pub struct Message {
    pub mtype: i64,
    pub data: Vec<u8>,
}

struct Inner {
    messages: VecDeque<Message>,
    bytes_used: usize,
}

pub struct MessageQueue {
    pub ipc: IpcObject,
    pub max_bytes: usize,
    inner: Spinlock<Inner>,
    not_empty: WaitQueue,
    not_full: WaitQueue,
}

impl MessageQueue {
    fn new(id: i32, uid: u32, gid: u32, perms: u32, now: u64) -> Self {
        Self {
            ipc: IpcObject::new(id, uid, gid, perms, now),
            max_bytes: DEFAULT_MAX_BYTES,
            inner: Spinlock::new(Inner {
                messages: VecDeque::new(),
                bytes_used: 0,
            }),
            not_empty: WaitQueue::new(),
            not_full: WaitQueue::new(),
        }
    }

    pub fn send(&self, mtype: i64, data: Vec<u8>, blocker: &dyn Blocker) -> KernelResult<()> {
        if mtype <= 0 {
            return Err(KernelError::InvalidArgument);
        }
        let len = data.len();
        if len > self.max_bytes {
            return Err(KernelError::MessageTooLarge);
        }
        loop {
            {
                let mut inner = self.inner.lock();
                if inner.bytes_used + len <= self.max_bytes {
                    inner.bytes_used += len;
                    inner.messages.push_back(Message { mtype, data });
                    drop(inner);
                    blocker.wake_one(&self.not_empty);
                    return Ok(());
                }
            }
            blocker.park_on(&self.not_full);
        }
    }

    /// `msgtyp == 0`: FIFO, any type. `msgtyp > 0`: exact match.
    /// `msgtyp < 0`: the lowest type present that is `<= |msgtyp|`.
    pub fn receive(&self, msgtyp: i64, blocker: &dyn Blocker) -> KernelResult<Message> {
        loop {
            {
                let mut inner = self.inner.lock();
                let index = match msgtyp.cmp(&0) {
                    core::cmp::Ordering::Equal => {
                        if inner.messages.is_empty() {
                            None
                        } else {
                            Some(0)
                        }
                    }
                    core::cmp::Ordering::Greater => {
                        inner.messages.iter().position(|m| m.mtype == msgtyp)
                    }
                    core::cmp::Ordering::Less => {
                        let limit = -msgtyp;
                        inner
                            .messages
                            .iter()
                            .enumerate()
                            .filter(|(_, m)| m.mtype <= limit)
                            .min_by_key(|(_, m)| m.mtype)
                            .map(|(i, _)| i)
                    }
                };
                if let Some(index) = index {
                    let message = inner.messages.remove(index).expect("index was just located");
                    inner.bytes_used -= message.data.len();
                    drop(inner);
                    blocker.wake_one(&self.not_full);
                    return Ok(message);
                }
            }
            blocker.park_on(&self.not_empty);
        }
    }

    pub fn queued_bytes(&self) -> usize {
        self.inner.lock().bytes_used
    }
}

pub struct MsgqTable {
    ids: IdAllocator,
    by_key: Spinlock<BTreeMap<i32, Arc<MessageQueue>>>,
    by_id: Spinlock<BTreeMap<i32, Arc<MessageQueue>>>,
}

impl MsgqTable {
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
        let queue = Arc::new(MessageQueue::new(id, uid, gid, perms, now));
        self.by_key.lock().insert(key, queue.clone());
        self.by_id.lock().insert(id, queue);
        Ok(id)
    }

    pub fn lookup(&self, id: i32) -> Option<Arc<MessageQueue>> {
        self.by_id.lock().get(&id).cloned()
    }

    pub fn remove(&self, id: i32) -> KernelResult<()> {
        let queue = self.by_id.lock().remove(&id).ok_or(KernelError::NoSuchEntry)?;
        self.by_key.lock().retain(|_, v| !Arc::ptr_eq(v, &queue));
        Ok(())
    }
}

impl Default for MsgqTable {
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
    fn fifo_receive_with_msgtyp_zero() {
        let q = MessageQueue::new(1, 0, 0, 0o600, 0);
        let blocker = ImmediateBlocker;
        q.send(1, alloc::vec![1], &blocker).unwrap();
        q.send(2, alloc::vec![2], &blocker).unwrap();
        assert_eq!(q.receive(0, &blocker).unwrap().mtype, 1);
        assert_eq!(q.receive(0, &blocker).unwrap().mtype, 2);
    }

    #[test]
    fn exact_type_match() {
        let q = MessageQueue::new(1, 0, 0, 0o600, 0);
        let blocker = ImmediateBlocker;
        q.send(5, alloc::vec![5], &blocker).unwrap();
        q.send(3, alloc::vec![3], &blocker).unwrap();
        assert_eq!(q.receive(3, &blocker).unwrap().mtype, 3);
        assert_eq!(q.receive(5, &blocker).unwrap().mtype, 5);
    }

    #[test]
    fn negative_msgtyp_picks_lowest_within_bound() {
        let q = MessageQueue::new(1, 0, 0, 0o600, 0);
        let blocker = ImmediateBlocker;
        q.send(5, alloc::vec![5], &blocker).unwrap();
        q.send(2, alloc::vec![2], &blocker).unwrap();
        q.send(8, alloc::vec![8], &blocker).unwrap();
        let msg = q.receive(-6, &blocker).unwrap();
        assert_eq!(msg.mtype, 2);
    }
}
