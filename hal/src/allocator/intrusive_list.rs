//! Intrusive doubly-linked list used by the buddy and slab allocators.
//!
//! Nodes carry their own `next`/`prev` pointers (via `ListNode`) so the
//! list itself never allocates; this is what lets the free-list machinery
//! run before any heap allocator exists.

use core::ptr::NonNull;

/// A type that can be linked into an `IntrusiveList`.
pub trait ListNode {
    fn next(&self) -> Option<NonNull<Self>>;
    fn prev(&self) -> Option<NonNull<Self>>;
    fn set_next(&mut self, next: Option<NonNull<Self>>);
    fn set_prev(&mut self, prev: Option<NonNull<Self>>);
}

/// Doubly-linked list over `&'static mut T` nodes, referenced by raw pointer.
pub struct IntrusiveList<T: ListNode> {
    head: Option<NonNull<T>>,
    tail: Option<NonNull<T>>,
}

impl<T: ListNode> IntrusiveList<T> {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn push_front(&mut self, node: &'static mut T) {
        let ptr = NonNull::from(&mut *node);
        node.set_prev(None);
        node.set_next(self.head);
        if let Some(mut old_head) = self.head {
            // SAFETY: old_head is a live node previously inserted into this list.
            unsafe { old_head.as_mut().set_prev(Some(ptr)) };
        } else {
            self.tail = Some(ptr);
        }
        self.head = Some(ptr);
    }

    pub fn pop_front(&mut self) -> Option<NonNull<T>> {
        let mut head = self.head?;
        // SAFETY: head came from an entry pushed into this list; it is live
        // until removed here.
        let next = unsafe { head.as_mut().next() };
        self.head = next;
        match next {
            Some(mut n) => unsafe { n.as_mut().set_prev(None) },
            None => self.tail = None,
        }
        // SAFETY: see above.
        unsafe { head.as_mut().set_next(None) };
        Some(head)
    }

    /// Peek the head node without removing it.
    pub fn head(&self) -> Option<NonNull<T>> {
        self.head
    }

    /// Remove an arbitrary node from the list.
    pub fn remove(&mut self, node: &mut T) {
        let prev = node.prev();
        let next = node.next();
        match prev {
            // SAFETY: prev/next pointers are maintained exclusively by this list
            // and always point at other nodes currently linked into it.
            Some(mut p) => unsafe { p.as_mut().set_next(next) },
            None => self.head = next,
        }
        match next {
            Some(mut n) => unsafe { n.as_mut().set_prev(prev) },
            None => self.tail = prev,
        }
        node.set_next(None);
        node.set_prev(None);
    }
}

// SAFETY: access to an IntrusiveList is always mediated by the allocator's
// own Mutex; the list itself holds no interior mutability beyond raw pointers.
unsafe impl<T: ListNode> Send for IntrusiveList<T> {}
unsafe impl<T: ListNode> Sync for IntrusiveList<T> {}
