//! Per-page copy-on-write refcounts (spec.md §4.3, §8 scenario 1).
//!
//! A page starts unshared (absent from the table, refcount 1 implied).
//! `fork_cow` marks private writable pages shared (refcount 2); a write
//! fault decrements on copy, or simply re-asserts the writable bit when
//! the refcount has already dropped back to 1.

extern crate alloc;

use alloc::collections::BTreeMap;
use kernel_sync::spinlock::Spinlock;

use super::VirtualAddress;

pub struct CowTable {
    counts: Spinlock<BTreeMap<u64, u32>>,
}

impl CowTable {
    pub const fn new() -> Self {
        Self {
            counts: Spinlock::new(BTreeMap::new()),
        }
    }

    /// Mark a page as freshly shared between parent and child (fork).
    /// If it was already shared, bump the refcount by one more owner.
    pub fn mark_shared(&self, page: VirtualAddress) {
        let key = page.align_down().0;
        let mut counts = self.counts.lock();
        let entry = counts.entry(key).or_insert(1);
        *entry += 1;
    }

    pub fn refcount(&self, page: VirtualAddress) -> u32 {
        let key = page.align_down().0;
        *self.counts.lock().get(&key).unwrap_or(&1)
    }

    /// A write fault on `page`. Returns `true` if the caller can simply
    /// reassert the writable bit in place (refcount was already 1),
    /// `false` if the caller must allocate a new frame, copy the
    /// contents, and install the new PTE (refcount > 1, decremented
    /// here on behalf of the faulting owner).
    pub fn handle_write_fault(&self, page: VirtualAddress) -> bool {
        let key = page.align_down().0;
        let mut counts = self.counts.lock();
        match counts.get_mut(&key) {
            None => true,
            Some(count) if *count <= 1 => {
                counts.remove(&key);
                true
            }
            Some(count) => {
                *count -= 1;
                false
            }
        }
    }
}

impl Default for CowTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn unshared_page_reasserts_write_bit() {
        let table = CowTable::new();
        assert!(table.handle_write_fault(VirtualAddress(0x1000)));
    }

    #[test]
    fn shared_page_drops_to_one_after_one_write() {
        let table = CowTable::new();
        table.mark_shared(VirtualAddress(0x1000));
        assert_eq!(table.refcount(VirtualAddress(0x1000)), 2);
        assert!(!table.handle_write_fault(VirtualAddress(0x1000)));
        assert_eq!(table.refcount(VirtualAddress(0x1000)), 1);
        // Other pages untouched.
        assert_eq!(table.refcount(VirtualAddress(0x2000)), 1);
    }

    #[test]
    fn second_write_after_drop_reasserts_in_place() {
        let table = CowTable::new();
        table.mark_shared(VirtualAddress(0x1000));
        table.handle_write_fault(VirtualAddress(0x1000));
        assert!(table.handle_write_fault(VirtualAddress(0x1000)));
    }
}
