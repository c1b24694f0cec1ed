//! Lock-free building blocks: a fixed-capacity atomic bitset and a
//! single-writer sequence lock for torn-read-free snapshots of small
//! `Copy` values (used for the monotonic clock pair in `kernel::time`).

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

const WORD_BITS: usize = 64;

/// Fixed-capacity atomic bitset backed by `WORDS` `AtomicU64` words.
///
/// Used for the seccomp syscall-allow bitmap (512 bits = 8 words) and
/// similar fixed-universe membership tests that must be checked from
/// interrupt context without blocking.
pub struct AtomicBitset<const WORDS: usize> {
    words: [AtomicU64; WORDS],
}

impl<const WORDS: usize> AtomicBitset<WORDS> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: [const { AtomicU64::new(0) }; WORDS],
        }
    }

    pub fn set(&self, bit: usize, ordering: Ordering) {
        let (word, mask) = Self::locate(bit);
        self.words[word].fetch_or(mask, ordering);
    }

    pub fn clear(&self, bit: usize, ordering: Ordering) {
        let (word, mask) = Self::locate(bit);
        self.words[word].fetch_and(!mask, ordering);
    }

    #[must_use]
    pub fn test(&self, bit: usize, ordering: Ordering) -> bool {
        let (word, mask) = Self::locate(bit);
        self.words[word].load(ordering) & mask != 0
    }

    /// Atomically set `bit`, returning whether it was already set.
    pub fn test_and_set(&self, bit: usize, ordering: Ordering) -> bool {
        let (word, mask) = Self::locate(bit);
        self.words[word].fetch_or(mask, ordering) & mask != 0
    }

    pub fn clear_all(&self, ordering: Ordering) {
        for word in &self.words {
            word.store(0, ordering);
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        WORDS * WORD_BITS
    }

    fn locate(bit: usize) -> (usize, u64) {
        (bit / WORD_BITS, 1u64 << (bit % WORD_BITS))
    }
}

impl<const WORDS: usize> Default for AtomicBitset<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

/// A single-writer, many-reader sequence lock.
///
/// Readers never block the writer and detect a concurrent write by
/// re-checking the sequence counter; they retry on a torn read instead
/// of spinning on a lock. Intended for small `Copy` snapshots such as a
/// `(seconds, nanos)` clock pair, not for arbitrary data.
pub struct SeqLock<T: Copy> {
    seq: AtomicUsize,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is only ever a full-value copy, guarded by the
// sequence counter; there is no reference escaping the read/write methods.
unsafe impl<T: Copy + Send> Sync for SeqLock<T> {}

impl<T: Copy> SeqLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            seq: AtomicUsize::new(0),
            data: UnsafeCell::new(value),
        }
    }

    /// Take a consistent snapshot, retrying while a writer is in progress.
    pub fn read(&self) -> T {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 != 0 {
                core::hint::spin_loop();
                continue;
            }
            // SAFETY: the sequence check below rejects any read that
            // raced a concurrent write.
            let value = unsafe { *self.data.get() };
            let after = self.seq.load(Ordering::Acquire);
            if before == after {
                return value;
            }
        }
    }

    /// Install a new value. Callers must serialize writers themselves
    /// (e.g. one writer per CPU, or behind a spinlock); `SeqLock` only
    /// guarantees readers never observe a torn value.
    pub fn write(&self, value: T) {
        self.seq.fetch_add(1, Ordering::AcqRel);
        // SAFETY: writer has exclusive access per the single-writer contract.
        unsafe { *self.data.get() = value };
        self.seq.fetch_add(1, Ordering::Release);
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn bitset_set_clear_test() {
        let bits: AtomicBitset<2> = AtomicBitset::new();
        assert!(!bits.test(70, Ordering::Relaxed));
        bits.set(70, Ordering::Relaxed);
        assert!(bits.test(70, Ordering::Relaxed));
        assert_eq!(bits.capacity(), 128);
        bits.clear(70, Ordering::Relaxed);
        assert!(!bits.test(70, Ordering::Relaxed));
    }

    #[test]
    fn bitset_test_and_set_reports_prior_state() {
        let bits: AtomicBitset<1> = AtomicBitset::new();
        assert!(!bits.test_and_set(3, Ordering::Relaxed));
        assert!(bits.test_and_set(3, Ordering::Relaxed));
    }

    #[test]
    fn seqlock_read_after_write() {
        let lock = SeqLock::new((0u64, 0u64));
        lock.write((1, 2));
        assert_eq!(lock.read(), (1, 2));
        lock.write((3, 4));
        assert_eq!(lock.read(), (3, 4));
    }
}
