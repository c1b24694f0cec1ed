//! Portable synchronization primitives for the kernel and its HAL.
//!
//! `kernel-sync` has no dependency on `core::arch` or any concrete thread
//! type: interrupt-disable discipline is expressed through the
//! [`IrqDisable`] trait (implemented by the arch layer), and blocking
//! primitives hand out opaque waiter tokens (`usize`) rather than owning a
//! `Thread` type, so the scheduler in the `kernel` crate decides what a
//! token means.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod atomic;
pub mod barrier;
pub mod mutex;
pub mod once;
pub mod semaphore;
pub mod spinlock;
pub mod wait_queue;

pub use atomic::{AtomicBitset, SeqLock};
pub use barrier::Barrier;
pub use mutex::{PriorityMutex, PriorityMutexGuard, TicketMutex, TicketMutexGuard};
pub use once::Once;
pub use semaphore::Semaphore;
pub use spinlock::{IrqDisable, IrqSpinlock, RwSpinlock, Spinlock, SpinlockGuard};
pub use wait_queue::WaitQueue;
