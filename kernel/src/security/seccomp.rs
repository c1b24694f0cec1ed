//! Per-process syscall filter (spec.md §4.8, §9 REDESIGN FLAGS). The
//! original whitelist idea in `other_examples`' `seccomp.rs` compiles a
//! syscall name list down to host BPF bytecode for an out-of-process
//! jailer; there is no BPF VM here, so the equivalent in-kernel check is
//! a direct bitmap test against the fixed 512-entry syscall table
//! (`kernel_sync::atomic::AtomicBitset`), consulted by
//! `syscall::dispatch` before the handler runs.

extern crate alloc;

use kernel_error::{KernelError, KernelResult};
use kernel_sync::atomic::AtomicBitset;
use kernel_sync::spinlock::Spinlock;
use core::sync::atomic::{AtomicU8, Ordering};

/// Syscall table size (spec.md §4.5): 512 slots, 8 `u64` words.
const TABLE_WORDS: usize = 512 / 64;

const SYS_READ: u32 = 0;
const SYS_WRITE: u32 = 1;
const SYS_RT_SIGRETURN: u32 = 15;
const SYS_EXIT: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SeccompMode {
    Disabled = 0,
    Strict = 1,
    Filter = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeccompAction {
    Allow,
    KillThread,
    KillProcess,
    Errno(i32),
    Trap,
    Trace,
    Log,
}

pub struct SeccompFilter {
    mode: AtomicU8,
    default_action: Spinlock<SeccompAction>,
    allowed: AtomicBitset<TABLE_WORDS>,
    locked: core::sync::atomic::AtomicBool,
}

impl SeccompFilter {
    pub fn new() -> Self {
        Self {
            mode: AtomicU8::new(SeccompMode::Disabled as u8),
            default_action: Spinlock::new(SeccompAction::Allow),
            allowed: AtomicBitset::new(),
            locked: core::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> SeccompMode {
        match self.mode.load(Ordering::Acquire) {
            1 => SeccompMode::Strict,
            2 => SeccompMode::Filter,
            _ => SeccompMode::Disabled,
        }
    }

    /// Transition out of `Disabled` exactly once. A second call (any
    /// mode, including re-requesting the same one) is a relaxation
    /// attempt and fails — the filter is monotonic (spec.md §4.8/§8).
    pub fn set_mode(&self, mode: SeccompMode) -> KernelResult<()> {
        match self
            .mode
            .compare_exchange(
                SeccompMode::Disabled as u8,
                mode as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
            Ok(_) => Ok(()),
            Err(_) => Err(KernelError::FilterLocked),
        }
    }

    /// Install the full FILTER-mode policy in one call: the allow-list
    /// and the default action for everything not on it, then locks the
    /// filter against further edits. Requires `mode() == Filter`.
    pub fn install_filter(&self, allow: &[u32], default_action: SeccompAction) -> KernelResult<()> {
        if self.mode() != SeccompMode::Filter {
            return Err(KernelError::InvalidArgument);
        }
        if self.locked.load(Ordering::Acquire) {
            return Err(KernelError::FilterLocked);
        }
        for &nr in allow {
            self.allow_syscall(nr)?;
        }
        *self.default_action.lock() = default_action;
        self.lock();
        Ok(())
    }

    pub fn allow_syscall(&self, nr: u32) -> KernelResult<()> {
        if self.locked.load(Ordering::Acquire) {
            return Err(KernelError::FilterLocked);
        }
        if nr as usize >= TABLE_WORDS * 64 {
            return Err(KernelError::SyscallOutOfRange);
        }
        self.allowed.set(nr as usize, Ordering::Release);
        Ok(())
    }

    pub fn deny_syscall(&self, nr: u32) -> KernelResult<()> {
        if self.locked.load(Ordering::Acquire) {
            return Err(KernelError::FilterLocked);
        }
        if nr as usize >= TABLE_WORDS * 64 {
            return Err(KernelError::SyscallOutOfRange);
        }
        self.allowed.clear(nr as usize, Ordering::Release);
        Ok(())
    }

    /// Locks the filter: no further `allow_syscall`/`deny_syscall`/
    /// `set_mode` calls succeed. Irreversible.
    pub fn lock(&self) {
        self.locked.store(true, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// What `syscall::dispatch` should do with syscall number `nr`
    /// before invoking its handler.
    pub fn decide(&self, nr: u32) -> SeccompAction {
        match self.mode() {
            SeccompMode::Disabled => SeccompAction::Allow,
            SeccompMode::Strict => {
                if matches!(nr, SYS_READ | SYS_WRITE | SYS_EXIT | SYS_RT_SIGRETURN) {
                    SeccompAction::Allow
                } else {
                    SeccompAction::KillProcess
                }
            }
            SeccompMode::Filter => {
                if (nr as usize) < TABLE_WORDS * 64 && self.allowed.test(nr as usize, Ordering::Acquire) {
                    SeccompAction::Allow
                } else {
                    *self.default_action.lock()
                }
            }
        }
    }
}

impl Default for SeccompFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn disabled_allows_everything() {
        let f = SeccompFilter::new();
        assert_eq!(f.decide(42), SeccompAction::Allow);
    }

    #[test]
    fn strict_mode_allows_only_the_fixed_four() {
        let f = SeccompFilter::new();
        f.set_mode(SeccompMode::Strict).unwrap();
        assert_eq!(f.decide(SYS_READ), SeccompAction::Allow);
        assert_eq!(f.decide(SYS_WRITE), SeccompAction::Allow);
        assert_eq!(f.decide(SYS_EXIT), SeccompAction::Allow);
        assert_eq!(f.decide(SYS_RT_SIGRETURN), SeccompAction::Allow);
        assert_eq!(f.decide(42), SeccompAction::KillProcess);
    }

    #[test]
    fn filter_mode_kill_process_scenario() {
        let f = SeccompFilter::new();
        f.set_mode(SeccompMode::Filter).unwrap();
        f.install_filter(&[0, 1, 60, 15], SeccompAction::KillProcess).unwrap();
        assert_eq!(f.decide(1), SeccompAction::Allow);
        assert_eq!(f.decide(42), SeccompAction::KillProcess);
    }

    #[test]
    fn locked_filter_rejects_further_edits() {
        let f = SeccompFilter::new();
        f.set_mode(SeccompMode::Filter).unwrap();
        f.install_filter(&[0], SeccompAction::KillProcess).unwrap();
        assert_eq!(f.allow_syscall(1), Err(KernelError::FilterLocked));
        assert_eq!(f.deny_syscall(0), Err(KernelError::FilterLocked));
    }

    #[test]
    fn mode_cannot_be_relaxed_once_set() {
        let f = SeccompFilter::new();
        f.set_mode(SeccompMode::Strict).unwrap();
        assert_eq!(f.set_mode(SeccompMode::Disabled), Err(KernelError::FilterLocked));
        assert_eq!(f.set_mode(SeccompMode::Filter), Err(KernelError::FilterLocked));
    }
}
