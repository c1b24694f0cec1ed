//! Kernel lockdown (spec.md §4.8): a global, non-downgradable level
//! gating a fixed set of operations that would otherwise let a
//! privileged process tamper with the running kernel image or read
//! secrets out of it. Settable once at boot; secure boot raises it to
//! `Integrity` automatically before any user process runs.

extern crate alloc;

use core::sync::atomic::{AtomicU8, Ordering};

use kernel_error::{KernelError, KernelResult};

use super::audit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LockdownLevel {
    None = 0,
    Integrity = 1,
    Confidentiality = 2,
}

impl LockdownLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            2 => LockdownLevel::Confidentiality,
            1 => LockdownLevel::Integrity,
            _ => LockdownLevel::None,
        }
    }
}

/// The ~16 operations lockdown can gate, each requiring at least the
/// paired level to succeed. Split along the same line the upstream
/// Linux lockdown LSM draws: `Integrity` blocks operations that could
/// modify the running kernel; `Confidentiality` additionally blocks
/// operations that could read secrets out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockdownOperation {
    RawIoPort,
    RawMsrWrite,
    KexecLoad,
    KexecFirmware,
    UnsignedModuleLoad,
    ModuleParamsUnsafe,
    Hibernate,
    PciBarAccess,
    AcpiTableOverride,
    DeviceTreeOverride,
    IoPortIoctl,
    RawMsrRead,
    KcoreMemory,
    BpfRead,
    PerfEventsKernel,
    TracingDebugfs,
}

impl LockdownOperation {
    const fn required_level(self) -> LockdownLevel {
        match self {
            LockdownOperation::RawIoPort
            | LockdownOperation::RawMsrWrite
            | LockdownOperation::KexecLoad
            | LockdownOperation::KexecFirmware
            | LockdownOperation::UnsignedModuleLoad
            | LockdownOperation::ModuleParamsUnsafe
            | LockdownOperation::Hibernate
            | LockdownOperation::PciBarAccess
            | LockdownOperation::AcpiTableOverride
            | LockdownOperation::DeviceTreeOverride => LockdownLevel::Integrity,
            LockdownOperation::IoPortIoctl
            | LockdownOperation::RawMsrRead
            | LockdownOperation::KcoreMemory
            | LockdownOperation::BpfRead
            | LockdownOperation::PerfEventsKernel
            | LockdownOperation::TracingDebugfs => LockdownLevel::Confidentiality,
        }
    }
}

/// Holds the level as an `AtomicU8` so raising it is lock-free from
/// any context, including an interrupt handler checking lockdown
/// before honoring a debug trap.
pub struct LockdownState {
    level: AtomicU8,
}

impl LockdownState {
    pub const fn new() -> Self {
        Self {
            level: AtomicU8::new(LockdownLevel::None as u8),
        }
    }

    pub fn level(&self) -> LockdownLevel {
        LockdownLevel::from_u8(self.level.load(Ordering::Acquire))
    }

    /// Raise the level. Never downgrades: a request for a level below
    /// the current one is silently a no-op rather than an error,
    /// matching "non-downgradable" in spec.md §4.8.
    pub fn raise_to(&self, level: LockdownLevel) {
        self.level.fetch_max(level as u8, Ordering::AcqRel);
    }

    /// Called once during boot when the platform reports secure boot
    /// is enabled (spec.md §4.8 "secure boot enables INTEGRITY
    /// automatically").
    pub fn init_from_secure_boot(&self, secure_boot_enabled: bool) {
        if secure_boot_enabled {
            self.raise_to(LockdownLevel::Integrity);
        }
    }

    pub fn is_allowed(&self, op: LockdownOperation) -> bool {
        self.level() < op.required_level()
    }

    /// Consult lockdown before performing `op`; on denial, audits and
    /// returns `OperationLocked` (spec.md §4.8/§7).
    pub fn check(&self, op: LockdownOperation, pid: u32, uid: u32) -> KernelResult<()> {
        if self.is_allowed(op) {
            Ok(())
        } else {
            audit::AUDIT.log_lockdown_denial(
                pid,
                uid,
                alloc::format!("{op:?} denied at lockdown level {:?}", self.level()),
            );
            Err(KernelError::OperationLocked)
        }
    }
}

impl Default for LockdownState {
    fn default() -> Self {
        Self::new()
    }
}

/// Global lockdown state, consulted from `syscall::dispatch` and the
/// security-sensitive handlers it guards.
pub static LOCKDOWN: LockdownState = LockdownState::new();

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn none_level_allows_everything() {
        let state = LockdownState::new();
        assert!(state.is_allowed(LockdownOperation::RawIoPort));
        assert!(state.is_allowed(LockdownOperation::BpfRead));
    }

    #[test]
    fn integrity_blocks_integrity_tier_but_not_confidentiality_tier() {
        let state = LockdownState::new();
        state.raise_to(LockdownLevel::Integrity);
        assert!(!state.is_allowed(LockdownOperation::KexecLoad));
        assert!(state.is_allowed(LockdownOperation::BpfRead));
    }

    #[test]
    fn level_never_downgrades() {
        let state = LockdownState::new();
        state.raise_to(LockdownLevel::Confidentiality);
        state.raise_to(LockdownLevel::None);
        assert_eq!(state.level(), LockdownLevel::Confidentiality);
    }

    #[test]
    fn confidentiality_blocks_both_tiers() {
        let state = LockdownState::new();
        state.raise_to(LockdownLevel::Confidentiality);
        assert!(!state.is_allowed(LockdownOperation::KexecLoad));
        assert!(!state.is_allowed(LockdownOperation::BpfRead));
    }

    #[test]
    fn secure_boot_raises_to_integrity_only() {
        let state = LockdownState::new();
        state.init_from_secure_boot(true);
        assert_eq!(state.level(), LockdownLevel::Integrity);
    }
}
