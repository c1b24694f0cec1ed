//! Capability bits for the 64-bit mask in `task::credentials::Credentials`
//! (spec.md §3/§4.8). Bit positions follow the Linux `CAP_*` numbering so
//! the mask reads the same way a `capget(2)` caller would expect; the
//! `other_examples` capability enums iterate the full POSIX set with a
//! `HashSet`, which a `no_std` kernel without a heap-backed set by
//! default has no business doing for a single AND-check on every
//! syscall, so this stays a plain set of `const` bit indices over `u64`.

pub const CAP_CHOWN: u32 = 0;
pub const CAP_DAC_OVERRIDE: u32 = 1;
pub const CAP_DAC_READ_SEARCH: u32 = 2;
pub const CAP_FOWNER: u32 = 3;
pub const CAP_FSETID: u32 = 4;
pub const CAP_KILL: u32 = 5;
pub const CAP_SETGID: u32 = 6;
pub const CAP_SETUID: u32 = 7;
pub const CAP_SETPCAP: u32 = 8;
pub const CAP_NET_BIND_SERVICE: u32 = 10;
pub const CAP_NET_ADMIN: u32 = 12;
pub const CAP_SYS_MODULE: u32 = 16;
pub const CAP_SYS_RAWIO: u32 = 17;
pub const CAP_SYS_CHROOT: u32 = 18;
pub const CAP_SYS_PTRACE: u32 = 19;
pub const CAP_SYS_ADMIN: u32 = 21;
pub const CAP_SYS_BOOT: u32 = 22;
pub const CAP_SYS_NICE: u32 = 23;
pub const CAP_SYS_RESOURCE: u32 = 24;
pub const CAP_SYS_TIME: u32 = 25;
pub const CAP_AUDIT_WRITE: u32 = 29;
pub const CAP_SETFCAP: u32 = 31;

/// Root's starting mask: every bit defined above, plus everything above
/// bit 31 reserved for future capabilities (spec.md §4.8 "root processes
/// start with all bits set").
pub const ALL: u64 = u64::MAX;

#[inline]
pub fn bit(cap: u32) -> u64 {
    1u64 << cap
}

/// `hasCapability(CAP_X)` — a single AND against the process's mask.
#[inline]
pub fn has(mask: u64, cap: u32) -> bool {
    mask & bit(cap) != 0
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn root_mask_has_every_named_capability() {
        for cap in [CAP_CHOWN, CAP_SYS_ADMIN, CAP_SYS_RESOURCE, CAP_SETFCAP] {
            assert!(has(ALL, cap));
        }
    }

    #[test]
    fn unprivileged_mask_has_none() {
        assert!(!has(0, CAP_SYS_ADMIN));
    }

    #[test]
    fn has_is_a_single_bit_check() {
        let mask = bit(CAP_KILL) | bit(CAP_SETUID);
        assert!(has(mask, CAP_KILL));
        assert!(has(mask, CAP_SETUID));
        assert!(!has(mask, CAP_SYS_ADMIN));
    }
}
