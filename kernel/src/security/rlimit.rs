//! Per-process resource limits (spec.md §3 `Process.limits`, §4.8) plus
//! the per-UID fork rate limiter `task::fork` consults before spawning.
//! There is no teacher module for this; the `{soft, hard}` pair per
//! resource and the `CAP_SYS_RESOURCE`-gated raise follow spec.md §4.8
//! directly, using the same `kernel_sync::spinlock::Spinlock` protection
//! the rest of this crate wraps small mutable state in.

extern crate alloc;

use kernel_error::{KernelError, KernelResult};
use kernel_sync::spinlock::Spinlock;
use kernel_utils::HashMap;

use super::capability::{self, CAP_SYS_RESOURCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Resource {
    NProc = 0,
    NoFile = 1,
    Rss = 2,
    As = 3,
    Fsize = 4,
    Cpu = 5,
}

const RESOURCE_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub soft: u64,
    pub hard: u64,
}

impl Limit {
    pub const fn unlimited() -> Self {
        Self {
            soft: u64::MAX,
            hard: u64::MAX,
        }
    }
}

pub struct ResourceLimits {
    limits: Spinlock<[Limit; RESOURCE_COUNT]>,
}

impl ResourceLimits {
    /// Process-default limits: NPROC and NOFILE bounded to sane values
    /// (NOFILE matching `task::fd::MAX_FDS`), everything else unlimited
    /// until an administrator tightens it.
    pub fn new_default() -> Self {
        let mut limits = [Limit::unlimited(); RESOURCE_COUNT];
        limits[Resource::NProc as usize] = Limit { soft: 64, hard: 4096 };
        limits[Resource::NoFile as usize] = Limit {
            soft: crate::task::fd::MAX_FDS as u64,
            hard: crate::task::fd::MAX_FDS as u64,
        };
        Self {
            limits: Spinlock::new(limits),
        }
    }

    pub fn get(&self, resource: Resource) -> Limit {
        self.limits.lock()[resource as usize]
    }

    /// `setrlimit`: raising the hard limit (or setting a soft limit
    /// above the current hard limit) requires `CAP_SYS_RESOURCE`
    /// (spec.md §4.8).
    pub fn set(&self, resource: Resource, new: Limit, capability_mask: u64) -> KernelResult<()> {
        if new.soft > new.hard {
            return Err(KernelError::InvalidArgument);
        }
        let mut limits = self.limits.lock();
        let current = limits[resource as usize];
        let raises_hard = new.hard > current.hard;
        if raises_hard && !capability::has(capability_mask, CAP_SYS_RESOURCE) {
            return Err(KernelError::PermissionDenied);
        }
        limits[resource as usize] = new;
        Ok(())
    }

    /// Used by fork/open/mmap/brk/write enforcement hooks: is `value`
    /// within the soft limit for `resource`?
    pub fn check(&self, resource: Resource, value: u64) -> KernelResult<()> {
        if value > self.get(resource).soft {
            return Err(KernelError::ResourceLimitExceeded);
        }
        Ok(())
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::new_default()
    }
}

/// Default fork budget (spec.md §4.4): 100 forks per second per UID.
pub const DEFAULT_FORK_RATE_PER_SECOND: u32 = 100;

struct Bucket {
    window_start_ns: u64,
    count: u32,
}

/// Sliding-window fork rate limiter keyed by UID, consulted alongside
/// `RLIMIT_NPROC` before every fork (spec.md §4.4 "pre-fork checks").
pub struct ForkRateLimiter {
    buckets: Spinlock<HashMap<u32, Bucket>>,
    limit_per_second: u32,
}

impl ForkRateLimiter {
    pub fn new(limit_per_second: u32) -> Self {
        Self {
            buckets: Spinlock::new(HashMap::new()),
            limit_per_second,
        }
    }

    /// Records one fork attempt by `uid` at `now_ns`, rejecting once the
    /// current one-second window already holds `limit_per_second`
    /// attempts.
    pub fn check_and_record(&self, uid: u32, now_ns: u64) -> KernelResult<()> {
        const WINDOW_NS: u64 = 1_000_000_000;
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(uid).or_insert(Bucket {
            window_start_ns: now_ns,
            count: 0,
        });
        if now_ns.saturating_sub(bucket.window_start_ns) >= WINDOW_NS {
            bucket.window_start_ns = now_ns;
            bucket.count = 0;
        }
        if bucket.count >= self.limit_per_second {
            return Err(KernelError::RateLimitExceeded);
        }
        bucket.count += 1;
        Ok(())
    }
}

impl Default for ForkRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_FORK_RATE_PER_SECOND)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn default_nofile_matches_fd_table_capacity() {
        let limits = ResourceLimits::new_default();
        assert_eq!(
            limits.get(Resource::NoFile).soft,
            crate::task::fd::MAX_FDS as u64
        );
    }

    #[test]
    fn raising_hard_limit_requires_capability() {
        let limits = ResourceLimits::new_default();
        let raised = Limit { soft: 10, hard: 100_000 };
        assert_eq!(limits.set(Resource::NProc, raised, 0), Err(KernelError::PermissionDenied));
        assert!(limits
            .set(Resource::NProc, raised, capability::bit(CAP_SYS_RESOURCE))
            .is_ok());
    }

    #[test]
    fn check_rejects_values_above_soft_limit() {
        let limits = ResourceLimits::new_default();
        assert!(limits.check(Resource::NProc, 1).is_ok());
        assert_eq!(
            limits.check(Resource::NProc, 1_000_000),
            Err(KernelError::ResourceLimitExceeded)
        );
    }

    #[test]
    fn fork_rate_limiter_rejects_after_budget_exhausted() {
        let limiter = ForkRateLimiter::new(2);
        assert!(limiter.check_and_record(1000, 0).is_ok());
        assert!(limiter.check_and_record(1000, 0).is_ok());
        assert_eq!(
            limiter.check_and_record(1000, 0),
            Err(KernelError::RateLimitExceeded)
        );
    }

    #[test]
    fn fork_rate_limiter_resets_after_window_elapses() {
        let limiter = ForkRateLimiter::new(1);
        assert!(limiter.check_and_record(7, 0).is_ok());
        assert_eq!(limiter.check_and_record(7, 0), Err(KernelError::RateLimitExceeded));
        assert!(limiter.check_and_record(7, 2_000_000_000).is_ok());
    }
}
