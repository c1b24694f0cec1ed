//! TLB shootdown (spec.md §4.2): a global per-CPU request-slot table
//! under `kernel_sync::IrqSpinlock`, driven by `kernel-hal`'s APIC IPI
//! delivery. Grounded directly on the teacher's `kernel-hal::x86_64::apic`
//! (IPI send/dispatch, the fixed `TLB_SHOOTDOWN_VECTOR`), widened here
//! with the shootdown protocol proper, which the teacher's single-CPU
//! boot path never needed.

extern crate alloc;

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use kernel_hal::traits::InterruptHandler;
use kernel_hal::x86_64::apic::{IcrLow, APIC, TLB_SHOOTDOWN_VECTOR};
use kernel_hal::x86_64::mmu::{tlb_flush_all, tlb_flush_page, PAGE_SIZE};
use kernel_sync::spinlock::IrqSpinlock;

use crate::task::scheduler::{cpu_index, ArchIrqDisable, MAX_CPUS};

/// `pages = ALL_PAGES` requests a full local TLB flush instead of a
/// bounded `invlpg` loop (spec.md §4.2 "P=~0 ⇒ full TLB flush").
pub const ALL_PAGES: usize = usize::MAX;

/// A CPU-mask bit per possible CPU, dense in the same `0..MAX_CPUS`
/// space `task::scheduler::cpu_index` uses.
pub type CpuMask = u32;

const _: () = assert!(MAX_CPUS <= 32, "CpuMask is a u32 bitmask");

fn mask_bit(cpu: usize) -> CpuMask {
    1 << cpu
}

/// One outstanding shootdown request, describing the range to
/// invalidate and how many target CPUs have acknowledged it.
struct ShootdownRequest {
    addr: usize,
    pages: usize,
    generation: u64,
    completed: AtomicUsize,
}

impl ShootdownRequest {
    fn flush_locally(&self) {
        flush_range(self.addr, self.pages);
    }
}

fn flush_range(addr: usize, pages: usize) {
    if pages == ALL_PAGES || addr == 0 {
        tlb_flush_all();
        return;
    }
    if pages == 0 {
        tlb_flush_page(addr);
        return;
    }
    let mut va = addr;
    for _ in 0..pages {
        tlb_flush_page(va);
        va = va.wrapping_add(PAGE_SIZE);
    }
}

/// Every CPU's incoming-request slot, one `Option<Arc<ShootdownRequest>>`
/// each, all behind a single lock per spec.md §4.2's "global shootdown
/// lock" (contention is brief: store-then-send-IPI, never held across
/// the poll loop).
static SLOTS: IrqSpinlock<[Option<alloc::sync::Arc<ShootdownRequest>>; MAX_CPUS], ArchIrqDisable> =
    IrqSpinlock::new([const { None }; MAX_CPUS]);

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Roughly one second of busy-poll iterations before a shootdown gives
/// up waiting on stragglers (spec.md §4.2/§9). Not calibrated against a
/// real clock — this is a last-resort backstop, not a precise timeout.
const TIMEOUT_SPINS: u64 = 50_000_000;

/// Shoots down the translation for `addr`..`addr + pages * PAGE_SIZE`
/// (or the whole TLB if `pages == ALL_PAGES`) on every CPU named in
/// `cpu_mask`, including the caller if present in the mask.
///
/// Blocks until every remote target has acknowledged or the shootdown
/// has spun past its timeout, at which point it logs and returns
/// anyway (spec.md §9: "safe default is to log, continue, and panic in
/// a debug build").
pub fn shootdown(addr: usize, pages: usize, cpu_mask: CpuMask) {
    let self_index = cpu_index();
    let target_mask = cpu_mask & !mask_bit(self_index);

    if target_mask == 0 {
        flush_range(addr, pages);
        return;
    }

    let request = alloc::sync::Arc::new(ShootdownRequest {
        addr,
        pages,
        generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        completed: AtomicUsize::new(0),
    });

    let target_count = target_mask.count_ones() as usize;

    {
        let mut slots = SLOTS.lock();
        for cpu in 0..MAX_CPUS {
            if target_mask & mask_bit(cpu) != 0 {
                slots[cpu] = Some(request.clone());
            }
        }
    }

    for cpu in 0..MAX_CPUS {
        if target_mask & mask_bit(cpu) != 0 {
            APIC.send_ipi(cpu as u32, IcrLow::fixed(TLB_SHOOTDOWN_VECTOR));
        }
    }

    flush_range(addr, pages);

    let mut spins = 0u64;
    while request.completed.load(Ordering::Acquire) < target_count {
        core::hint::spin_loop();
        spins += 1;
        if spins >= TIMEOUT_SPINS {
            log::warn!(
                "shootdown generation {} timed out with {}/{} CPUs acknowledged",
                request.generation,
                request.completed.load(Ordering::Acquire),
                target_count
            );
            debug_assert!(false, "TLB shootdown overran its timeout");
            break;
        }
    }
}

/// Convenience wrapper for a single page (spec.md §4.2 "P=0 ⇒
/// single-page invlpg").
pub fn shootdown_page(addr: usize, cpu_mask: CpuMask) {
    shootdown(addr, 0, cpu_mask);
}

/// Convenience wrapper for a full-TLB shootdown, e.g. after switching
/// an address space's page tables wholesale.
pub fn shootdown_all(cpu_mask: CpuMask) {
    shootdown(0, ALL_PAGES, cpu_mask);
}

/// The IPI handler every CPU registers under `TLB_SHOOTDOWN_VECTOR`:
/// takes this CPU's slot, flushes the requested range, and records
/// completion with `Release` ordering so the initiator's `Acquire`
/// load is guaranteed to observe the flush having already happened.
struct ShootdownHandler;

impl InterruptHandler for ShootdownHandler {
    fn handle(&self, _irq: u32) {
        let request = {
            let mut slots = SLOTS.lock();
            slots[cpu_index()].take()
        };
        if let Some(request) = request {
            request.flush_locally();
            request.completed.fetch_add(1, Ordering::Release);
        }
        APIC.signal_eoi();
    }
}

static SHOOTDOWN_HANDLER: ShootdownHandler = ShootdownHandler;

/// Registers the shootdown IPI handler. Called once from
/// `kernel::init::run`, after the local APIC is initialized.
pub fn init() {
    kernel_hal::x86_64::apic::register_handler(TLB_SHOOTDOWN_VECTOR, &SHOOTDOWN_HANDLER);
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn mask_bit_is_a_single_bit() {
        assert_eq!(mask_bit(0), 1);
        assert_eq!(mask_bit(3), 0b1000);
    }

    #[test]
    fn target_mask_excludes_self() {
        let self_index = 0usize;
        let mask: CpuMask = 0b1111;
        let target = mask & !mask_bit(self_index);
        assert_eq!(target, 0b1110);
    }

    #[test]
    fn single_cpu_mask_flushes_locally_without_ipi() {
        // With only the caller in the mask, `shootdown` takes the
        // local-flush early return; this is mostly documentation that
        // the real assertion lives in `shootdown`'s control flow, since
        // exercising the IPI path needs real APIC hardware.
        let self_index = 0usize;
        let mask: CpuMask = mask_bit(self_index);
        assert_eq!(mask & !mask_bit(self_index), 0);
    }
}
