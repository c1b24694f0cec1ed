//! Boot orchestration: the handoff between `kmain` and a live, scheduled
//! system. Grounded on the teacher's `memory::init`/`arch::x86_64::boot`
//! bring-up sequence (buddy allocator construction from a unified boot
//! info, heap init from linker symbols), widened with everything the
//! teacher's single-threaded demo never needed to stand up: the syscall
//! MSRs, the TLB shootdown IPI handler, a hardware clock, a PID-1
//! process, and a minimal in-memory root filesystem to mount `/proc` on.
//!
//! By the time [`run`] is called, `kernel_hal::arch::init()` has already
//! brought up the GDT/TSS, IDT, CPU exception handlers, the local APIC,
//! the IOAPIC and the 100Hz PIT — this module only owns what sits above
//! that: physical memory, the heap, scheduling, and PID 1.

extern crate alloc;

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::{Arc, Weak};
use core::sync::atomic::{AtomicU64, Ordering};

use kernel_hal::allocator::page::Page;
use kernel_hal::memory::FRAME_ALLOCATOR;
use kernel_hal::traits::InterruptHandler;
use kernel_hal::x86_64::apic::APIC;
use kernel_hal::x86_64::mmu::{self, PageTable};
use kernel_hal::x86_64::syscall::{self, SyscallCpuState};

use crate::boot::BootInfo;
use crate::fs::vfs::dentry::Dentry;
use crate::fs::vfs::inode::{Inode, InodeType};
use crate::fs::vfs::ops::InodeOps;
use crate::fs::vfs::superblock::Superblock;
use crate::memory::address_space::AddressSpace;
use crate::security::namespace::Namespaces;
use crate::security::rlimit::ResourceLimits;
use crate::task::credentials::Credentials;
use crate::task::fd::FdTable;
use crate::task::pid;
use crate::task::process::Process;
use crate::task::scheduler;
use crate::task::thread::{Thread, ThreadContext};
use crate::time::HardwareClock;

/// Image and heap bounds, placed by the linker script. Mirrors the
/// teacher's own `_kernel_virt_start`/`_kernel_end`/`__heap_start`/
/// `__heap_end` symbol pair, which this workspace does not yet declare
/// anywhere else.
unsafe extern "C" {
    static _kernel_start: u8;
    static _kernel_end: u8;
    static __heap_start: u8;
    static __heap_end: u8;
}

/// The legacy BIOS/real-mode area: never handed to the buddy allocator
/// regardless of what the memory map claims about it.
const LEGACY_RESERVED_END: usize = 0x0010_0000;

/// Maximum number of disjoint reserved ranges carved out of usable RAM
/// (legacy area, kernel image, heap, mem_map). Generous relative to the
/// handful this boot path actually produces.
const MAX_RESERVED: usize = 8;

fn add_reserved(regions: &mut [Option<(usize, usize)>; MAX_RESERVED], count: &mut usize, start: usize, end: usize) {
    if start >= end || *count >= MAX_RESERVED {
        return;
    }
    let aligned_start = start & !(mmu::PAGE_SIZE - 1);
    let aligned_end = (end + mmu::PAGE_SIZE - 1) & !(mmu::PAGE_SIZE - 1);
    regions[*count] = Some((aligned_start, aligned_end));
    *count += 1;
}

fn overlaps_any(start: usize, end: usize, reserved: &[Option<(usize, usize)>; MAX_RESERVED]) -> Option<(usize, usize)> {
    reserved.iter().flatten().find(|&&(res_start, res_end)| start < res_end && end > res_start).copied()
}

/// Adds `(start, end)` to the allocator, splitting around every reserved
/// range it overlaps. Mirrors the teacher's `add_range_with_holes`/
/// `add_split` pair, flattened to one recursive helper since our
/// reserved set is a fixed array rather than a `Vec`.
fn add_range_with_holes(start: usize, end: usize, reserved: &[Option<(usize, usize)>; MAX_RESERVED]) {
    if start >= end {
        return;
    }
    match overlaps_any(start, end, reserved) {
        None => {
            // SAFETY: `(start, end)` has been confirmed free of every
            // reserved range and lies within RAM `parse()` reported usable.
            unsafe {
                FRAME_ALLOCATOR.0.lock().add_range(start, end);
            }
        }
        Some((res_start, res_end)) => {
            add_range_with_holes(start, res_start.max(start), reserved);
            add_range_with_holes(res_end.min(end), end, reserved);
        }
    }
}

/// Finds a 2MB-aligned, reserved-free home for the page-descriptor
/// array, walking usable RAM the same way the teacher's `init` does.
fn find_mem_map_home(boot_info: &BootInfo, size: usize, reserved: &[Option<(usize, usize)>; MAX_RESERVED]) -> usize {
    const ALIGN: usize = 0x20_0000;
    for region in boot_info.usable_regions() {
        let mut candidate = (region.base + ALIGN - 1) & !(ALIGN - 1);
        loop {
            let candidate_end = candidate + size;
            if candidate_end > region.end {
                break;
            }
            match overlaps_any(candidate, candidate_end, reserved) {
                None => return candidate,
                Some((_, res_end)) => candidate = (res_end + ALIGN - 1) & !(ALIGN - 1),
            }
        }
    }
    panic!("init: no hole large enough for the page-descriptor array");
}

/// Physical memory bring-up: carves the legacy/kernel/heap/mem_map
/// ranges out of the usable RAM `boot_info` reports, then hands every
/// surviving range to [`FRAME_ALLOCATOR`]. Grounded on the teacher's
/// `memory::x86_64::init`.
fn init_memory(boot_info: &BootInfo) {
    // SAFETY: these names resolve to linker-placed symbols, never
    // dereferenced — only their addresses are taken.
    let (kernel_start, kernel_end, heap_start, heap_end) = unsafe {
        (
            &_kernel_start as *const u8 as usize,
            &_kernel_end as *const u8 as usize,
            &__heap_start as *const u8 as usize,
            &__heap_end as *const u8 as usize,
        )
    };

    let mut reserved: [Option<(usize, usize)>; MAX_RESERVED] = [None; MAX_RESERVED];
    let mut reserved_count = 0;
    add_reserved(&mut reserved, &mut reserved_count, 0, LEGACY_RESERVED_END);
    add_reserved(&mut reserved, &mut reserved_count, kernel_start, kernel_end);
    add_reserved(&mut reserved, &mut reserved_count, heap_start, heap_end);

    let phys_min = boot_info
        .usable_regions()
        .map(|region| region.base)
        .min()
        .expect("init: BootInfo reported no usable RAM");
    let phys_max = boot_info.phys_max;

    let total_pages = (phys_max - phys_min) / mmu::PAGE_SIZE;
    let mem_map_size = total_pages * core::mem::size_of::<Page>();
    let mem_map_pa = find_mem_map_home(boot_info, mem_map_size, &reserved);
    add_reserved(&mut reserved, &mut reserved_count, mem_map_pa, mem_map_pa + mem_map_size);

    // SAFETY: `mem_map_pa`/`mem_map_size` describe a hole just reserved
    // above, within RAM `boot_info` reported usable, identity-mapped by
    // `mmu::phys_to_virt` during this early-boot stub phase.
    let mem_map: &'static mut [Page] = unsafe {
        let ptr = mmu::phys_to_virt(mem_map_pa) as *mut Page;
        for i in 0..total_pages {
            ptr.add(i).write(Page::new());
        }
        core::slice::from_raw_parts_mut(ptr, total_pages)
    };

    // SAFETY: called exactly once, before any allocation is requested.
    unsafe {
        FRAME_ALLOCATOR.0.lock().init(mem_map, phys_min);
    }

    for region in boot_info.usable_regions() {
        add_range_with_holes(region.base, region.end, &reserved);
    }

    mmu::set_page_allocator(&FRAME_ALLOCATOR);
    log::info!(
        "memory: {} usable range(s), phys {:#x}..{:#x}, mem_map at {:#x} ({} pages)",
        boot_info.region_count,
        phys_min,
        phys_max,
        mem_map_pa,
        total_pages
    );
}

/// Kernel heap bring-up from the linker-provided `__heap_start`/
/// `__heap_end` symbols. Mirrors the teacher's `arch::x86_64::boot::init_heap`.
fn init_heap() {
    // SAFETY: called exactly once, before the first allocation; only the
    // symbols' addresses are taken.
    unsafe {
        let heap_start = &__heap_start as *const u8 as usize;
        let heap_end = &__heap_end as *const u8 as usize;
        kernel_hal::heap::init(heap_start, heap_end - heap_start);
        log::info!("heap: {:#x}..{:#x} ({} KiB)", heap_start, heap_end, (heap_end - heap_start) / 1024);
    }
}

/// A monotonic [`HardwareClock`] driven by the PIT's 100Hz tick, the
/// only timer this boot path programs. There is no HPET/TSC calibration
/// here — that would need ACPI tables this kernel does not parse.
struct PitClock {
    ticks: AtomicU64,
}

impl PitClock {
    const fn new() -> Self {
        Self { ticks: AtomicU64::new(0) }
    }

    /// Nanoseconds per PIT tick at the 100Hz rate `kernel_hal::arch::init`
    /// programs the PIT to.
    const NS_PER_TICK: u64 = 10_000_000;

    fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }
}

impl HardwareClock for PitClock {
    fn now_ns(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed) * Self::NS_PER_TICK
    }
}

static PIT_CLOCK: PitClock = PitClock::new();

/// The PIT's IRQ0/vector-32 handler: advances the hardware clock and
/// drives the scheduler's sleep-queue wakeups. Registered directly
/// through `apic::register_handler` rather than the generic
/// `InterruptController`/`IrqId` path, following the teacher's own
/// x86_64-specific precedent (see `kernel::smp`).
struct TickHandler;

impl InterruptHandler for TickHandler {
    fn handle(&self, _irq: u32) {
        PIT_CLOCK.tick();
        scheduler::tick(crate::time::now_ns());
        APIC.signal_eoi();
    }
}

static TICK_HANDLER: TickHandler = TickHandler;

/// The PIT timer interrupt vector `kernel_hal::arch::init`'s IOAPIC
/// routing delivers IRQ0 on.
const TIMER_VECTOR: u8 = 32;

/// Per-CPU `SYSCALL`/`SYSRET` scratch state. A single static suffices:
/// this kernel only brings up the bootstrap processor (no AP startup
/// path exists in this scope).
static mut SYSCALL_CPU_STATE: SyscallCpuState = SyscallCpuState::new();

/// Programs the `SYSCALL`/`SYSRET` MSRs to vector into
/// [`crate::syscall::entry_trampoline`].
fn init_syscall() {
    // SAFETY: called once, with a `'static` state block no other code
    // touches before this point.
    unsafe {
        let cpu_state = &mut *core::ptr::addr_of_mut!(SYSCALL_CPU_STATE);
        syscall::init(cpu_state, crate::syscall::entry_trampoline);
    }
}

/// A directory `InodeOps` vtable with every method left at its trait
/// default (`NotSupported`). Sufficient for a purely in-memory boot-time
/// tree: `fs::vfs::path::lookup` checks the dentry cache before ever
/// falling back to `InodeOps::lookup`, so every path component added as
/// a child dentry here resolves without a real directory implementation.
struct StaticDirOps;
impl InodeOps for StaticDirOps {}

static STATIC_DIR_OPS: StaticDirOps = StaticDirOps;

/// Never-constructed `Superblock` stand-in: these inodes back a purely
/// in-memory tree with no filesystem instance of its own, so every
/// inode's `sb` backlink is a permanently-empty `Weak`.
struct StaticSb;
impl Superblock for StaticSb {
    fn root_inode(&self) -> Arc<Inode> {
        unreachable!("StaticSb is never mounted")
    }
    fn fs_type_name(&self) -> &'static str {
        "staticfs"
    }
}

static NEXT_STATIC_INO: core::sync::atomic::AtomicU64 = core::sync::atomic::AtomicU64::new(1);

fn make_dir_inode() -> Arc<Inode> {
    let ino = NEXT_STATIC_INO.fetch_add(1, Ordering::Relaxed);
    Arc::new(Inode::new(
        ino,
        0,
        InodeType::Directory,
        0o755,
        &STATIC_DIR_OPS,
        Weak::<StaticSb>::new(),
        Box::new(()),
    ))
}

/// Builds the minimal root filesystem this kernel boots with: a root
/// directory and a `/proc` mountpoint, both purely in-memory (there is
/// no on-disk root filesystem driver brought up in this boot path —
/// `fs::ext4` mounts a real device only once userspace asks for one).
fn init_root_filesystem() -> Arc<Dentry> {
    let root_inode = make_dir_inode();
    let root = Dentry::root(root_inode);

    let proc_inode = make_dir_inode();
    let proc_dentry = Arc::new(Dentry::new(String::from("proc"), Some(Arc::downgrade(&root)), Some(proc_inode)));
    root.add_child(proc_dentry.clone());

    crate::fs::install_root(root.clone());
    crate::fs::mount_procfs(proc_dentry, Arc::new(crate::task::ProcessTableSource))
        .expect("init: mounting /proc failed");

    root
}

/// Builds PID 1: a root-credentialed process with its own address
/// space, namespace root and a single bootstrap thread, then places
/// that thread on this CPU's run queue and switches into it.
fn spawn_init_process(root: Arc<Dentry>) {
    let mapper = Arc::new(PageTable::new());
    let address_space = Arc::new(AddressSpace::new(mapper, pid::INIT_PID as u64));

    let process = Process::new(
        pid::INIT_PID,
        pid::KERNEL_PID,
        String::from("init"),
        address_space,
        FdTable::new(),
        Some(root),
        Credentials::root(),
        Arc::new(ResourceLimits::new_default()),
        Some(Namespaces::root()),
    );
    process.set_state(crate::task::process::ProcessState::Running);

    let thread = Thread::new(Arc::downgrade(&process), crate::task::thread::DEFAULT_PRIORITY, ThreadContext::default());
    process.add_thread(thread.clone());
    crate::task::register_process(process);

    scheduler::spawn(thread);

    // The bootstrap thread was just placed on this CPU's queue (it is
    // the only thread in the system, so `least_loaded` always picks
    // this one); pop it back off and make it current. This is the
    // scheduler's no-op bootstrap path — there is no prior context on
    // this CPU to save.
    let next = scheduler::local().pick_next().expect("init: bootstrap thread vanished from its own run queue");
    scheduler::switch_to(next);
}

/// Finishes the handoff from `kmain`: brings up physical memory, the
/// heap, the syscall MSRs, the TLB shootdown handler and the timer
/// tick, mounts a minimal root filesystem, spawns PID 1, and falls into
/// the idle loop — there is no ELF loader in this scope to hand off to,
/// so PID 1 and CPU 0's idle path are the same bootstrap thread.
pub fn run(boot_info: BootInfo) -> ! {
    log::info!("booting: cmdline {:?}", boot_info.cmdline);

    init_memory(&boot_info);
    init_heap();
    init_syscall();
    crate::smp::init();
    crate::time::install_hardware_clock(&PIT_CLOCK);
    kernel_hal::x86_64::apic::register_handler(TIMER_VECTOR, &TICK_HANDLER);

    let root = init_root_filesystem();
    spawn_init_process(root);

    // SAFETY: every subsystem the tick/syscall/shootdown handlers touch
    // has been initialized above.
    unsafe {
        kernel_hal::x86_64::interrupts::enable();
    }

    loop {
        // SAFETY: waits for the next interrupt; the scheduler's tick
        // handler and any future preemption path resume execution here.
        unsafe {
            core::arch::asm!("hlt");
        }
    }
}
