//! Boot handoff: turns the Multiboot2 info structure into the [`BootInfo`]
//! the rest of the kernel consumes.

use kernel_hal::arch::multiboot2;

/// Maximum number of memory regions carried past early boot.
pub const MAX_MEMORY_REGIONS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    Usable,
    Reserved,
    AcpiReclaimable,
    Nvs,
    BadMemory,
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryRegion {
    pub base: usize,
    pub end: usize,
    pub kind: MemoryKind,
}

impl MemoryRegion {
    pub const fn size(&self) -> usize {
        self.end - self.base
    }
}

/// Unified boot information, independent of the Multiboot2 wire format.
pub struct BootInfo {
    pub regions: [Option<MemoryRegion>; MAX_MEMORY_REGIONS],
    pub region_count: usize,
    pub total_usable: usize,
    pub phys_max: usize,
    pub cmdline: &'static str,
    pub rsdp: Option<usize>,
}

impl BootInfo {
    pub fn usable_regions(&self) -> impl Iterator<Item = &MemoryRegion> {
        self.regions[..self.region_count].iter().filter_map(|r| r.as_ref())
    }
}

/// Parse the Multiboot2 info structure at `info_addr` into a [`BootInfo`].
///
/// # Safety
/// `info_addr` must point at a valid Multiboot2 information structure that
/// has not yet been reclaimed, and this must be called at most once.
pub unsafe fn parse(info_addr: usize) -> BootInfo {
    // SAFETY: forwarded from the caller's contract.
    let parsed = unsafe { multiboot2::parse(info_addr) };

    let mut regions = [None; MAX_MEMORY_REGIONS];
    for (i, region) in parsed.ram_regions.iter().flatten().enumerate().take(MAX_MEMORY_REGIONS) {
        regions[i] = Some(MemoryRegion {
            base: region.start,
            end: region.end,
            kind: MemoryKind::Usable,
        });
    }

    // The cmdline buffer is copied into the ParsedBootInfo itself, so we
    // can safely leak a 'static view onto it by storing it in a static.
    static mut CMDLINE_STORAGE: [u8; multiboot2::CMDLINE_MAX] = [0; multiboot2::CMDLINE_MAX];
    // SAFETY: single-threaded early boot, called once.
    let cmdline: &'static str = unsafe {
        let len = parsed.cmdline_len.min(multiboot2::CMDLINE_MAX);
        let dst = core::ptr::addr_of_mut!(CMDLINE_STORAGE);
        (*dst)[..len].copy_from_slice(&parsed.cmdline[..len]);
        core::str::from_utf8_unchecked(&(*dst)[..len])
    };

    BootInfo {
        regions,
        region_count: parsed.ram_count,
        total_usable: parsed.total_ram,
        phys_max: parsed.phys_max,
        cmdline,
        rsdp: parsed.rsdp,
    }
}
