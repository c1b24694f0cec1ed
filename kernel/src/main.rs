//! Kernel entry point.
//!
//! The bootloader (Multiboot2-compliant) jumps here with the magic value in
//! `eax` and the boot-info pointer in `ebx`, per the 32-bit Multiboot2
//! handoff convention; the assembly trampoline (not part of this crate,
//! see spec's boot boundary) transitions to long mode and calls
//! [`kmain`] with those two values widened to 64 bits.
#![no_std]
#![no_main]

extern crate alloc;

use core::panic::PanicInfo;
use kernel_hal::println;

/// Entry point called after the assembly trampoline has entered long mode
/// and built an identity-mapped root page table.
///
/// # Safety
/// Must be called exactly once, with `mb2_info` pointing at a valid
/// Multiboot2 information structure and interrupts disabled.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn kmain(mb2_magic: u32, mb2_info: usize) -> ! {
    if mb2_magic != kernel_hal::arch::multiboot2::MULTIBOOT2_BOOTLOADER_MAGIC {
        // No console yet; nothing to do but halt.
        loop {
            core::hint::spin_loop();
        }
    }

    kernel_hal::arch::init();
    kernel::logger::init(if cfg!(feature = "verbose") {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Info
    });

    // SAFETY: mb2_info was validated against the magic above and is handed
    // to us once, before any other code touches it.
    let boot_info = unsafe { kernel::boot::parse(mb2_info) };
    kernel::init::run(boot_info)
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    println!("KERNEL PANIC: {}", info);
    loop {
        unsafe { core::arch::asm!("cli", "hlt") };
    }
}
