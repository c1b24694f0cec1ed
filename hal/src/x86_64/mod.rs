// TEAM_259: x86_64 HAL module structure.

pub mod serial;
pub mod console;
pub mod gdt;
pub mod idt;
pub mod exceptions;
pub mod interrupts;
pub mod apic;
pub mod context;
pub mod ioapic;
pub mod pit;
pub mod mmu;
pub mod paging;
pub mod multiboot2;
pub mod frame_alloc;
pub mod syscall;

pub fn init() {
    // 1. Initialize serial for early logging
    unsafe { console::WRITER.lock().init() };

    // 2. Initialize GDT/TSS, IDT and exceptions
    unsafe { gdt::init() };
    idt::init();
    exceptions::init();

    // 3. Initialize APIC and IOAPIC
    apic::APIC.init();
    ioapic::IOAPIC.init();

    // 4. Initialize PIT
    pit::Pit::init(100); // 100Hz
}
