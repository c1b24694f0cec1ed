//! Kernel-to-kernel context switch: saves the callee-saved register
//! set plus the segment selectors a resumed thread's eventual IRET/
//! SYSRET frame needs, then restores the incoming thread's and jumps
//! into it. Grounded on the teacher's `arch::x86_64::task::cpu_switch_to`
//! `global_asm!` block, with the field offsets retargeted to this
//! struct's layout and the teacher's FPU-save/TLS-MSR steps dropped —
//! those belong to the user-mode entry trampoline, not an intra-kernel
//! switch, and this crate builds that separately where needed.

use core::arch::global_asm;

/// Saved register set for one thread, swapped in and out on every
/// [`switch_context`] call. Field order is load-bearing: the
/// `global_asm!` block below indexes into it by byte offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuContext {
    pub rip: u64,
    pub rsp: u64,
    pub rflags: u64,
    pub rbp: u64,
    pub rbx: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub cs: u16,
    pub ss: u16,
    pub fs: u16,
    pub gs: u16,
}

unsafe extern "C" {
    /// Saves the caller's callee-saved registers into `*old`, restores
    /// them from `*new`, and resumes execution at `new.rip`. Returns to
    /// the original caller once some other thread switches back into
    /// `old`.
    ///
    /// # Safety
    /// `old` and `new` must each point to a valid, unaliased
    /// [`CpuContext`]. The caller must already have interrupts disabled
    /// (the scheduler's contract — spec.md §5 "context switch").
    pub fn switch_context(old: *mut CpuContext, new: *const CpuContext);
}

global_asm!(
    ".global switch_context",
    "switch_context:",
    "mov [rdi + 32], rbx",
    "mov [rdi + 40], r12",
    "mov [rdi + 48], r13",
    "mov [rdi + 56], r14",
    "mov [rdi + 64], r15",
    "mov [rdi + 24], rbp",
    "pushfq",
    "pop rax",
    "mov [rdi + 16], rax",
    "mov [rdi + 8], rsp",
    "lea rax, [rip + 1f]",
    "mov [rdi + 0], rax",
    "mov rbx, [rsi + 32]",
    "mov r12, [rsi + 40]",
    "mov r13, [rsi + 48]",
    "mov r14, [rsi + 56]",
    "mov r15, [rsi + 64]",
    "mov rbp, [rsi + 24]",
    "mov rax, [rsi + 16]",
    "push rax",
    "popfq",
    "mov rsp, [rsi + 8]",
    "mov rax, [rsi + 0]",
    "jmp rax",
    "1:",
    "ret",
);

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn field_offsets_match_the_asm_block() {
        assert_eq!(core::mem::offset_of!(CpuContext, rip), 0);
        assert_eq!(core::mem::offset_of!(CpuContext, rsp), 8);
        assert_eq!(core::mem::offset_of!(CpuContext, rflags), 16);
        assert_eq!(core::mem::offset_of!(CpuContext, rbp), 24);
        assert_eq!(core::mem::offset_of!(CpuContext, rbx), 32);
        assert_eq!(core::mem::offset_of!(CpuContext, r12), 40);
        assert_eq!(core::mem::offset_of!(CpuContext, r13), 48);
        assert_eq!(core::mem::offset_of!(CpuContext, r14), 56);
        assert_eq!(core::mem::offset_of!(CpuContext, r15), 64);
    }
}
