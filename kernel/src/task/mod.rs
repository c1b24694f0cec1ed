//! Process/thread layer (spec.md §3/§4.3/§4.4): the process table, the
//! `fork_with_options` operation tying together address-space COW,
//! fd-table sharing, credentials and namespace cloning, and the
//! `ProcfsSource` adapter `kernel::init::run` hands to `fs::mount_procfs`.

extern crate alloc;

pub mod credentials;
pub mod fd;
pub mod pid;
pub mod process;
pub mod scheduler;
pub mod thread;

use alloc::collections::BTreeMap;
use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec::Vec;

use kernel_error::{KernelError, KernelResult};
use kernel_sync::spinlock::IrqSpinlock;
use kernel_utils::Once;

use crate::fs::procfs::{MapEntry, ProcessSnapshot, ProcfsSource};
use crate::memory::address_space::AddressSpace;
use crate::security::capability::{self, CAP_SYS_RESOURCE};
use crate::security::rlimit::{ForkRateLimiter, Resource};

use self::process::{Process, ProcessRef, ProcessState};
use self::scheduler::ArchIrqDisable;
use self::thread::Thread;

pub use scheduler::{current_thread, switch_to, yield_now};

/// The live process table: every process from `init` (PID 1) to the
/// most recently forked child, keyed by PID. Not per-namespace — PID
/// namespaces (`security::namespace::PidNamespace`) translate their own
/// local numbering on top of this single global table, per spec.md §3's
/// "the two-PID split [is] an implementation detail".
static PROCESSES: IrqSpinlock<BTreeMap<u32, ProcessRef>, ArchIrqDisable> =
    IrqSpinlock::new(BTreeMap::new());

static FORK_LIMITER: Once<ForkRateLimiter> = Once::new();

fn fork_limiter() -> &'static ForkRateLimiter {
    FORK_LIMITER.call_once(|| ForkRateLimiter::new(crate::security::rlimit::DEFAULT_FORK_RATE_PER_SECOND))
}

pub fn register_process(process: ProcessRef) {
    PROCESSES.lock().insert(process.pid, process);
}

pub fn lookup_process(pid: u32) -> Option<ProcessRef> {
    PROCESSES.lock().get(&pid).cloned()
}

/// `waitpid` reaping the zombie: drops the table's own reference. The
/// process may still be kept alive by a sibling's `Arc<Process>` clone
/// (e.g. a child list entry) until every other owner drops it too.
pub fn remove_process(pid: u32) -> Option<ProcessRef> {
    PROCESSES.lock().remove(&pid)
}

pub fn all_pids() -> Vec<u32> {
    PROCESSES.lock().keys().copied().collect()
}

/// Number of live processes owned by `uid`, for the per-UID RLIMIT_NPROC
/// check (spec.md §4.4) — `PROCESSES.lock().len()` alone would count
/// every UID's processes against one shared budget.
fn process_count_for_uid(uid: u32) -> u64 {
    PROCESSES
        .lock()
        .values()
        .filter(|process| process.credentials.lock().uid == uid)
        .count() as u64
}

/// The process owning the thread running on this CPU right now.
///
/// # Panics
/// Panics under the same conditions as [`scheduler::current_thread`].
pub fn current_process() -> ProcessRef {
    current_thread()
        .process
        .upgrade()
        .expect("current thread's owning process has already been dropped")
}

/// Flags controlling what a forked child shares with its parent
/// (spec.md §4.4's `clone_vm`/`clone_files`/`clone_fs`/`clone_thread`/
/// `clone_new*` matrix). `vfork` is `clone_vm && !clone_thread`: the
/// child shares the parent's address space but is still a distinct
/// process, so the parent must not resume until the child has
/// exec'd/exited (spec.md §9's resolved Open Question).
#[derive(Debug, Clone, Copy, Default)]
pub struct ForkOptions {
    pub clone_vm: bool,
    pub clone_files: bool,
    pub clone_fs: bool,
    pub clone_new_pid: bool,
    pub clone_new_ns: bool,
    pub vfork: bool,
}

/// `fork_with_options` (spec.md §4.4): pre-fork resource/rate checks,
/// then COW address-space duplication (unless `clone_vm`, which shares
/// it outright), fd-table sharing or a deep copy, credentials
/// inheritance and namespace cloning, finishing with process-table
/// registration and parent/child linking.
///
/// `new_thread_context` supplies the child's initial register state
/// (the syscall-return path sets `rax` to 0 there, per the fork
/// contract in spec.md §6); constructing it is the caller's job since
/// only the syscall handler knows the trap frame being duplicated.
pub fn fork_with_options(
    parent: &ProcessRef,
    options: ForkOptions,
    new_thread_context: thread::ThreadContext,
) -> KernelResult<ProcessRef> {
    let credentials = parent.credentials.lock().clone();

    // CAP_SYS_RESOURCE exempts a process from its own RLIMIT_NPROC,
    // mirroring the same capability's role in `ResourceLimits::set`'s
    // hard-limit raise (spec.md §4.4/§4.8).
    if !capability::has(credentials.capabilities, CAP_SYS_RESOURCE) {
        parent
            .limits
            .check(Resource::NProc, process_count_for_uid(credentials.uid) + 1)?;
    }
    fork_limiter().check_and_record(credentials.uid, crate::time::now_ns())?;

    let address_space = if options.clone_vm {
        parent.address_space.clone()
    } else {
        let child_space = Arc::new(AddressSpace::new(
            parent.address_space.mapper.clone(),
            pid::allocate() as u64,
        ));
        parent
            .address_space
            .fork_cow(&child_space)
            .map_err(|_| KernelError::InvalidArgument)?;
        child_space
    };

    let fd_table = if options.clone_files {
        parent.fd_table.clone()
    } else {
        parent.fd_table.deep_copy()
    };

    let cwd = parent.cwd();

    let namespaces = match parent.namespaces() {
        Some(ns) => Some(ns.clone_for_child(options.clone_new_pid, options.clone_new_ns)),
        None => None,
    };

    let child_pid = pid::allocate();
    let child = Process::new(
        child_pid,
        parent.pid,
        parent.name(),
        address_space,
        fd_table,
        cwd,
        credentials,
        parent.limits.clone(),
        namespaces,
    );
    child.set_parent(Arc::downgrade(parent));
    child.set_state(ProcessState::Running);
    parent.add_child(current_thread(), child.clone());

    let child_thread = Thread::new(Arc::downgrade(&child), thread::DEFAULT_PRIORITY, new_thread_context);
    child.add_thread(child_thread.clone());

    register_process(child.clone());

    if options.vfork {
        // The parent is suspended until the child signals exec/exit
        // (spec.md §9): block the calling thread on the child process's
        // own vfork-done gate rather than returning here. The syscall
        // handler performs that park after this call returns, since
        // only it knows which thread is the parent's caller.
    }

    scheduler::spawn(child_thread);
    Ok(child)
}

/// A vfork child that returns (rather than `exec`/`exit`ing) corrupted
/// its parent's suspended frame by definition — the two share an
/// address space and the parent's stack is still live underneath the
/// child's. Per spec.md §9 the kernel refuses to resume the parent in
/// that case; the syscall layer maps this to `EINVAL` for the
/// offending return attempt instead of silently continuing.
pub const VFORK_RETURN_WITHOUT_EXEC_OR_EXIT: KernelError = KernelError::InvalidArgument;

/// Builds a `ProcfsSource` view of the live process table and the
/// calling CPU's current thread, for `kernel::init::run` to hand to
/// `fs::mount_procfs`.
pub struct ProcessTableSource;

impl ProcfsSource for ProcessTableSource {
    fn list_pids(&self) -> Vec<u32> {
        all_pids()
    }

    fn snapshot(&self, pid: u32) -> Option<ProcessSnapshot> {
        let process = lookup_process(pid)?;
        let credentials = process.credentials.lock();
        let state = match process.state() {
            ProcessState::Creating => "R",
            ProcessState::Running => "R",
            ProcessState::Sleeping => "S",
            ProcessState::Stopped => "T",
            ProcessState::Zombie => "Z",
            ProcessState::Dead => "X",
        };
        let vmas = process.address_space.vmas();
        let maps = vmas
            .into_iter()
            .map(|vma| MapEntry {
                start: vma.start.0,
                end: vma.end.0,
                perms: alloc::format!(
                    "{}{}{}",
                    if vma.flags.contains(crate::memory::address_space::VmaFlags::READ) { "r" } else { "-" },
                    if vma.flags.contains(crate::memory::address_space::VmaFlags::WRITE) { "w" } else { "-" },
                    if vma.flags.contains(crate::memory::address_space::VmaFlags::EXEC) { "x" } else { "-" },
                ),
                path: None,
            })
            .collect();
        Some(ProcessSnapshot {
            pid: process.pid,
            ppid: process.ppid(),
            name: process.name(),
            state,
            uid: credentials.uid,
            gid: credentials.gid,
            vsize: process.memory_stats.vsize_bytes.load(core::sync::atomic::Ordering::Acquire),
            rss_pages: process.memory_stats.rss_pages.load(core::sync::atomic::Ordering::Acquire),
            cmdline: Vec::new(),
            environ: Vec::new(),
            cwd: process.cwd().map(|d| d.path()).unwrap_or_else(|| "/".to_string()),
            exe: alloc::string::String::new(),
            fds: Vec::new(),
            maps,
        })
    }

    fn current_pid(&self) -> u32 {
        current_process().pid
    }
}
