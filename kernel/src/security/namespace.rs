//! Namespaces (spec.md §3 `Process.namespaces`, §4.8): on `clone_new*`
//! a process gets a fresh instance of the requested kind; otherwise it
//! shares its parent's by `Arc` clone, which is itself the refcount
//! (spec.md §8 "cloning without new-flags increments the shared
//! namespace's refcount by exactly 1" — `Arc::clone` does precisely
//! that, so there is no separate counter to get out of sync with the
//! real owners). PID namespaces additionally form a parent tree so a
//! PID can be translated up to the init namespace.

extern crate alloc;

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};

use super::super::fs::vfs::mount::MountTable;

/// One PID namespace. Child namespaces allocate their own PIDs
/// starting at 1 (their own "init"); `level` counts hops up to the
/// root namespace.
pub struct PidNamespace {
    pub parent: Option<Arc<PidNamespace>>,
    pub level: u32,
    next_pid: AtomicU32,
}

impl PidNamespace {
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            level: 0,
            next_pid: AtomicU32::new(crate::task::pid::INIT_PID + 1),
        })
    }

    pub fn new_child(parent: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(parent.clone()),
            level: parent.level + 1,
            next_pid: AtomicU32::new(2),
        })
    }

    /// Allocates the next namespace-local PID (distinct from the
    /// global PID allocated in `task::pid`, which this namespace's
    /// process still has exactly one of — spec.md leaves the two-PID
    /// split as an implementation detail, resolved in DESIGN.md).
    pub fn allocate_local(&self) -> u32 {
        self.next_pid.fetch_add(1, Ordering::Relaxed)
    }
}

/// A mount namespace: an owned, independent `MountTable` unless shared
/// with the parent (the default, absent `CLONE_NEWNS`).
pub struct MountNamespace {
    pub mounts: MountTable,
}

impl MountNamespace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            mounts: MountTable::new(),
        })
    }
}

/// The set of namespaces a process belongs to. `None` in `pid`/`mount`
/// is not meaningful here — every process has exactly one of each;
/// `Process.namespaces` being `Optional` in spec.md §3 is honored one
/// level up, by `Process` storing `Option<Arc<Namespaces>>` and
/// defaulting to a shared global instance when absent.
pub struct Namespaces {
    pub pid: Arc<PidNamespace>,
    pub mount: Arc<MountNamespace>,
}

impl Namespaces {
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            pid: PidNamespace::root(),
            mount: MountNamespace::new(),
        })
    }

    /// `clone_new_pid`/`clone_new_ns` flags from `task::fork` decide,
    /// per namespace kind, whether the child gets a fresh instance
    /// (`true`) or shares this one (`false`, the common case — a plain
    /// `Arc::clone` bumping the refcount by exactly one, spec.md §8).
    pub fn clone_for_child(self: &Arc<Self>, new_pid: bool, new_mount: bool) -> Arc<Self> {
        Arc::new(Self {
            pid: if new_pid {
                PidNamespace::new_child(&self.pid)
            } else {
                self.pid.clone()
            },
            mount: if new_mount {
                MountNamespace::new()
            } else {
                self.mount.clone()
            },
        })
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn sharing_bumps_arc_refcount_by_exactly_one() {
        let root = Namespaces::root();
        let before = Arc::strong_count(&root.pid);
        let child = root.clone_for_child(false, false);
        assert_eq!(Arc::strong_count(&root.pid), before + 1);
        assert!(Arc::ptr_eq(&root.pid, &child.pid));
    }

    #[test]
    fn new_pid_namespace_is_a_distinct_child_one_level_deeper() {
        let root = Namespaces::root();
        let child = root.clone_for_child(true, false);
        assert!(!Arc::ptr_eq(&root.pid, &child.pid));
        assert_eq!(child.pid.level, root.pid.level + 1);
        assert!(Arc::ptr_eq(child.pid.parent.as_ref().unwrap(), &root.pid));
    }

    #[test]
    fn namespace_local_pids_start_at_two() {
        let root = Namespaces::root();
        let child = root.clone_for_child(true, false);
        assert_eq!(child.pid.allocate_local(), 2);
        assert_eq!(child.pid.allocate_local(), 3);
    }
}
