//! Dentry cache: directory-entry nodes bound to names, forming a tree
//! that mirrors the directory hierarchy. Grounded on the teacher's
//! `fs::vfs::dentry::Dentry`, trimmed to the fixed-size name (≤255
//! bytes per spec.md §3) and made to validate its parent back-reference
//! under the parent's own lock before traversal, per spec.md §9's
//! "cyclic graphs" note.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::{Arc, Weak};

use kernel_sync::spinlock::Spinlock;

use super::error::{VfsError, VfsResult};
use super::inode::Inode;
use super::superblock::Superblock;

pub const MAX_NAME_LEN: usize = 255;

pub type DentryRef = Arc<Dentry>;
pub type WeakDentryRef = Weak<Dentry>;

pub struct Dentry {
    name: Spinlock<String>,
    /// Raw back-reference; must only be traversed while the parent's
    /// own refcount keeps it alive (spec.md §9).
    parent: Spinlock<Option<WeakDentryRef>>,
    inode: Spinlock<Option<Arc<Inode>>>,
    children: Spinlock<BTreeMap<String, DentryRef>>,
    mounted: Spinlock<Option<Arc<dyn Superblock>>>,
}

// SAFETY: every field is internally locked.
unsafe impl Send for Dentry {}
unsafe impl Sync for Dentry {}

impl Dentry {
    pub fn new(name: String, parent: Option<WeakDentryRef>, inode: Option<Arc<Inode>>) -> Self {
        debug_assert!(name.len() <= MAX_NAME_LEN);
        Self {
            name: Spinlock::new(name),
            parent: Spinlock::new(parent),
            inode: Spinlock::new(inode),
            children: Spinlock::new(BTreeMap::new()),
            mounted: Spinlock::new(None),
        }
    }

    pub fn root(inode: Arc<Inode>) -> DentryRef {
        Arc::new(Self::new(String::from("/"), None, Some(inode)))
    }

    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    pub fn parent(&self) -> Option<DentryRef> {
        self.parent.lock().as_ref().and_then(Weak::upgrade)
    }

    /// `inode == None` marks a negative entry (invariant: a mount point
    /// is never the final resolution — see [`Self::get_inode`]).
    pub fn is_negative(&self) -> bool {
        self.inode.lock().is_none()
    }

    pub fn is_mountpoint(&self) -> bool {
        self.mounted.lock().is_some()
    }

    /// The inode this dentry resolves to, following a mount if one is
    /// installed here — a mount-point dentry is never returned as the
    /// final resolution of a lookup if there is a mount atop it.
    pub fn get_inode(&self) -> Option<Arc<Inode>> {
        if let Some(sb) = self.mounted.lock().as_ref() {
            return Some(sb.root_inode());
        }
        self.inode.lock().clone()
    }

    pub fn set_inode(&self, inode: Arc<Inode>) {
        *self.inode.lock() = Some(inode);
    }

    pub fn clear_inode(&self) {
        *self.inode.lock() = None;
    }

    pub fn lookup_child(&self, name: &str) -> Option<DentryRef> {
        self.children.lock().get(name).cloned()
    }

    pub fn add_child(self: &Arc<Self>, child: DentryRef) {
        let name = child.name();
        self.children.lock().insert(name, child);
    }

    /// Remove `name` from this dentry's children. If that drops the
    /// child's only strong reference, it is unlinked entirely
    /// (invariant (i): every non-root dentry has exactly one parent).
    pub fn remove_child(&self, name: &str) -> Option<DentryRef> {
        self.children.lock().remove(name)
    }

    pub fn mount(&self, sb: Arc<dyn Superblock>) {
        *self.mounted.lock() = Some(sb);
    }

    pub fn unmount(&self) -> Option<Arc<dyn Superblock>> {
        self.mounted.lock().take()
    }

    pub fn path(self: &Arc<Self>) -> String {
        let mut components = alloc::vec::Vec::new();
        let mut current = self.clone();
        loop {
            let name = current.name();
            let parent = current.parent();
            match parent {
                Some(p) => {
                    components.push(name);
                    current = p;
                }
                None => break,
            }
        }
        components.reverse();
        if components.is_empty() {
            String::from("/")
        } else {
            let mut path = String::new();
            for c in components {
                path.push('/');
                path.push_str(&c);
            }
            path
        }
    }
}

impl core::fmt::Debug for Dentry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dentry")
            .field("name", &self.name())
            .field("is_negative", &self.is_negative())
            .field("is_mountpoint", &self.is_mountpoint())
            .finish()
    }
}

/// Per-superblock dentry allocator: dentries are owned by the
/// superblock's allocator (spec.md §4.6) so a superblock teardown can
/// free its whole tree at once.
pub struct DentryCache {
    root: Spinlock<Option<DentryRef>>,
}

impl DentryCache {
    pub const fn new() -> Self {
        Self {
            root: Spinlock::new(None),
        }
    }

    pub fn set_root(&self, dentry: DentryRef) {
        *self.root.lock() = Some(dentry);
    }

    pub fn root(&self) -> VfsResult<DentryRef> {
        self.root.lock().clone().ok_or(VfsError::NoSuchEntry)
    }
}

impl Default for DentryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::fs::vfs::inode::{Inode, InodeType};
    use crate::fs::vfs::superblock::Superblock;
    use alloc::boxed::Box;

    struct NullOps;
    impl super::super::ops::InodeOps for NullOps {}
    static NULL_OPS: NullOps = NullOps;

    struct NullSb;
    impl Superblock for NullSb {
        fn root_inode(&self) -> Arc<Inode> {
            unreachable!()
        }
        fn fs_type_name(&self) -> &'static str {
            "null"
        }
    }

    fn inode(ino: u64) -> Arc<Inode> {
        Arc::new(Inode::new(
            ino,
            0,
            InodeType::Directory,
            0o755,
            &NULL_OPS,
            Weak::<NullSb>::new(),
            Box::new(()),
        ))
    }

    #[test]
    fn dentry_tree_parent_child_roundtrip() {
        let root = Dentry::root(inode(1));
        let child = Arc::new(Dentry::new(
            String::from("etc"),
            Some(Arc::downgrade(&root)),
            Some(inode(2)),
        ));
        root.add_child(child.clone());
        assert!(Arc::ptr_eq(&root.lookup_child("etc").unwrap(), &child));
        assert_eq!(child.path(), "/etc");
        assert!(Arc::ptr_eq(&child.parent().unwrap(), &root));
    }

    #[test]
    fn negative_dentry_has_no_inode() {
        let d = Dentry::new(String::from("ghost"), None, None);
        assert!(d.is_negative());
    }

    #[test]
    fn remove_child_drops_from_parent() {
        let root = Dentry::root(inode(1));
        let child = Arc::new(Dentry::new(String::from("tmp"), Some(Arc::downgrade(&root)), Some(inode(3))));
        root.add_child(child);
        assert!(root.lookup_child("tmp").is_some());
        root.remove_child("tmp");
        assert!(root.lookup_child("tmp").is_none());
    }
}
