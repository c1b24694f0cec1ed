//! Filesystem layer (C10–C13): the VFS quartet, the blocking pipe, the
//! `/proc` synthetic filesystem, and the read-only ext4 backend.

pub mod ext4;
pub mod mode;
pub mod pipe;
pub mod procfs;
pub mod vfs;

extern crate alloc;

use alloc::sync::Arc;

use kernel_utils::Once;

use vfs::Vfs;

static VFS: Once<Vfs> = Once::new();

/// Installs the root filesystem's dentry as the VFS root. Called once
/// from `kernel::init` after the ext4 superblock (or, failing that, a
/// minimal in-memory root) has been mounted.
pub fn install_root(root: vfs::dentry::DentryRef) -> &'static Vfs {
    VFS.call_once(|| Vfs::new(root))
}

/// The process-wide VFS, valid once [`install_root`] has run.
pub fn vfs() -> &'static Vfs {
    VFS.get().expect("fs::install_root was not called before fs::vfs()")
}

/// Mounts `/proc` at the given dentry once the process table exists.
pub fn mount_procfs(
    target: vfs::dentry::DentryRef,
    source: Arc<dyn procfs::ProcfsSource>,
) -> vfs::error::VfsResult<()> {
    let sb: Arc<dyn vfs::superblock::Superblock> = procfs::ProcFs::new(source);
    vfs().mount(target, sb)
}
