//! The VFS converges on the crate-wide [`kernel_error::KernelError`]
//! rather than carrying its own error enum, per §7's "every failure is
//! surfaced as a negative errno" policy — one table instead of one per
//! subsystem plus a translation layer.

pub use kernel_error::KernelError as VfsError;
pub type VfsResult<T> = Result<T, VfsError>;
