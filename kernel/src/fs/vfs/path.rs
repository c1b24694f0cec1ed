//! Iterative, `/`-separated path lookup (§4.6): `.` is skipped, `..`
//! moves to parent but never above root, and symlinks are resolved
//! under a recursion budget (40, per spec.md §9's adopted default)
//! when the caller asks to follow them.

extern crate alloc;

use alloc::string::String;
use alloc::sync::Arc;

use super::dentry::DentryRef;
use super::error::{VfsError, VfsResult};

/// Linux convention, adopted per spec.md §9 open question.
pub const SYMLINK_RECURSION_LIMIT: u32 = 40;

pub struct LookupFlags {
    pub follow_symlinks: bool,
}

impl Default for LookupFlags {
    fn default() -> Self {
        Self {
            follow_symlinks: true,
        }
    }
}

/// Resolve `path` starting from `root` (absolute) or `cwd` (relative),
/// returning the final dentry.
pub fn lookup(
    root: &DentryRef,
    cwd: &DentryRef,
    path: &str,
    flags: &LookupFlags,
) -> VfsResult<DentryRef> {
    lookup_with_budget(root, cwd, path, flags, SYMLINK_RECURSION_LIMIT)
}

fn lookup_with_budget(
    root: &DentryRef,
    cwd: &DentryRef,
    path: &str,
    flags: &LookupFlags,
    mut symlink_budget: u32,
) -> VfsResult<DentryRef> {
    let mut current = if path.starts_with('/') {
        root.clone()
    } else {
        cwd.clone()
    };

    let components: alloc::vec::Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    let last_index = components.len().checked_sub(1);

    for (index, component) in components.iter().enumerate() {
        if *component == "." {
            continue;
        }
        if *component == ".." {
            current = current.parent().unwrap_or(current);
            continue;
        }

        let inode = current.get_inode().ok_or(VfsError::NoSuchEntry)?;
        if !inode.is_dir() {
            return Err(VfsError::NotADirectory);
        }

        let next = if let Some(child) = current.lookup_child(component) {
            child
        } else {
            let child_inode = inode.lookup(component)?;
            let child = Arc::new(super::dentry::Dentry::new(
                String::from(*component),
                Some(Arc::downgrade(&current)),
                Some(child_inode),
            ));
            current.add_child(child.clone());
            child
        };

        let is_last = last_index == Some(index);
        current = if flags.follow_symlinks || !is_last {
            resolve_if_symlink(root, &current, next, &mut symlink_budget)?
        } else {
            next
        };
    }

    Ok(current)
}

fn resolve_if_symlink(
    root: &DentryRef,
    parent: &DentryRef,
    entry: DentryRef,
    symlink_budget: &mut u32,
) -> VfsResult<DentryRef> {
    let Some(inode) = entry.get_inode() else {
        return Ok(entry);
    };
    if !inode.is_symlink() {
        return Ok(entry);
    }
    if *symlink_budget == 0 {
        return Err(VfsError::InvalidArgument);
    }
    *symlink_budget -= 1;
    let target = inode.ops.readlink(&inode)?;
    lookup_with_budget(
        root,
        parent,
        &target,
        &LookupFlags {
            follow_symlinks: true,
        },
        *symlink_budget,
    )
}

/// Split `path` into (parent dentry, final component name), for
/// create/unlink/rename-style calls that need the containing directory.
pub fn lookup_parent<'a>(
    root: &DentryRef,
    cwd: &DentryRef,
    path: &'a str,
) -> VfsResult<(DentryRef, &'a str)> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(VfsError::InvalidArgument);
    }
    let (parent_path, name) = match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => ("", trimmed),
    };
    let parent = if parent_path.is_empty() {
        cwd.clone()
    } else {
        lookup(root, cwd, parent_path, &LookupFlags::default())?
    };
    Ok((parent, name))
}
