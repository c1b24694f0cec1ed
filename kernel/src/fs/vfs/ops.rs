//! Operation vtables (§4.6, §9 "deep inheritance / operation tables"):
//! filesystem drivers populate these statically at `FilesystemType`
//! registration instead of relying on dynamic dispatch through a class
//! hierarchy. Grounded on the teacher's `fs::vfs::ops` module.

extern crate alloc;

use alloc::string::String;
use alloc::sync::Arc;

use super::error::VfsResult;
use super::file::File;
use super::inode::Inode;

#[derive(Clone, Debug)]
pub struct DirEntry {
    pub ino: u64,
    pub name: String,
    pub inode_type: super::inode::InodeType,
}

#[derive(Clone, Debug, Default)]
pub struct SetAttr {
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub size: Option<u64>,
    pub atime: Option<u64>,
    pub mtime: Option<u64>,
}

pub trait InodeOps: Send + Sync {
    fn lookup(&self, _dir: &Inode, _name: &str) -> VfsResult<Arc<Inode>> {
        Err(super::error::VfsError::NotSupported)
    }

    fn create(&self, _dir: &Inode, _name: &str, _mode: u32) -> VfsResult<Arc<Inode>> {
        Err(super::error::VfsError::NotSupported)
    }

    fn mkdir(&self, _dir: &Inode, _name: &str, _mode: u32) -> VfsResult<Arc<Inode>> {
        Err(super::error::VfsError::NotSupported)
    }

    fn unlink(&self, _dir: &Inode, _name: &str) -> VfsResult<()> {
        Err(super::error::VfsError::NotSupported)
    }

    fn rmdir(&self, _dir: &Inode, _name: &str) -> VfsResult<()> {
        Err(super::error::VfsError::NotSupported)
    }

    fn symlink(&self, _dir: &Inode, _name: &str, _target: &str) -> VfsResult<Arc<Inode>> {
        Err(super::error::VfsError::NotSupported)
    }

    fn link(&self, _dir: &Inode, _name: &str, _target: &Inode) -> VfsResult<()> {
        Err(super::error::VfsError::NotSupported)
    }

    fn rename(
        &self,
        _old_dir: &Inode,
        _old_name: &str,
        _new_dir: &Inode,
        _new_name: &str,
    ) -> VfsResult<()> {
        Err(super::error::VfsError::NotSupported)
    }

    fn read(&self, _inode: &Inode, _offset: u64, _buf: &mut [u8]) -> VfsResult<usize> {
        Err(super::error::VfsError::NotSupported)
    }

    fn write(&self, _inode: &Inode, _offset: u64, _buf: &[u8]) -> VfsResult<usize> {
        Err(super::error::VfsError::NotSupported)
    }

    fn truncate(&self, _inode: &Inode, _size: u64) -> VfsResult<()> {
        Err(super::error::VfsError::NotSupported)
    }

    fn readlink(&self, _inode: &Inode) -> VfsResult<String> {
        Err(super::error::VfsError::NotSupported)
    }

    fn readdir(&self, _inode: &Inode, _offset: usize) -> VfsResult<Option<DirEntry>> {
        Err(super::error::VfsError::NotSupported)
    }

    fn setattr(&self, _inode: &Inode, _attr: &SetAttr) -> VfsResult<()> {
        Err(super::error::VfsError::NotSupported)
    }

    /// Called when an inode's refcount drops to zero (invariant (iii)).
    fn release(&self, _inode: &Inode) {}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SeekWhence {
    Set,
    Cur,
    End,
}

pub trait FileOps: Send + Sync {
    fn read(&self, file: &File, buf: &mut [u8]) -> VfsResult<usize>;
    fn write(&self, file: &File, buf: &[u8]) -> VfsResult<usize>;

    fn seek(&self, file: &File, offset: i64, whence: SeekWhence) -> VfsResult<u64> {
        use core::sync::atomic::Ordering;
        let current = file.position.load(Ordering::Relaxed);
        let size = file.dentry.get_inode().map(|i| i.size.load(Ordering::Relaxed)).unwrap_or(0);
        let base = match whence {
            SeekWhence::Set => 0i64,
            SeekWhence::Cur => current as i64,
            SeekWhence::End => size as i64,
        };
        let new_offset = base
            .checked_add(offset)
            .filter(|v| *v >= 0)
            .ok_or(super::error::VfsError::InvalidArgument)?;
        file.position.store(new_offset as u64, Ordering::Relaxed);
        Ok(new_offset as u64)
    }

    fn ioctl(&self, _file: &File, _cmd: u32, _arg: usize) -> VfsResult<i64> {
        Err(super::error::VfsError::NotSupported)
    }

    fn flush(&self, _file: &File) -> VfsResult<()> {
        Ok(())
    }

    fn release(&self, _file: &File) -> VfsResult<()> {
        Ok(())
    }
}

pub trait SuperblockOps: Send + Sync {
    fn sync(&self) -> VfsResult<()> {
        Ok(())
    }

    fn statfs(&self) -> VfsResult<StatFs> {
        Err(super::error::VfsError::NotSupported)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StatFs {
    pub block_size: u64,
    pub total_blocks: u64,
    pub free_blocks: u64,
    pub total_inodes: u64,
    pub free_inodes: u64,
}
