//! `/proc` (C13): one directory per live process plus `/proc/self`,
//! each file regenerated from the live process table on every read
//! rather than cached at lookup time. There is no teacher module for
//! this — it is grounded on the tmpfs synthetic-tree shape
//! (`fs::tmpfs`) for the directory/inode wiring and on
//! `task::process::Process`'s field list (§3) for what each file
//! reports.

extern crate alloc;

use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use super::vfs::error::{VfsError, VfsResult};
use super::vfs::inode::{Inode, InodeType};
use super::vfs::ops::{DirEntry, InodeOps};
use super::vfs::superblock::Superblock;

#[derive(Clone, Debug)]
pub struct MapEntry {
    pub start: u64,
    pub end: u64,
    pub perms: String,
    pub path: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub ppid: u32,
    pub name: String,
    pub state: &'static str,
    pub uid: u32,
    pub gid: u32,
    pub vsize: u64,
    pub rss_pages: u64,
    pub cmdline: Vec<String>,
    pub environ: Vec<(String, String)>,
    pub cwd: String,
    pub exe: String,
    pub fds: Vec<u32>,
    pub maps: Vec<MapEntry>,
}

/// What the rest of the kernel (the process table, in practice) must
/// answer for `/proc` to render anything.
pub trait ProcfsSource: Send + Sync {
    fn list_pids(&self) -> Vec<u32>;
    fn snapshot(&self, pid: u32) -> Option<ProcessSnapshot>;
    fn current_pid(&self) -> u32;
}

#[derive(Clone)]
enum ProcEntry {
    Root,
    SelfLink,
    PidDir(u32),
    Status(u32),
    Stat(u32),
    Statm(u32),
    Maps(u32),
    Cmdline(u32),
    Environ(u32),
    Cwd(u32),
    Exe(u32),
    FdDir(u32),
}

struct ProcPrivate {
    entry: ProcEntry,
    source: Arc<dyn ProcfsSource>,
}

pub struct ProcFs {
    source: Arc<dyn ProcfsSource>,
    root: Arc<Inode>,
}

impl ProcFs {
    pub fn new(source: Arc<dyn ProcfsSource>) -> Arc<Self> {
        let root = Arc::new(Inode::new(
            1,
            0,
            InodeType::Directory,
            0o555,
            &PROC_DIR_OPS,
            Weak::<ProcFs>::new(),
            Box::new(ProcPrivate {
                entry: ProcEntry::Root,
                source: source.clone(),
            }),
        ));
        Arc::new(Self { source, root })
    }
}

impl Superblock for ProcFs {
    fn root_inode(&self) -> Arc<Inode> {
        self.root.clone()
    }

    fn fs_type_name(&self) -> &'static str {
        "procfs"
    }
}

fn node(
    ino: u64,
    ty: InodeType,
    mode: u32,
    ops: &'static dyn InodeOps,
    entry: ProcEntry,
    source: Arc<dyn ProcfsSource>,
) -> Arc<Inode> {
    Arc::new(Inode::new(
        ino,
        0,
        ty,
        mode,
        ops,
        Weak::<ProcFs>::new(),
        Box::new(ProcPrivate { entry, source }),
    ))
}

fn synthetic_ino(entry: &ProcEntry) -> u64 {
    match entry {
        ProcEntry::Root => 1,
        ProcEntry::SelfLink => 2,
        ProcEntry::PidDir(pid) => 1_000 + *pid as u64 * 16,
        ProcEntry::Status(pid) => 1_000 + *pid as u64 * 16 + 1,
        ProcEntry::Stat(pid) => 1_000 + *pid as u64 * 16 + 2,
        ProcEntry::Statm(pid) => 1_000 + *pid as u64 * 16 + 3,
        ProcEntry::Maps(pid) => 1_000 + *pid as u64 * 16 + 4,
        ProcEntry::Cmdline(pid) => 1_000 + *pid as u64 * 16 + 5,
        ProcEntry::Environ(pid) => 1_000 + *pid as u64 * 16 + 6,
        ProcEntry::Cwd(pid) => 1_000 + *pid as u64 * 16 + 7,
        ProcEntry::Exe(pid) => 1_000 + *pid as u64 * 16 + 8,
        ProcEntry::FdDir(pid) => 1_000 + *pid as u64 * 16 + 9,
    }
}

struct ProcDirOps;
static PROC_DIR_OPS: ProcDirOps = ProcDirOps;

impl InodeOps for ProcDirOps {
    fn lookup(&self, dir: &Inode, name: &str) -> VfsResult<Arc<Inode>> {
        let data = dir.private_data::<ProcPrivate>().ok_or(VfsError::NotSupported)?;
        let entry = match &data.entry {
            ProcEntry::Root => {
                if name == "self" {
                    ProcEntry::SelfLink
                } else if let Ok(pid) = name.parse::<u32>() {
                    if data.source.snapshot(pid).is_none() {
                        return Err(VfsError::NoSuchEntry);
                    }
                    ProcEntry::PidDir(pid)
                } else {
                    return Err(VfsError::NoSuchEntry);
                }
            }
            ProcEntry::PidDir(pid) => match name {
                "status" => ProcEntry::Status(*pid),
                "stat" => ProcEntry::Stat(*pid),
                "statm" => ProcEntry::Statm(*pid),
                "maps" => ProcEntry::Maps(*pid),
                "cmdline" => ProcEntry::Cmdline(*pid),
                "environ" => ProcEntry::Environ(*pid),
                "cwd" => ProcEntry::Cwd(*pid),
                "exe" => ProcEntry::Exe(*pid),
                "fd" => ProcEntry::FdDir(*pid),
                _ => return Err(VfsError::NoSuchEntry),
            },
            _ => return Err(VfsError::NotADirectory),
        };
        Ok(make_inode(entry, data.source.clone()))
    }

    fn readlink(&self, inode: &Inode) -> VfsResult<String> {
        let data = inode.private_data::<ProcPrivate>().ok_or(VfsError::NotSupported)?;
        match &data.entry {
            ProcEntry::SelfLink => Ok(data.source.current_pid().to_string()),
            ProcEntry::Cwd(pid) => data
                .source
                .snapshot(*pid)
                .map(|s| s.cwd)
                .ok_or(VfsError::NoSuchEntry),
            ProcEntry::Exe(pid) => data
                .source
                .snapshot(*pid)
                .map(|s| s.exe)
                .ok_or(VfsError::NoSuchEntry),
            _ => Err(VfsError::NotSupported),
        }
    }

    fn readdir(&self, inode: &Inode, offset: usize) -> VfsResult<Option<DirEntry>> {
        let data = inode.private_data::<ProcPrivate>().ok_or(VfsError::NotSupported)?;
        match &data.entry {
            ProcEntry::Root => {
                let mut names: Vec<String> =
                    data.source.list_pids().iter().map(|p| p.to_string()).collect();
                names.push(String::from("self"));
                if offset >= names.len() {
                    return Ok(None);
                }
                let name = names.swap_remove(offset.min(names.len() - 1));
                let ino = if name == "self" {
                    synthetic_ino(&ProcEntry::SelfLink)
                } else {
                    synthetic_ino(&ProcEntry::PidDir(name.parse().unwrap_or(0)))
                };
                Ok(Some(DirEntry {
                    ino,
                    name,
                    inode_type: InodeType::Directory,
                }))
            }
            ProcEntry::PidDir(pid) => {
                const NAMES: &[&str] = &[
                    "status", "stat", "statm", "maps", "cmdline", "environ", "cwd", "exe", "fd",
                ];
                if offset >= NAMES.len() {
                    return Ok(None);
                }
                let name = NAMES[offset];
                Ok(Some(DirEntry {
                    ino: synthetic_ino(&ProcEntry::Status(*pid)).wrapping_add(offset as u64),
                    name: String::from(name),
                    inode_type: InodeType::Regular,
                }))
            }
            _ => Err(VfsError::NotADirectory),
        }
    }
}

fn make_inode(entry: ProcEntry, source: Arc<dyn ProcfsSource>) -> Arc<Inode> {
    let ino = synthetic_ino(&entry);
    match &entry {
        ProcEntry::Root | ProcEntry::PidDir(_) => node(ino, InodeType::Directory, 0o555, &PROC_DIR_OPS, entry, source),
        ProcEntry::FdDir(_) => node(ino, InodeType::Directory, 0o500, &PROC_DIR_OPS, entry, source),
        ProcEntry::SelfLink | ProcEntry::Cwd(_) | ProcEntry::Exe(_) => {
            node(ino, InodeType::Symlink, 0o777, &PROC_DIR_OPS, entry, source)
        }
        _ => node(ino, InodeType::Regular, 0o444, &PROC_FILE_OPS, entry, source),
    }
}

struct ProcFileOps;
static PROC_FILE_OPS: ProcFileOps = ProcFileOps;

impl InodeOps for ProcFileOps {
    fn read(&self, inode: &Inode, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let data = inode.private_data::<ProcPrivate>().ok_or(VfsError::NotSupported)?;
        let rendered = render(&data.entry, &*data.source).ok_or(VfsError::NoSuchEntry)?;
        let bytes = rendered.as_bytes();
        let offset = offset as usize;
        if offset >= bytes.len() {
            return Ok(0);
        }
        let n = (bytes.len() - offset).min(buf.len());
        buf[..n].copy_from_slice(&bytes[offset..offset + n]);
        Ok(n)
    }
}

fn render(entry: &ProcEntry, source: &dyn ProcfsSource) -> Option<String> {
    match entry {
        ProcEntry::Status(pid) => {
            let s = source.snapshot(*pid)?;
            Some(format!(
                "Name:\t{}\nState:\t{}\nPid:\t{}\nPPid:\t{}\nUid:\t{}\nGid:\t{}\nVmSize:\t{} kB\nVmRSS:\t{} kB\n",
                s.name,
                s.state,
                s.pid,
                s.ppid,
                s.uid,
                s.gid,
                s.vsize / 1024,
                s.rss_pages * 4,
            ))
        }
        ProcEntry::Stat(pid) => {
            let s = source.snapshot(*pid)?;
            Some(format!(
                "{} ({}) {} {} 0 0 0\n",
                s.pid, s.name, s.state, s.ppid
            ))
        }
        ProcEntry::Statm(pid) => {
            let s = source.snapshot(*pid)?;
            Some(format!("{} {} 0 0 0 0 0\n", s.vsize / 4096, s.rss_pages))
        }
        ProcEntry::Maps(pid) => {
            let s = source.snapshot(*pid)?;
            let mut out = String::new();
            for m in &s.maps {
                out.push_str(&format!(
                    "{:016x}-{:016x} {} 00000000 00:00 0{}\n",
                    m.start,
                    m.end,
                    m.perms,
                    m.path.as_deref().map(|p| format!("\t{p}")).unwrap_or_default(),
                ));
            }
            Some(out)
        }
        ProcEntry::Cmdline(pid) => {
            let s = source.snapshot(*pid)?;
            Some(s.cmdline.join("\0") + "\0")
        }
        ProcEntry::Environ(pid) => {
            let s = source.snapshot(*pid)?;
            let mut out = String::new();
            for (k, v) in &s.environ {
                out.push_str(&format!("{k}={v}\0"));
            }
            Some(out)
        }
        _ => None,
    }
}
