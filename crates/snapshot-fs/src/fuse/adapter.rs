//! `fuser::Filesystem` implementation over the facade.
//!
//! The tree never changes shape after mounting, so inodes are assigned once
//! by a depth-first walk at mount time. Reads materialise the whole file
//! into a per-handle buffer on `open` and serve `(offset, size)` slices from
//! it until `release`.

use crate::tree_fs::TreeFs;
use crate::FsError;
use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, Request, FUSE_ROOT_ID,
};
use log::{debug, error, trace, warn};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

/// Time-to-live for cached attributes.
const TTL: Duration = Duration::from_secs(1);

/// Block size reported in attributes.
const BLOCK_SIZE: u32 = 512;

/// FUSE filesystem adapter for a loaded archive tree.
pub struct SnapshotFuseFs {
    /// The facade serving attribute, listing, and read requests.
    fs: TreeFs,
    /// Inode to facade path.
    paths: HashMap<u64, String>,
    /// (parent inode, child name) to child inode, for `lookup`.
    children: HashMap<(u64, String), u64>,
    /// Materialised file contents per open handle.
    handles: HashMap<u64, Vec<u8>>,
    /// Next file handle to hand out.
    next_fh: u64,
    /// User ID stamped on every attribute.
    uid: u32,
    /// Group ID stamped on every attribute.
    gid: u32,
}

impl SnapshotFuseFs {
    /// Index the tree and wrap the facade for mounting.
    pub fn new(fs: TreeFs) -> SnapshotFuseFs {
        let (paths, children) = index_tree(&fs);
        debug!("indexed {} inodes", paths.len());

        let uid = unsafe { libc::getuid() };
        let gid = unsafe { libc::getgid() };

        SnapshotFuseFs {
            fs,
            paths,
            children,
            handles: HashMap::new(),
            next_fh: 1,
            uid,
            gid,
        }
    }

    fn attr_for(&self, ino: u64, path: &str) -> Option<FileAttr> {
        let attr = self.fs.get_attr(path).ok()?;
        let mtime = UNIX_EPOCH + Duration::from_secs(attr.mtime);
        let (kind, nlink) = match attr.kind {
            crate::NodeKind::File => (FileType::RegularFile, 1),
            crate::NodeKind::Directory => (FileType::Directory, 2),
        };
        Some(FileAttr {
            ino,
            size: attr.size,
            blocks: (attr.size + u64::from(BLOCK_SIZE) - 1) / u64::from(BLOCK_SIZE),
            atime: mtime,
            mtime,
            ctime: mtime,
            crtime: mtime,
            kind,
            perm: attr.perm(),
            nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        })
    }
}

/// Assign inodes depth-first starting at the root, recording both the path
/// of every inode and the child edges used by `lookup`.
fn index_tree(fs: &TreeFs) -> (HashMap<u64, String>, HashMap<(u64, String), u64>) {
    let mut paths = HashMap::new();
    let mut children = HashMap::new();
    paths.insert(FUSE_ROOT_ID, String::new());

    let mut next = FUSE_ROOT_ID + 1;
    let mut stack = vec![(FUSE_ROOT_ID, String::new())];
    while let Some((ino, path)) = stack.pop() {
        let entries = match fs.open_dir(&path) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries {
            let child_path = if path.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", path, entry.name)
            };
            let child_ino = next;
            next += 1;
            paths.insert(child_ino, child_path.clone());
            children.insert((ino, entry.name), child_ino);
            if !entry.is_file {
                stack.push((child_ino, child_path));
            }
        }
    }
    (paths, children)
}

impl Filesystem for SnapshotFuseFs {
    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        trace!("getattr(ino={})", ino);

        let Some(path) = self.paths.get(&ino).cloned() else {
            warn!("getattr: inode {} not found", ino);
            reply.error(libc::ENOENT);
            return;
        };
        match self.attr_for(ino, &path) {
            Some(attr) => reply.attr(&TTL, &attr),
            None => reply.error(libc::ENOENT),
        }
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let name_str = name.to_string_lossy();
        trace!("lookup(parent={}, name='{}')", parent, name_str);

        let Some(&ino) = self.children.get(&(parent, name_str.to_string())) else {
            debug!("lookup: '{}' not under inode {}", name_str, parent);
            reply.error(libc::ENOENT);
            return;
        };
        let Some(path) = self.paths.get(&ino).cloned() else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.attr_for(ino, &path) {
            Some(attr) => reply.entry(&TTL, &attr, 0),
            None => reply.error(libc::ENOENT),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        trace!("readdir(ino={}, offset={})", ino, offset);

        let Some(path) = self.paths.get(&ino).cloned() else {
            reply.error(libc::ENOENT);
            return;
        };
        let listing = match self.fs.open_dir(&path) {
            Ok(listing) => listing,
            Err(err) => {
                debug!("readdir: '{}': {}", path, err);
                reply.error(err.errno());
                return;
            }
        };

        let mut entries: Vec<(u64, FileType, String)> = vec![
            (ino, FileType::Directory, ".".to_string()),
            (ino, FileType::Directory, "..".to_string()),
        ];
        for entry in listing {
            let kind = if entry.is_file {
                FileType::RegularFile
            } else {
                FileType::Directory
            };
            let child_ino = self
                .children
                .get(&(ino, entry.name.clone()))
                .copied()
                .unwrap_or(FUSE_ROOT_ID);
            entries.push((child_ino, kind, entry.name));
        }

        for (i, (ino, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            // next_offset = i + 1
            if reply.add(ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request, ino: u64, flags: i32, reply: ReplyOpen) {
        trace!("open(ino={}, flags={:#x})", ino, flags);

        if flags & (libc::O_WRONLY | libc::O_RDWR) != 0 {
            reply.error(libc::EACCES);
            return;
        }
        let Some(path) = self.paths.get(&ino).cloned() else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.open(&path) {
            Ok(bytes) => {
                let fh = self.next_fh;
                self.next_fh += 1;
                self.handles.insert(fh, bytes);
                reply.opened(fh, 0);
            }
            Err(err) => {
                if matches!(err, FsError::Io(_)) {
                    error!("open: '{}': {}", path, err);
                }
                reply.error(err.errno());
            }
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!("read(ino={}, fh={}, offset={}, size={})", ino, fh, offset, size);

        let Some(bytes) = self.handles.get(&fh) else {
            warn!("read: unknown handle {}", fh);
            reply.error(libc::EBADF);
            return;
        };
        if offset < 0 || offset as usize >= bytes.len() {
            reply.data(&[]);
            return;
        }
        let start = offset as usize;
        let end = bytes.len().min(start + size as usize);
        reply.data(&bytes[start..end]);
    }

    fn release(
        &mut self,
        _req: &Request,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        trace!("release(fh={})", fh);
        self.handles.remove(&fh);
        reply.ok();
    }
}

fn mount_options() -> Vec<MountOption> {
    vec![
        MountOption::RO,
        MountOption::FSName("snapshotfs".to_string()),
        MountOption::Subtype("snapshot".to_string()),
    ]
}

/// Mount the facade at `mount_point`, blocking until unmounted.
pub fn mount<P: AsRef<Path>>(fs: TreeFs, mount_point: P) -> io::Result<()> {
    let adapter = SnapshotFuseFs::new(fs);
    fuser::mount2(adapter, mount_point.as_ref(), &mount_options())
}

/// Mount the facade in the background; dropping (or joining) the returned
/// session unmounts it.
pub fn mount_background<P: AsRef<Path>>(
    fs: TreeFs,
    mount_point: P,
) -> io::Result<fuser::BackgroundSession> {
    let adapter = SnapshotFuseFs::new(fs);
    fuser::spawn_mount2(adapter, mount_point.as_ref(), &mount_options())
}
