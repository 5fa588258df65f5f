//! Read-only filesystem facade over a loaded archive tree.
//!
//! Three operations are served: attribute lookup, directory listing, and
//! whole-file reads. A single mutex wraps the tree and is held for the full
//! duration of every operation; the tar-slice read path depends on that
//! serialisation of the outer archive reader.

use std::io::{self, Read};
use std::sync::{Mutex, MutexGuard};

use log::debug;
use snapshot_archive::{recursive_find_dir, recursive_find_file, Dir};

use crate::error::{FsError, FsResult};

/// Whether a path names a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_file: bool,
}

/// Attribute record for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr {
    pub kind: NodeKind,
    pub size: u64,
    /// Seconds since the epoch; zero when the archive carries no timestamp.
    /// Access and change time mirror this value.
    pub mtime: u64,
}

impl Attr {
    /// Permission bits: `0555` for files, `0755` for directories.
    pub fn perm(&self) -> u16 {
        match self.kind {
            NodeKind::File => 0o555,
            NodeKind::Directory => 0o755,
        }
    }
}

/// The facade: an immutable tree behind the whole-filesystem lock.
pub struct TreeFs {
    root: Mutex<Dir>,
}

impl TreeFs {
    pub fn new(root: Dir) -> TreeFs {
        TreeFs {
            root: Mutex::new(root),
        }
    }

    fn lock(&self) -> FsResult<MutexGuard<'_, Dir>> {
        self.root
            .lock()
            .map_err(|_| FsError::Io(io::Error::new(io::ErrorKind::Other, "tree lock poisoned")))
    }

    /// List the entries directly under `path`: files first, then
    /// directories, each in insertion order. A path naming a file is
    /// not-found; only directories are listable.
    pub fn open_dir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        debug!("open_dir: '{}'", path);
        let root = self.lock()?;
        let dir = recursive_find_dir(&root, path).ok_or(FsError::NotFound)?;
        let mut entries = Vec::with_capacity(dir.files().len() + dir.dirs().len());
        for file in dir.files() {
            entries.push(DirEntry {
                name: file.name().to_string(),
                is_file: true,
            });
        }
        for sub in dir.dirs() {
            entries.push(DirEntry {
                name: sub.name().to_string(),
                is_file: false,
            });
        }
        Ok(entries)
    }

    /// Attributes of `path`. A file whose size cannot be computed (for
    /// instance a wrapper over undecodable bytes) still resolves, with size
    /// zero. The root (empty path) is always a directory.
    pub fn get_attr(&self, path: &str) -> FsResult<Attr> {
        debug!("get_attr: '{}'", path);
        let root = self.lock()?;
        if let Some(file) = recursive_find_file(&root, path) {
            let size = file.size().unwrap_or_else(|err| {
                debug!("get_attr: size of '{}' failed: {}", path, err);
                0
            });
            return Ok(Attr {
                kind: NodeKind::File,
                size,
                mtime: file.mtime(),
            });
        }
        if recursive_find_dir(&root, path).is_some() {
            return Ok(Attr {
                kind: NodeKind::Directory,
                size: 0,
                mtime: 0,
            });
        }
        Err(FsError::NotFound)
    }

    /// The fully materialised bytes of the file at `path`.
    pub fn open(&self, path: &str) -> FsResult<Vec<u8>> {
        debug!("open: '{}'", path);
        let root = self.lock()?;
        let file = recursive_find_file(&root, path).ok_or(FsError::NotFound)?;
        let mut stream = file.open()?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}
