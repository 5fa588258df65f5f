//! File nodes of the virtual tree.
//!
//! Every variant satisfies the same small contract: a display name, a size
//! query, and `open`, which yields a single-use sequential byte stream. The
//! stream needs no seeking; callers read it to the end and drop it.

use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use xz2::read::XzDecoder;
use zip::ZipArchive;

use crate::error::Result;

/// Seekable stream backing a tar archive, shared by every slice of it.
pub trait SeekRead: Read + Seek + Send {}

impl<T: Read + Seek + Send> SeekRead for T {}

/// Access to the parsed ZIP archive a set of entry nodes was loaded from.
pub(crate) trait ZipStore: Send {
    /// Read the full decoded bytes of the entry at `index`.
    fn read_entry(&mut self, index: usize) -> io::Result<Vec<u8>>;
}

impl<R: Read + Seek + Send> ZipStore for ZipArchive<R> {
    fn read_entry(&mut self, index: usize) -> io::Result<Vec<u8>> {
        let mut entry = self.by_index(index).map_err(io::Error::from)?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

pub(crate) fn poisoned_lock() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "archive reader lock poisoned")
}

/// Per-file compression codec, recognised by file-name extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Xz,
    Bzip2,
}

impl Codec {
    /// The codec implied by `name`'s extension, if any.
    pub fn for_name(name: &str) -> Option<Codec> {
        if name.ends_with(".gz") {
            Some(Codec::Gzip)
        } else if name.ends_with(".xz") {
            Some(Codec::Xz)
        } else if name.ends_with(".bz2") {
            Some(Codec::Bzip2)
        } else {
            None
        }
    }

    /// The file-name suffix this codec is recognised by.
    pub fn suffix(self) -> &'static str {
        match self {
            Codec::Gzip => ".gz",
            Codec::Xz => ".xz",
            Codec::Bzip2 => ".bz2",
        }
    }

    fn decoder<'r>(self, inner: Box<dyn Read + 'r>) -> Box<dyn Read + 'r> {
        match self {
            Codec::Gzip => Box::new(GzDecoder::new(inner)),
            Codec::Xz => Box::new(XzDecoder::new(inner)),
            Codec::Bzip2 => Box::new(BzDecoder::new(inner)),
        }
    }
}

/// A file of the virtual tree.
pub enum FileNode {
    /// An entry of a ZIP archive, decoded by the ZIP reader on open.
    Zip(ZipEntryFile),
    /// A contiguous byte range of an outer tar stream.
    TarSlice(TarSliceFile),
    /// Any other variant wrapped in a streaming decompressor.
    Compressed(CompressedFile),
}

pub struct ZipEntryFile {
    store: Arc<Mutex<dyn ZipStore>>,
    index: usize,
    size: u64,
    name: String,
}

pub struct TarSliceFile {
    outer: Arc<Mutex<dyn SeekRead>>,
    offset: u64,
    size: u64,
    mtime: u64,
    name: String,
}

pub struct CompressedFile {
    inner: Box<FileNode>,
    codec: Codec,
    size: OnceLock<u64>,
}

impl FileNode {
    pub(crate) fn zip_entry(
        store: Arc<Mutex<dyn ZipStore>>,
        index: usize,
        size: u64,
        name: String,
    ) -> FileNode {
        FileNode::Zip(ZipEntryFile {
            store,
            index,
            size,
            name,
        })
    }

    pub(crate) fn tar_slice(
        outer: Arc<Mutex<dyn SeekRead>>,
        offset: u64,
        size: u64,
        mtime: u64,
        name: String,
    ) -> FileNode {
        FileNode::TarSlice(TarSliceFile {
            outer,
            offset,
            size,
            mtime,
            name,
        })
    }

    /// Wrap `inner` in a streaming decoder for `codec`.
    pub fn compressed(inner: FileNode, codec: Codec) -> FileNode {
        FileNode::Compressed(CompressedFile {
            inner: Box::new(inner),
            codec,
            size: OnceLock::new(),
        })
    }

    /// The display name of this file within its directory.
    pub fn name(&self) -> &str {
        match self {
            FileNode::Zip(f) => &f.name,
            FileNode::TarSlice(f) => &f.name,
            FileNode::Compressed(f) => f.inner.name(),
        }
    }

    /// The decoded size in bytes.
    ///
    /// For a compressed wrapper the first call drains the decoded stream and
    /// memoises its length; later calls return the cached value.
    pub fn size(&self) -> Result<u64> {
        match self {
            FileNode::Zip(f) => Ok(f.size),
            FileNode::TarSlice(f) => Ok(f.size),
            FileNode::Compressed(f) => f.decoded_size(),
        }
    }

    /// Modification time in seconds since the epoch, zero when the archive
    /// format does not carry one.
    pub fn mtime(&self) -> u64 {
        match self {
            FileNode::Zip(_) => 0,
            FileNode::TarSlice(f) => f.mtime,
            FileNode::Compressed(f) => f.inner.mtime(),
        }
    }

    /// Open a fresh sequential stream over the decoded bytes.
    ///
    /// A tar slice stream holds the per-archive lock until dropped, so at
    /// most one slice of a given tarball can be open at a time.
    pub fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        match self {
            FileNode::Zip(f) => {
                let mut store = f.store.lock().map_err(|_| poisoned_lock())?;
                let bytes = store.read_entry(f.index)?;
                Ok(Box::new(Cursor::new(bytes)))
            }
            FileNode::TarSlice(f) => {
                let mut guard = f.outer.lock().map_err(|_| poisoned_lock())?;
                guard.seek(SeekFrom::Start(f.offset))?;
                Ok(Box::new(SliceStream {
                    guard,
                    remaining: f.size,
                }))
            }
            FileNode::Compressed(f) => Ok(f.codec.decoder(f.inner.open()?)),
        }
    }
}

impl fmt::Debug for FileNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileNode::Zip(inner) => write!(f, "Zip({})", inner.name),
            FileNode::TarSlice(inner) => write!(f, "TarSlice({})", inner.name),
            FileNode::Compressed(inner) => {
                write!(f, "Compressed({:?}, {})", inner.codec, inner.inner.name())
            }
        }
    }
}

impl CompressedFile {
    fn decoded_size(&self) -> Result<u64> {
        if let Some(&size) = self.size.get() {
            return Ok(size);
        }
        let mut stream = self.codec.decoder(self.inner.open()?);
        let mut drained = 0u64;
        let mut buf = [0u8; 8192];
        loop {
            match stream.read(&mut buf)? {
                0 => break,
                n => drained += n as u64,
            }
        }
        Ok(*self.size.get_or_init(|| drained))
    }
}

/// Length-limited view of the outer tar stream, positioned at a member's
/// payload. Dropping it releases the per-archive lock.
struct SliceStream<'a> {
    guard: MutexGuard<'a, dyn SeekRead + 'static>,
    remaining: u64,
}

impl Read for SliceStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let cap = self.remaining.min(buf.len() as u64) as usize;
        let n = self.guard.read(&mut buf[..cap])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}
