//! TAR loader: two passes over a seekable stream.
//!
//! The first pass only collects member names for the collision census. The
//! second records each member's payload offset so its bytes can later be
//! served by seeking the shared outer reader.

use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex};

use log::debug;
use tar::Archive;

use crate::error::Result;
use crate::name::{self, NameCensus};
use crate::node::{Codec, FileNode, SeekRead};
use crate::tree::{recursive_add_dir, Dir};

enum Member {
    Dir {
        raw: String,
    },
    Nested {
        raw: String,
        sub: Dir,
    },
    Slice {
        raw: String,
        offset: u64,
        size: u64,
        mtime: u64,
    },
}

pub(super) fn load<R>(mut reader: R) -> Result<Dir>
where
    R: Read + Seek + Send + 'static,
{
    let census = {
        let mut names = Vec::new();
        let mut archive = Archive::new(&mut reader);
        for entry in archive.entries()? {
            let entry = entry?;
            names.push(String::from_utf8_lossy(&entry.path_bytes()).into_owned());
        }
        NameCensus::scan(names.iter().map(|n| n.as_str()))
    };
    reader.seek(SeekFrom::Start(0))?;

    let mut members = Vec::new();
    {
        let mut archive = Archive::new(&mut reader);
        for entry in archive.entries()? {
            let mut entry = entry?;
            let raw = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            if entry.header().entry_type().is_dir() {
                members.push(Member::Dir { raw });
                continue;
            }
            let size = entry.header().size()?;
            if name::is_archive(&raw) {
                let mut bytes = Vec::with_capacity(size as usize);
                entry.read_to_end(&mut bytes)?;
                debug!("descending into nested archive '{}'", raw);
                let sub = super::from_bytes(bytes, &raw)?;
                members.push(Member::Nested { raw, sub });
                continue;
            }
            let mtime = entry.header().mtime().unwrap_or(0);
            members.push(Member::Slice {
                raw,
                offset: entry.raw_file_position(),
                size,
                mtime,
            });
        }
    }

    // The reader moves into the shared handle here; its mutex is the
    // per-tarball slice lock.
    let outer: Arc<Mutex<dyn SeekRead>> = Arc::new(Mutex::new(reader));
    let mut root = Dir::new("");
    for member in members {
        match member {
            Member::Dir { raw } => {
                if raw.ends_with('/') {
                    recursive_add_dir(&mut root, &raw);
                } else {
                    recursive_add_dir(&mut root, name::parent_of(&raw))
                        .add_empty_dir(name::base_of(&raw));
                }
            }
            Member::Nested { raw, mut sub } => {
                sub.set_name(name::base_of(census.archive_name(&raw)));
                recursive_add_dir(&mut root, name::parent_of(&raw)).add_dir(sub);
            }
            Member::Slice {
                raw,
                offset,
                size,
                mtime,
            } => {
                let display = name::base_of(census.file_name(&raw)).to_string();
                let mut node =
                    FileNode::tar_slice(Arc::clone(&outer), offset, size, mtime, display);
                if let Some(codec) = Codec::for_name(&raw) {
                    node = FileNode::compressed(node, codec);
                }
                recursive_add_dir(&mut root, name::parent_of(&raw)).add_file(node);
            }
        }
    }
    Ok(root)
}
