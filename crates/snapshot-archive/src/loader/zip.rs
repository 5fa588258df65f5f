//! ZIP loader: walk the central directory and build the tree.

use std::io::{Read, Seek};
use std::sync::{Arc, Mutex};

use log::debug;
use zip::ZipArchive;

use crate::error::Result;
use crate::name::{self, NameCensus};
use crate::node::{poisoned_lock, Codec, FileNode, ZipStore};
use crate::tree::{recursive_add_dir, Dir};

struct EntryMeta {
    index: usize,
    raw: String,
    size: u64,
}

pub(super) fn load<R>(reader: R) -> Result<Dir>
where
    R: Read + Seek + Send + 'static,
{
    let mut archive = ZipArchive::new(reader)?;

    let mut metas = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        metas.push(EntryMeta {
            index,
            raw: entry.name().to_string(),
            size: entry.size(),
        });
    }
    let census = NameCensus::scan(metas.iter().map(|m| m.raw.as_str()));

    let store: Arc<Mutex<dyn ZipStore>> = Arc::new(Mutex::new(archive));
    let mut root = Dir::new("");
    for meta in metas {
        // A trailing slash names an explicit directory.
        if meta.raw.ends_with('/') {
            recursive_add_dir(&mut root, &meta.raw);
            continue;
        }
        if name::is_archive(&meta.raw) {
            let bytes = {
                let mut guard = store.lock().map_err(|_| poisoned_lock())?;
                guard.read_entry(meta.index)?
            };
            debug!("descending into nested archive '{}'", meta.raw);
            let mut sub = super::from_bytes(bytes, &meta.raw)?;
            sub.set_name(name::base_of(census.archive_name(&meta.raw)));
            recursive_add_dir(&mut root, name::parent_of(&meta.raw)).add_dir(sub);
            continue;
        }
        let display = name::base_of(census.file_name(&meta.raw)).to_string();
        let mut node = FileNode::zip_entry(Arc::clone(&store), meta.index, meta.size, display);
        if let Some(codec) = Codec::for_name(&meta.raw) {
            node = FileNode::compressed(node, codec);
        }
        recursive_add_dir(&mut root, name::parent_of(&meta.raw)).add_file(node);
    }
    Ok(root)
}
