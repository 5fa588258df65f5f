//! Format dispatch: build a directory tree from a seekable archive stream.

use std::io::{Cursor, Read, Seek};
use std::path::Path;

mod tar;
mod zip;

use crate::error::{Error, Result};
use crate::tree::Dir;

/// Load the archive behind `reader` into a directory tree, dispatching on
/// the extension of `path`. Only `.zip` and `.tar` are understood.
pub fn load_archive<R>(reader: R, path: &str) -> Result<Dir>
where
    R: Read + Seek + Send + 'static,
{
    if path.ends_with(".zip") {
        zip::load(reader)
    } else if path.ends_with(".tar") {
        tar::load(reader)
    } else {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        Err(Error::UnsupportedFormat(ext.to_string()))
    }
}

/// Load a nested archive from its buffered payload bytes.
fn from_bytes(bytes: Vec<u8>, path: &str) -> Result<Dir> {
    load_archive(Cursor::new(bytes), path)
}
