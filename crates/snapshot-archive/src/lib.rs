//! # snapshot-archive
//!
//! In-memory virtual directory tree over the contents of a ZIP or TAR
//! archive, with per-file decompression and nested archives expanded as
//! subdirectories.
//!
//! The tree is built once by [`load_archive`] and never mutated afterwards;
//! file bytes are pulled lazily through each node's `open` stream.
//!
//! ## Example
//!
//! ```ignore
//! use snapshot_archive::{load_archive, recursive_find_file};
//!
//! let file = std::fs::File::open("data.zip")?;
//! let root = load_archive(file, "data.zip")?;
//! if let Some(node) = recursive_find_file(&root, "docs/readme") {
//!     let mut stream = node.open()?;
//!     // read to end...
//! }
//! ```

mod error;
mod loader;
pub mod name;
mod node;
mod tree;

pub use error::{Error, Result};
pub use loader::load_archive;
pub use node::{Codec, FileNode, SeekRead};
pub use tree::{recursive_add_dir, recursive_find_dir, recursive_find_file, Dir};
