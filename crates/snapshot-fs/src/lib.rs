//! # snapshot-fs
//!
//! Read-only filesystem surface for archive trees built by
//! `snapshot-archive`.
//!
//! This crate provides:
//! - The [`TreeFs`] facade: attribute lookup, directory listing, and
//!   whole-file reads behind a single filesystem-wide lock
//! - A FUSE adapter ([`fuse`]) binding the facade to `fuser`
//! - The `snapshot_fs` binary mounting an archive at a given mount point

mod error;
pub mod fuse;
mod tree_fs;

pub use error::{FsError, FsResult};
pub use tree_fs::{Attr, DirEntry, NodeKind, TreeFs};
