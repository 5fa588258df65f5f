//! FUSE adapter for archive trees.
//!
//! This module binds the read-only [`TreeFs`](crate::TreeFs) facade to the
//! `fuser::Filesystem` trait, so a loaded ZIP or TAR archive can be mounted
//! and browsed like any directory.
//!
//! # Example
//!
//! ```ignore
//! use snapshot_archive::load_archive;
//! use snapshot_fs::{fuse, TreeFs};
//!
//! let file = std::fs::File::open("data.zip")?;
//! let root = load_archive(file, "data.zip")?;
//! fuse::mount(TreeFs::new(root), "/mnt/data")?;
//! ```

mod adapter;

pub use adapter::*;
