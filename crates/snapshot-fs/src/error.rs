use thiserror::Error;

/// Per-request failures of the read-only filesystem facade.
#[derive(Debug, Error)]
pub enum FsError {
    /// The path names neither a file nor a directory of the tree.
    #[error("no such file or directory")]
    NotFound,

    /// Opening, reading, or decoding the file's bytes failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    /// The errno a user-space-filesystem adapter should reply with.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::Io(_) => libc::EIO,
        }
    }
}

/// Result type for facade operations.
pub type FsResult<T> = std::result::Result<T, FsError>;
