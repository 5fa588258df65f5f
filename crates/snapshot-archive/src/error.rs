use thiserror::Error;

/// Errors that can occur while loading an archive tree.
#[derive(Debug, Error)]
pub enum Error {
    /// The archive extension is not one the loader dispatch understands.
    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// Error from the zip library, including a malformed central directory.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error from the underlying reader or a codec stream.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for snapshot-archive operations.
pub type Result<T> = std::result::Result<T, Error>;
