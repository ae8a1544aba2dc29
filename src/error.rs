//! Error types for the downloader core.

use thiserror::Error;

/// Errors that can occur while talking to the media fetch tool.
#[derive(Error, Debug)]
pub enum Error {
    /// The yt-dlp binary could not be located on PATH.
    #[error("yt-dlp not found: {0}")]
    MissingBinary(#[from] which::Error),

    /// I/O error while spawning or reading from the child process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Video metadata could not be parsed.
    #[error("metadata parse failed: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Info lookup failed.
    #[error("info fetch failed: {0}")]
    Fetch(String),

    /// Download failed.
    #[error("download failed: {0}")]
    Download(String),
}

/// A specialized `Result` type for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;
