//! Chunked file reading and progress tracking for multipart uploads.

mod chunked;
mod progress;

pub use chunked::{Chunk, ChunkReader, expected_chunks};
pub use progress::{ProgressCallback, SpeedCalculator, UploadProgress};

/// Default chunk size: 100 MiB, the unit of multipart transfer.
pub const DEFAULT_CHUNK_SIZE: usize = 100 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("file not found or unreadable: {0}")]
    FileNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
