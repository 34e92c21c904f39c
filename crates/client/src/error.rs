//! Client error types.

use geodex_auth::AuthError;
use geodex_transfer::TransferError;

/// Errors from GraphQL calls against the catalog API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Non-2xx response from the API, with the body kept for diagnostics.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// HTTP 200 whose body carries a GraphQL `errors` array.
    #[error("GraphQL error: {message}")]
    GraphQl { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
}

/// Errors produced by the multipart upload coordinator.
///
/// Each variant carries enough context (status, body, part number) to
/// diagnose a failed upload without re-running with verbose logging.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The create-session call failed; nothing was transferred, retrying the
    /// whole upload is cheap and safe.
    #[error("upload session create failed: {detail}")]
    SessionCreate { detail: String },

    /// Presign, PUT, or ETag extraction failed for one part. The remote
    /// session is left abandoned; a retry restarts from part 1.
    #[error("chunk transfer failed for part {part_number}: {detail}")]
    ChunkTransfer { part_number: u64, detail: String },

    /// The completion call failed, or returned 200 without the success
    /// marker in its body.
    #[error("upload completion failed: {detail}")]
    Completion { detail: String },

    #[error("upload cancelled")]
    Cancelled,

    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("task join error: {0}")]
    Task(String),
}
