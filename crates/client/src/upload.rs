//! Multipart upload coordinator.
//!
//! Drives one cloud-file upload end to end: create a session, then for each
//! chunk request a presigned URL and PUT the bytes straight to object
//! storage, collecting the ETag object storage returns; finally complete
//! the session with the ordered part list. The token is checked before
//! every chunk so a multi-gigabyte transfer never outlives its bearer
//! token.
//!
//! Chunks are strictly sequential: part k+1 is not presigned until part k's
//! PUT has completed and its ETag is recorded, which keeps the part
//! bookkeeping trivially correct. There is no resume: any failure after the
//! session exists abandons it, and a retry restarts from part 1.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use geodex_auth::TokenAuthenticator;
use geodex_transfer::{
    Chunk, ChunkReader, ProgressCallback, SpeedCalculator, UploadProgress, expected_chunks,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ClientError, UploadError};
use crate::queries::{self, COMPLETE_SUCCESS_MARKER, CompletedPart};
use crate::session::CatalogSession;

/// Lookahead used for token refresh checks during an upload: 10 minutes,
/// sized so a slow 100 MiB chunk cannot straddle the expiry.
const UPLOAD_REFRESH_LOOKAHEAD: Duration = Duration::from_secs(600);

/// Result of a completed multipart upload.
#[derive(Debug, Clone)]
pub struct CompletedUpload {
    /// Object path the file was assembled under (`item_id/file_name`).
    pub object_path: String,
    /// Opaque session identifier the service correlated the parts with.
    pub upload_id: String,
    /// Every uploaded part in part-number order.
    pub parts: Vec<CompletedPart>,
    /// Total bytes transferred.
    pub bytes_sent: u64,
}

/// Coordinates one chunked multipart upload over a [`CatalogSession`].
pub struct MultipartUploader<'a, A: TokenAuthenticator> {
    session: &'a mut CatalogSession<A>,
    chunk_size: usize,
    refresh_lookahead: Duration,
    chunk_retries: u32,
    cancel: CancellationToken,
    on_progress: Option<ProgressCallback>,
}

impl<'a, A: TokenAuthenticator> MultipartUploader<'a, A> {
    pub fn new(session: &'a mut CatalogSession<A>) -> Self {
        Self {
            session,
            chunk_size: geodex_transfer::DEFAULT_CHUNK_SIZE,
            refresh_lookahead: UPLOAD_REFRESH_LOOKAHEAD,
            chunk_retries: 0,
            cancel: CancellationToken::new(),
            on_progress: None,
        }
    }

    /// Sets the chunk size in bytes (default 100 MiB).
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the token refresh lookahead checked before every chunk.
    pub fn refresh_lookahead(mut self, lookahead: Duration) -> Self {
        self.refresh_lookahead = lookahead;
        self
    }

    /// Extra in-place attempts for a failing chunk before the session fails
    /// (default 0: a single chunk failure fails the whole upload).
    pub fn chunk_retries(mut self, retries: u32) -> Self {
        self.chunk_retries = retries;
        self
    }

    /// Token checked between chunks; cancelling aborts the upload.
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Registers a progress callback, invoked after every finished part.
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Uploads `file_path` as a cloud file of item `item_id`.
    ///
    /// `file_name` defaults to the path's final component; `content_type`
    /// is passed through to the service when given.
    pub async fn upload(
        &mut self,
        item_id: &str,
        file_path: &Path,
        file_name: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<CompletedUpload, UploadError> {
        let file_name = match file_name {
            Some(name) => name.to_string(),
            None => file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let object_path = format!("{item_id}/{file_name}");

        // Open the reader before any network call so a bad path fails cheap.
        let chunk_size = self.chunk_size;
        let path = file_path.to_path_buf();
        let mut reader = tokio::task::spawn_blocking(move || ChunkReader::new(&path, chunk_size))
            .await
            .map_err(|e| UploadError::Task(e.to_string()))??;

        let total_bytes = reader.file_size();
        let expected_parts = expected_chunks(total_bytes, reader.chunk_size());

        self.check_cancelled()?;
        let upload_id = self.create_session(&object_path, content_type).await?;
        info!(
            %object_path,
            %upload_id,
            total_bytes,
            expected_parts,
            "upload session created"
        );

        let speed = SpeedCalculator::new(None, None);
        let mut parts: Vec<CompletedPart> = Vec::new();
        let mut bytes_sent: u64 = 0;
        loop {
            self.check_cancelled()?;

            let (returned, read) = tokio::task::spawn_blocking(move || {
                let chunk = reader.next_chunk();
                (reader, chunk)
            })
            .await
            .map_err(|e| UploadError::Task(e.to_string()))?;
            reader = returned;

            let Some(chunk) = read? else {
                break;
            };
            let part_number = chunk.part_number;
            let chunk_len = chunk.len() as u64;

            let etag = self.transfer_chunk(&object_path, &upload_id, chunk).await?;
            debug!(part_number, %etag, "part uploaded");

            bytes_sent += chunk_len;
            parts.push(CompletedPart { part_number, etag });
            speed.add_sample(chunk_len);
            if let Some(callback) = &self.on_progress {
                callback(UploadProgress {
                    part_number,
                    expected_parts,
                    bytes_sent,
                    total_bytes,
                    bytes_per_second: speed.bytes_per_second(),
                    eta: speed.eta(total_bytes.saturating_sub(bytes_sent)),
                });
            }
        }

        // Already in read order; sorted anyway so the completion payload
        // stays correct if chunk transfer is ever parallelized.
        parts.sort_by_key(|p| p.part_number);

        self.check_cancelled()?;
        self.complete(&object_path, &upload_id, &parts).await?;
        info!(%object_path, parts = parts.len(), bytes_sent, "upload completed");

        Ok(CompletedUpload {
            object_path,
            upload_id,
            parts,
            bytes_sent,
        })
    }

    /// Opens the upload session, returning its opaque identifier.
    async fn create_session(
        &mut self,
        object_path: &str,
        content_type: Option<&str>,
    ) -> Result<String, UploadError> {
        self.refresh_tokens().await?;

        let username = self.session.username().map(str::to_string);
        let query = queries::create_multipart_upload_session(
            object_path,
            content_type,
            username.as_deref(),
        );
        let resp = self
            .session
            .graphql(&query)
            .await
            .map_err(|e| UploadError::SessionCreate { detail: detail(e) })?;

        match queries::string_field(&resp, "createMultipartUploadSession") {
            Some(id) => Ok(id.to_string()),
            None => Err(UploadError::SessionCreate {
                detail: format!("malformed response: {resp}"),
            }),
        }
    }

    /// Presigns and PUTs one chunk, with bounded in-place retries.
    async fn transfer_chunk(
        &mut self,
        object_path: &str,
        upload_id: &str,
        chunk: Chunk,
    ) -> Result<String, UploadError> {
        let part_number = chunk.part_number;
        // Bytes clones are refcounted, so a retry reuses the same buffer.
        let body = Bytes::from(chunk.data);
        let mut attempt = 0;
        loop {
            match self
                .try_transfer_chunk(object_path, upload_id, part_number, body.clone())
                .await
            {
                Ok(etag) => return Ok(etag),
                Err(err @ UploadError::ChunkTransfer { .. }) if attempt < self.chunk_retries => {
                    attempt += 1;
                    warn!(
                        part_number,
                        attempt,
                        error = %err,
                        "chunk transfer failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(250 << attempt.min(6))).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_transfer_chunk(
        &mut self,
        object_path: &str,
        upload_id: &str,
        part_number: u64,
        body: Bytes,
    ) -> Result<String, UploadError> {
        self.refresh_tokens().await?;
        if let Ok(remaining) = self.session.time_remaining(Some(self.refresh_lookahead)) {
            debug!(part_number, remaining_secs = remaining.num_seconds(), "token window");
        }

        let query = queries::presigned_url_for_chunk(object_path, upload_id, part_number);
        let resp = self.session.graphql(&query).await.map_err(|e| {
            UploadError::ChunkTransfer {
                part_number,
                detail: format!("presign failed: {}", detail(e)),
            }
        })?;
        let presigned_url = queries::string_field(&resp, "getPreSignedUrlForChunk")
            .ok_or_else(|| UploadError::ChunkTransfer {
                part_number,
                detail: format!("malformed presign response: {resp}"),
            })?
            .to_string();

        // Direct PUT to object storage: the presigned URL embeds its own
        // authorization, the bearer token must not be attached.
        let put = self
            .session
            .http()
            .put(&presigned_url)
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::ChunkTransfer {
                part_number,
                detail: format!("PUT failed: {e}"),
            })?;

        let status = put.status();
        if !status.is_success() {
            return Err(UploadError::ChunkTransfer {
                part_number,
                detail: format!("PUT returned status {status}"),
            });
        }

        let etag = put
            .headers()
            .get("ETag")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| UploadError::ChunkTransfer {
                part_number,
                detail: "PUT response missing ETag header".into(),
            })?;
        Ok(etag.to_string())
    }

    /// Issues the completion call and verifies the embedded success marker.
    async fn complete(
        &mut self,
        object_path: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), UploadError> {
        self.refresh_tokens().await?;

        let query = queries::complete_multipart_upload(object_path, upload_id, parts);
        let resp = self
            .session
            .graphql(&query)
            .await
            .map_err(|e| UploadError::Completion { detail: detail(e) })?;

        // The API can answer 200 with an embedded failure; only the marker
        // in the body counts.
        let marker = queries::string_field(&resp, "completeMultiPartUpload");
        if !marker.is_some_and(|m| m.contains(COMPLETE_SUCCESS_MARKER)) {
            return Err(UploadError::Completion {
                detail: format!("missing success marker: {resp}"),
            });
        }
        Ok(())
    }

    async fn refresh_tokens(&mut self) -> Result<(), UploadError> {
        if self
            .session
            .refresh_if_expiring_within(Some(self.refresh_lookahead))
            .await?
        {
            debug!("token refreshed mid-upload");
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn detail(err: ClientError) -> String {
    match err {
        ClientError::Api { status, body } => format!("status {status}: {body}"),
        other => other.to_string(),
    }
}
