//! Geodex catalog client.
//!
//! A native Rust client for the Geodex catalog's GraphQL cloud-file API.
//! The centerpiece is the chunked multipart upload protocol: create an
//! upload session, PUT each chunk to a short-lived presigned URL, collect
//! the returned ETags, and complete the session with the ordered part list.
//! Token refresh is interleaved so a long transfer never outlives its
//! bearer token.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use geodex_client::{CatalogSession, Environment, MultipartUploader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = CatalogSession::new(Environment::Production);
//!     session.login("science_user", "password").await?;
//!
//!     let result = MultipartUploader::new(&mut session)
//!         .upload(
//!             "4f4e4b24e4b07f02db6aea14",
//!             Path::new("data/survey.tif"),
//!             None,
//!             Some("image/tiff"),
//!         )
//!         .await?;
//!
//!     println!("uploaded {} parts as {}", result.parts.len(), result.object_path);
//!     Ok(())
//! }
//! ```

mod error;
mod queries;
mod session;
#[cfg(test)]
mod testing;
mod upload;

pub use error::{ClientError, UploadError};
pub use queries::CompletedPart;
pub use session::{CatalogSession, Environment};
pub use upload::{CompletedUpload, MultipartUploader};
