//! GraphQL query construction for the cloud-file upload operations.
//!
//! The catalog API accepts these as plain `query { ... }` strings; arguments
//! are interpolated, so every inserted string goes through [`escape`].

use serde_json::Value;

/// Marker substring the completion reply must carry to count as success.
///
/// The API can return HTTP 200 with an embedded failure indicator, so the
/// body is authoritative, never the status code.
pub(crate) const COMPLETE_SUCCESS_MARKER: &str = "Successful";

/// One finished part: its 1-based number and the ETag object storage
/// returned for it. The completion call needs the full ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u64,
    pub etag: String,
}

/// Query opening a multipart upload session for `object`.
///
/// `content_type` and `username` are optional newer-API fields; they are
/// omitted from the query when absent.
pub(crate) fn create_multipart_upload_session(
    object: &str,
    content_type: Option<&str>,
    username: Option<&str>,
) -> String {
    let mut args = format!("object: \"{}\"", escape(object));
    if let Some(content_type) = content_type {
        args.push_str(&format!(", contentType: \"{}\"", escape(content_type)));
    }
    if let Some(username) = username {
        args.push_str(&format!(", username: \"{}\"", escape(username)));
    }
    format!("query {{ createMultipartUploadSession({args}) }}")
}

/// Query requesting a presigned PUT URL for one part.
///
/// The API takes the part number as a quoted string.
pub(crate) fn presigned_url_for_chunk(object: &str, upload_id: &str, part_number: u64) -> String {
    format!(
        "query {{ getPreSignedUrlForChunk(object: \"{}\", upload_id: \"{}\", part_number: \"{part_number}\") }}",
        escape(object),
        escape(upload_id),
    )
}

/// Query completing the session with the ordered part list.
///
/// `parts_eTags` entries use bare field names and quoted ETags; ETag header
/// values from object storage already carry their surrounding quotes, which
/// [`quote_etag`] preserves.
pub(crate) fn complete_multipart_upload(
    object: &str,
    upload_id: &str,
    parts: &[CompletedPart],
) -> String {
    let entries: Vec<String> = parts
        .iter()
        .map(|p| format!("{{ETag: {}, PartNumber: {}}}", quote_etag(&p.etag), p.part_number))
        .collect();
    format!(
        "query {{ completeMultiPartUpload(object: \"{}\", upload_id: \"{}\", parts_eTags: [{}]) }}",
        escape(object),
        escape(upload_id),
        entries.join(", "),
    )
}

/// Extracts a string-valued operation result from a GraphQL reply body.
pub(crate) fn string_field<'a>(resp: &'a Value, field: &str) -> Option<&'a str> {
    resp.get("data")?.get(field)?.as_str()
}

/// Returns the ETag wrapped in double quotes, preserving quotes it already
/// has (S3-style `ETag` headers arrive pre-quoted).
fn quote_etag(etag: &str) -> String {
    if etag.starts_with('"') && etag.ends_with('"') && etag.len() >= 2 {
        etag.to_string()
    } else {
        format!("\"{}\"", escape(etag))
    }
}

/// Escapes backslashes and double quotes for interpolation into a query.
fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
