//! Decoded results of S3 operations.

use http::StatusCode;

use crate::types::S3Object;

/// Result of a single-request object write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectOutput {
    /// HTTP status returned by the provider.
    pub status: StatusCode,
    /// The `ETag` response header, if present.
    pub etag: Option<String>,
}

/// Result of an object delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteObjectOutput {
    /// HTTP status returned by the provider. A 404 is reported as 204.
    pub status: StatusCode,
}

/// One page of a `ListObjectsV2` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsV2Output {
    /// Bucket name.
    pub name: Option<String>,
    /// Prefix the listing was restricted to.
    pub prefix: Option<String>,
    /// Objects of this page, in key order.
    pub contents: Vec<S3Object>,
    /// Whether more pages follow.
    pub is_truncated: bool,
    /// Token this page was requested with.
    pub continuation_token: Option<String>,
    /// Token for the next page, present when `is_truncated`.
    pub next_continuation_token: Option<String>,
    /// Number of keys in this page.
    pub key_count: Option<u32>,
    /// Page size the provider applied.
    pub max_keys: Option<u32>,
    /// `url` when keys in this page are percent-encoded.
    pub encoding_type: Option<String>,
    /// Key the listing started after, if one was given.
    pub start_after: Option<String>,
}

/// Result of `InitiateMultipartUpload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateMultipartUploadOutput {
    /// Bucket of the upload.
    pub bucket: Option<String>,
    /// Key of the upload.
    pub key: Option<String>,
    /// Identifier used by every later part, complete and abort request.
    pub upload_id: String,
}

/// Result of `CompleteMultipartUpload`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompleteMultipartUploadOutput {
    /// URL of the assembled object.
    pub location: Option<String>,
    /// Bucket of the object.
    pub bucket: Option<String>,
    /// Key of the object.
    pub key: Option<String>,
    /// Multipart `ETag` of the object (`"<md5>-<parts>"`).
    pub etag: Option<String>,
}
