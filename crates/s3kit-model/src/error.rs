//! The S3 error document.

use serde::{Deserialize, Serialize};

/// Decoded `<Error>` body returned by S3-compatible services on failure.
///
/// `code` and `message` decode as the empty string when the provider omits
/// them; some failures (e.g. `HEAD` requests, proxies) carry no body at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3ErrorResponse {
    /// Machine-readable error code such as `NoSuchKey` or `AccessDenied`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// The bucket or key the error refers to.
    pub resource: Option<String>,
    /// Provider request identifier, useful when reporting issues.
    pub request_id: Option<String>,
}
