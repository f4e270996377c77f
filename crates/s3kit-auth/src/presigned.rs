//! Presigned URL generation for AWS Signature Version 4.
//!
//! A presigned URL carries its authentication in query parameters:
//!
//! - `X-Amz-Algorithm` - `AWS4-HMAC-SHA256`
//! - `X-Amz-Credential` - `AKID/date/region/service/aws4_request`
//! - `X-Amz-Date` - ISO 8601 basic format timestamp (`YYYYMMDDTHHMMSSZ`)
//! - `X-Amz-Expires` - Validity duration in seconds
//! - `X-Amz-SignedHeaders` - Semicolon-separated signed header names
//! - `X-Amz-Signature` - The hex-encoded signature
//!
//! `x-amz-*` request headers (ACL, storage class, user metadata, ...) are moved
//! into the query so that the URL alone carries them. Any other header stays a
//! signed header that the caller must send verbatim.

use tracing::debug;

use crate::canonical::{build_canonical_query_string, build_canonical_request, build_signed_headers_string};
use crate::credentials::Credentials;
use crate::error::AuthError;
use crate::sigv4::{ALGORITHM, RequestToSign, SigningScope, sign_canonical_request};

/// Longest lifetime S3 accepts for a presigned URL (seven days).
pub const MAX_PRESIGN_EXPIRES_SECS: u64 = 604_800;

/// The query string of a presigned request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedQuery {
    /// Encoded, sorted query string including `X-Amz-Signature`.
    pub query: String,
    /// Non-`x-amz-*` headers that were signed and must accompany the request.
    pub signed_headers: Vec<(String, String)>,
    /// The hex-encoded signature.
    pub signature: String,
}

/// Presign a request valid for `expires_secs` seconds from `scope.timestamp`.
///
/// `request.payload_hash` is normally [`crate::sigv4::UNSIGNED_PAYLOAD`].
///
/// # Errors
///
/// Returns [`AuthError::InvalidExpiry`] for a lifetime outside `1..=604800`
/// and [`AuthError::MissingHeader`] when `host` is absent.
pub fn presign_url(
    credentials: &Credentials,
    scope: &SigningScope,
    expires_secs: u64,
    request: &RequestToSign<'_>,
) -> Result<PresignedQuery, AuthError> {
    if expires_secs == 0 || expires_secs > MAX_PRESIGN_EXPIRES_SECS {
        return Err(AuthError::InvalidExpiry(expires_secs));
    }

    let mut query: Vec<(String, String)> = request.query.to_vec();
    let mut header_pairs: Vec<(String, String)> = Vec::new();
    for (name, value) in request.headers {
        let lower = name.to_lowercase();
        if lower.starts_with("x-amz-") {
            query.push((lower, value.clone()));
        } else {
            header_pairs.push((lower, value.clone()));
        }
    }

    if !header_pairs.iter().any(|(name, _)| name == "host") {
        return Err(AuthError::MissingHeader("host".to_owned()));
    }

    let mut signed_names: Vec<&str> = header_pairs.iter().map(|(n, _)| n.as_str()).collect();
    signed_names.sort_unstable();
    signed_names.dedup();

    query.push(("X-Amz-Algorithm".to_owned(), ALGORITHM.to_owned()));
    query.push((
        "X-Amz-Credential".to_owned(),
        format!("{}/{}", credentials.access_key_id, scope.credential_scope()),
    ));
    query.push(("X-Amz-Date".to_owned(), scope.amz_date()));
    query.push(("X-Amz-Expires".to_owned(), expires_secs.to_string()));
    query.push((
        "X-Amz-SignedHeaders".to_owned(),
        build_signed_headers_string(&signed_names),
    ));
    if let Some(ref token) = credentials.session_token {
        query.push(("X-Amz-Security-Token".to_owned(), token.clone()));
    }

    let header_refs: Vec<(&str, &str)> = header_pairs
        .iter()
        .map(|(n, v)| (n.as_str(), v.as_str()))
        .collect();
    let canonical_request = build_canonical_request(
        request.method,
        request.path,
        &query,
        &header_refs,
        &signed_names,
        request.payload_hash,
    );

    debug!(canonical_request, expires_secs, "built presigned canonical request");

    let signature =
        sign_canonical_request(&canonical_request, scope, &credentials.secret_access_key);
    let query = format!(
        "{}&X-Amz-Signature={signature}",
        build_canonical_query_string(&query)
    );

    let signed_headers = header_pairs
        .into_iter()
        .filter(|(name, _)| name != "host")
        .collect();

    Ok(PresignedQuery {
        query,
        signed_headers,
        signature,
    })
}
