//! AWS Signature Version 4 header signing.
//!
//! 1. Build the canonical request from the method, path, query, headers and payload hash.
//! 2. Build the string to sign from the timestamp, credential scope and canonical request hash.
//! 3. Derive the signing key with the HMAC-SHA256 chain over date, region and service.
//! 4. Sign the string to sign and assemble the `Authorization` header.
//!
//! The main entry point is [`sign_request`].

use chrono::{DateTime, Utc};
use hmac::{Hmac, KeyInit, Mac};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::canonical::{build_canonical_request, build_signed_headers_string};
use crate::credentials::Credentials;
use crate::error::AuthError;

/// The signing algorithm.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Payload hash placeholder for bodies that are not hashed (presigned URLs, streams).
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

type HmacSha256 = Hmac<Sha256>;

/// Region, service and instant a signature is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningScope {
    /// Signing region, e.g. `us-east-1`.
    pub region: String,
    /// Signing service, `s3` for object storage.
    pub service: String,
    /// The request timestamp.
    pub timestamp: DateTime<Utc>,
}

impl SigningScope {
    /// A scope for the `s3` service.
    pub fn s3(region: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            region: region.into(),
            service: "s3".to_owned(),
            timestamp,
        }
    }

    /// The `YYYYMMDD` date component.
    #[must_use]
    pub fn date(&self) -> String {
        self.timestamp.format("%Y%m%d").to_string()
    }

    /// The ISO 8601 basic timestamp used in `x-amz-date` (`YYYYMMDDTHHMMSSZ`).
    #[must_use]
    pub fn amz_date(&self) -> String {
        self.timestamp.format("%Y%m%dT%H%M%SZ").to_string()
    }

    /// `date/region/service/aws4_request`.
    #[must_use]
    pub fn credential_scope(&self) -> String {
        format!("{}/{}/{}/aws4_request", self.date(), self.region, self.service)
    }
}

/// A request as it will be sent, before signing.
///
/// `path` and `query` are raw; they are percent-encoded during canonicalization.
/// `headers` must include `host`.
#[derive(Debug, Clone, Copy)]
pub struct RequestToSign<'a> {
    /// HTTP method.
    pub method: &'a str,
    /// Raw request path (`/bucket/key` or `/key` for virtual-hosted style).
    pub path: &'a str,
    /// Raw query parameters.
    pub query: &'a [(String, String)],
    /// Headers to sign, including `host`.
    pub headers: &'a [(String, String)],
    /// Hex SHA-256 of the body, or [`UNSIGNED_PAYLOAD`].
    pub payload_hash: &'a str,
}

/// Headers to add to a request so that it is authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// `x-amz-date`, `x-amz-content-sha256`, optional `x-amz-security-token`
    /// and `authorization`, in that order.
    pub headers: Vec<(String, String)>,
    /// The hex-encoded signature.
    pub signature: String,
}

impl SignedHeaders {
    /// The `Authorization` header value.
    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name == "authorization")
            .map(|(_, value)| value.as_str())
    }
}

/// Sign a request with the `Authorization` header scheme.
///
/// Every header of `request` is signed, together with the `x-amz-date`,
/// `x-amz-content-sha256` and (for temporary credentials)
/// `x-amz-security-token` headers this function adds.
///
/// # Errors
///
/// Returns [`AuthError::MissingHeader`] if the request has no `host` header.
pub fn sign_request(
    credentials: &Credentials,
    scope: &SigningScope,
    request: &RequestToSign<'_>,
) -> Result<SignedHeaders, AuthError> {
    if !request
        .headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case("host"))
    {
        return Err(AuthError::MissingHeader("host".to_owned()));
    }

    let amz_date = scope.amz_date();
    let mut added: Vec<(String, String)> = vec![
        ("x-amz-date".to_owned(), amz_date.clone()),
        (
            "x-amz-content-sha256".to_owned(),
            request.payload_hash.to_owned(),
        ),
    ];
    if let Some(ref token) = credentials.session_token {
        added.push(("x-amz-security-token".to_owned(), token.clone()));
    }

    let lowered: Vec<(String, &str)> = request
        .headers
        .iter()
        .chain(added.iter())
        .map(|(name, value)| (name.to_lowercase(), value.as_str()))
        .collect();
    let header_pairs: Vec<(&str, &str)> = lowered.iter().map(|(n, v)| (n.as_str(), *v)).collect();

    let mut signed_names: Vec<&str> = header_pairs.iter().map(|(n, _)| *n).collect();
    signed_names.sort_unstable();
    signed_names.dedup();

    let canonical_request = build_canonical_request(
        request.method,
        request.path,
        request.query,
        &header_pairs,
        &signed_names,
        request.payload_hash,
    );

    debug!(canonical_request, "built canonical request");

    let signature = sign_canonical_request(&canonical_request, scope, &credentials.secret_access_key);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{},SignedHeaders={},Signature={signature}",
        credentials.access_key_id,
        scope.credential_scope(),
        build_signed_headers_string(&signed_names),
    );

    added.push(("authorization".to_owned(), authorization));

    Ok(SignedHeaders {
        headers: added,
        signature,
    })
}

/// Hash the canonical request, build the string to sign and sign it.
pub(crate) fn sign_canonical_request(
    canonical_request: &str,
    scope: &SigningScope,
    secret_key: &str,
) -> String {
    let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    let string_to_sign =
        build_string_to_sign(&scope.amz_date(), &scope.credential_scope(), &canonical_hash);

    debug!(string_to_sign, "built string to sign");

    let signing_key = derive_signing_key(secret_key, &scope.date(), &scope.region, &scope.service);
    compute_signature(&signing_key, &string_to_sign)
}

/// Build the SigV4 string to sign.
///
/// ```text
/// AWS4-HMAC-SHA256\n
/// <ISO8601 timestamp>\n
/// <credential_scope>\n
/// <hex(SHA256(canonical_request))>
/// ```
#[must_use]
pub fn build_string_to_sign(
    timestamp: &str,
    credential_scope: &str,
    canonical_request_hash: &str,
) -> String {
    format!("{ALGORITHM}\n{timestamp}\n{credential_scope}\n{canonical_request_hash}")
}

/// Derive the SigV4 signing key using the HMAC-SHA256 chain.
///
/// ```text
/// DateKey              = HMAC-SHA256("AWS4" + secret_key, date)
/// DateRegionKey        = HMAC-SHA256(DateKey, region)
/// DateRegionServiceKey = HMAC-SHA256(DateRegionKey, service)
/// SigningKey           = HMAC-SHA256(DateRegionServiceKey, "aws4_request")
/// ```
#[must_use]
pub fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let date_key = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let date_region_key = hmac_sha256(&date_key, region.as_bytes());
    let date_region_service_key = hmac_sha256(&date_region_key, service.as_bytes());
    hmac_sha256(&date_region_service_key, b"aws4_request")
}

/// Compute the hex-encoded HMAC-SHA256 signature of `data`.
#[must_use]
pub fn compute_signature(signing_key: &[u8], data: &str) -> String {
    hex::encode(hmac_sha256(signing_key, data.as_bytes()))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Compute the hex SHA-256 of a payload, the `x-amz-content-sha256` value.
///
/// # Examples
///
/// ```
/// use s3kit_auth::sigv4::hash_payload;
///
/// assert_eq!(
///     hash_payload(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}
