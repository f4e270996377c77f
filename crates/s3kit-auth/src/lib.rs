//! AWS Signature Version 4 request signing for s3kit.
//!
//! This crate implements the signing side of SigV4: given a request description
//! and a set of credentials, it produces either the headers of a signed request
//! (`Authorization`, `x-amz-date`, `x-amz-content-sha256`) or the query string
//! of a presigned URL.
//!
//! # Usage
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use s3kit_auth::credentials::Credentials;
//! use s3kit_auth::sigv4::{RequestToSign, SigningScope, sign_request, UNSIGNED_PAYLOAD};
//!
//! let credentials = Credentials::new("AKIDEXAMPLE", "secret");
//! let scope = SigningScope::s3("us-east-1", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
//! let headers = vec![("host".to_owned(), "localhost:9000".to_owned())];
//! let request = RequestToSign {
//!     method: "GET",
//!     path: "/bucket/key.txt",
//!     query: &[],
//!     headers: &headers,
//!     payload_hash: UNSIGNED_PAYLOAD,
//! };
//! let signed = sign_request(&credentials, &scope, &request).unwrap();
//! assert!(signed.authorization().unwrap().starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240101/"));
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - Canonical request construction
//! - [`credentials`] - Credentials and credential providers
//! - [`error`] - Signing error type
//! - [`presigned`] - Presigned URL query generation
//! - [`sigv4`] - Signing key derivation and header signing

pub mod canonical;
pub mod credentials;
pub mod error;
pub mod presigned;
pub mod sigv4;

pub use credentials::{CredentialProvider, Credentials, EnvCredentialProvider, StaticCredentialProvider};
pub use error::AuthError;
pub use presigned::{PresignedQuery, presign_url};
pub use sigv4::{RequestToSign, SignedHeaders, SigningScope, UNSIGNED_PAYLOAD, hash_payload, sign_request};
