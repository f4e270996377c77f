//! Error types for SigV4 signing.

/// Errors that can occur while signing a request or building a presigned URL.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credentials could be resolved.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// A header that must be signed (such as `host`) is missing.
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// A presigned URL lifetime outside of `1..=604800` seconds.
    #[error("Invalid presigned URL expiry: {0} seconds (must be between 1 and 604800)")]
    InvalidExpiry(u64),
}
