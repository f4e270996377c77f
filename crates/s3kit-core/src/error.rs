//! Client error taxonomy.
//!
//! A missing object or policy is never an error: the operations that can hit
//! one return `Option`. Everything else surfaces as an [`S3ClientError`] and is
//! never retried by the client.

use http::StatusCode;
use s3kit_auth::AuthError;
use s3kit_xml::XmlError;

use crate::multipart::MultipartState;
use crate::transport::TransportError;

/// Errors returned by [`crate::S3Client`] operations.
#[derive(Debug, thiserror::Error)]
pub enum S3ClientError {
    /// The service answered with a non-success status.
    #[error("S3 request failed with status {status}: {code}: {message}")]
    Service {
        /// HTTP status of the response.
        status: StatusCode,
        /// S3 error code (`AccessDenied`, `NoSuchBucket`, ...) or the status reason.
        code: String,
        /// Error message from the response body.
        message: String,
        /// The resource named in the error document.
        resource: Option<String>,
        /// Provider request identifier, from the body or `x-amz-request-id`.
        request_id: Option<String>,
    },

    /// The request could not be sent or the response body could not be read.
    #[error("HTTP transport error: {0}")]
    Http(#[from] TransportError),

    /// The service response does not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A response document could not be decoded.
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    /// A multipart upload operation was called in the wrong state.
    #[error("cannot {operation} multipart upload {upload_id:?} in state {state}")]
    InvalidState {
        /// Upload ID, if the upload was created.
        upload_id: Option<String>,
        /// State the session was in.
        state: MultipartState,
        /// The rejected operation.
        operation: &'static str,
    },

    /// The request could not be signed.
    #[error("signing error: {0}")]
    Signing(#[from] AuthError),

    /// A local file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Some keys of a bulk delete failed. Every key was attempted.
    #[error("failed to delete {} of {} keys", .failures.len(), .deleted.len() + .failures.len())]
    PartialDelete {
        /// Keys that were deleted.
        deleted: Vec<String>,
        /// Keys that could not be deleted, with the reason.
        failures: Vec<(String, S3ClientError)>,
    },

    /// A listing filter expression could not be parsed.
    #[error("invalid filter expression: {0}")]
    InvalidFilter(String),

    /// The client configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl S3ClientError {
    /// The HTTP status of a service error.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this is a service error with status 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}
