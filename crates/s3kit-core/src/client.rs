//! The S3 client handle.
//!
//! [`S3Client`] bundles the configuration, the [`Signer`] and the
//! [`HttpTransport`]. It is cheap to clone: all clones share the same inner
//! state, so one client can serve many concurrent tasks. Operations are
//! implemented in the `ops` submodules and in the multipart, upload
//! and sync modules as further `impl S3Client` blocks.

use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use s3kit_model::S3ErrorResponse;
use tracing::debug;

use crate::config::S3ClientConfig;
use crate::error::S3ClientError;
use crate::signer::{SigV4Signer, SignableRequest, Signer};
use crate::transport::{HttpTransport, ReqwestTransport, RequestBody, ResponseBody};

/// Client for an S3-compatible object store.
///
/// # Examples
///
/// ```
/// use s3kit_core::{S3Client, S3ClientConfig};
///
/// let client = S3Client::from_config(S3ClientConfig::default()).unwrap();
/// assert_eq!(client.config().region, "us-east-1");
/// ```
#[derive(Debug, Clone)]
pub struct S3Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    config: S3ClientConfig,
    signer: Arc<dyn Signer>,
    transport: Arc<dyn HttpTransport>,
}

/// How a request is authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SigningMode {
    /// Authentication carried in the URL query.
    Presigned,
    /// `Authorization` header.
    Headers,
}

/// An operation request before signing.
#[derive(Debug)]
pub(crate) struct S3Request<'a> {
    pub method: Method,
    pub bucket: &'a str,
    pub key: Option<&'a str>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub signing: SigningMode,
}

impl<'a> S3Request<'a> {
    pub(crate) fn new(method: Method, bucket: &'a str, key: Option<&'a str>) -> Self {
        Self {
            method,
            bucket,
            key,
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            signing: SigningMode::Presigned,
        }
    }

    pub(crate) fn query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_owned(), value.into()));
        self
    }

    pub(crate) fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub(crate) fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    pub(crate) fn signed_with_headers(mut self) -> Self {
        self.signing = SigningMode::Headers;
        self
    }
}

impl S3Client {
    /// Create a client with injected signing and transport capabilities.
    #[must_use]
    pub fn new(
        config: S3ClientConfig,
        signer: Arc<dyn Signer>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                signer,
                transport,
            }),
        }
    }

    /// Create a client with a [`SigV4Signer`] over the configured static
    /// credentials and a [`ReqwestTransport`].
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::InvalidConfig`] if the configuration is invalid.
    pub fn from_config(config: S3ClientConfig) -> Result<Self, S3ClientError> {
        config.validate()?;
        let signer = SigV4Signer::from_config(&config)?;
        Ok(Self::new(
            config,
            Arc::new(signer),
            Arc::new(ReqwestTransport::new()),
        ))
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &S3ClientConfig {
        &self.inner.config
    }

    /// Effective bound on in-flight requests for bulk operations.
    pub(crate) fn concurrency(&self) -> usize {
        self.inner.config.max_concurrent_requests.max(1)
    }

    /// Sign and send a request, returning the response whatever its status.
    pub(crate) async fn send(
        &self,
        request: S3Request<'_>,
    ) -> Result<http::Response<ResponseBody>, S3ClientError> {
        let signable = SignableRequest {
            method: request.method.clone(),
            bucket: request.bucket,
            key: request.key,
            query: &request.query,
            headers: &request.headers,
        };
        let signed = match request.signing {
            SigningMode::Presigned => self
                .inner
                .signer
                .presign(&signable, self.inner.config.presign_expires())?,
            SigningMode::Headers => self
                .inner
                .signer
                .sign(&signable, request.body.as_bytes())?,
        };

        let mut builder = http::Request::builder()
            .method(request.method.clone())
            .uri(signed.url.as_str());
        for (name, value) in &signed.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let http_request = builder
            .body(request.body)
            .map_err(|e| S3ClientError::Protocol(format!("invalid request: {e}")))?;

        let response = self.inner.transport.send(http_request).await?;

        debug!(
            method = %request.method,
            bucket = %request.bucket,
            key = request.key.unwrap_or_default(),
            status = %response.status(),
            "s3 request completed"
        );

        Ok(response)
    }

    /// Produce a presigned URL for a single operation.
    ///
    /// `expires_in` defaults to the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Signing`] if the URL cannot be signed.
    pub fn presigned_url(
        &self,
        method: Method,
        bucket: &str,
        key: &str,
        expires_in: Option<Duration>,
    ) -> Result<String, S3ClientError> {
        let signed = self.inner.signer.presign(
            &SignableRequest {
                method,
                bucket,
                key: Some(key),
                query: &[],
                headers: &[],
            },
            expires_in.unwrap_or_else(|| self.inner.config.presign_expires()),
        )?;
        Ok(signed.url)
    }
}

/// Return the response if its status is a success, otherwise decode the error.
pub(crate) async fn expect_success(
    response: http::Response<ResponseBody>,
) -> Result<http::Response<ResponseBody>, S3ClientError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(error_from_response(response).await)
    }
}

/// Build a [`S3ClientError::Service`] from an error response.
///
/// A body that is not an `<Error>` document with a `Code` falls back to the
/// status reason as the code and the raw body as the message.
pub(crate) async fn error_from_response(response: http::Response<ResponseBody>) -> S3ClientError {
    let status = response.status();
    let request_id = response
        .headers()
        .get("x-amz-request-id")
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);
    let body = match response.into_body().collect().await {
        Ok(body) => body,
        Err(e) => return e.into(),
    };

    match s3kit_xml::from_xml::<S3ErrorResponse>(&body) {
        Ok(error) if !error.code.is_empty() => service_error(status, error),
        _ => S3ClientError::Service {
            status,
            code: status
                .canonical_reason()
                .unwrap_or("Unknown")
                .replace(' ', ""),
            message: String::from_utf8_lossy(&body).into_owned(),
            resource: None,
            request_id,
        },
    }
}

/// Turn a decoded error document into a [`S3ClientError::Service`].
pub(crate) fn service_error(status: StatusCode, error: S3ErrorResponse) -> S3ClientError {
    S3ClientError::Service {
        status,
        code: error.code,
        message: error.message,
        resource: error.resource,
        request_id: error.request_id,
    }
}

/// The `ETag` response header.
pub(crate) fn etag_header(response: &http::Response<ResponseBody>) -> Option<String> {
    response
        .headers()
        .get(http::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
}

/// Whether a status means "the thing is not there".
pub(crate) fn is_not_found(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND
}
