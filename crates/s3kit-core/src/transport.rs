//! HTTP transport abstraction.
//!
//! The client never talks to the network directly: every signed request goes
//! through an [`HttpTransport`]. [`ReqwestTransport`] is the default
//! implementation; tests inject an in-memory one. The transport owns timeout
//! and connection policy.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, TryStreamExt};

/// A boxed stream of body fragments.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Errors raised by a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or no response was received.
    #[error("request failed: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Reading a body stream failed.
    #[error("body error: {0}")]
    Body(#[from] std::io::Error),

    /// The request could not be converted for the underlying client.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Body of an outgoing request.
pub enum RequestBody {
    /// No body.
    Empty,
    /// A buffered body.
    Bytes(Bytes),
    /// A streamed body, with its length when known.
    Stream {
        /// The body fragments.
        stream: ByteStream,
        /// Total length, sent as `Content-Length`.
        length: Option<u64>,
    },
}

impl RequestBody {
    /// The body length, if known without consuming it.
    #[must_use]
    pub fn len(&self) -> Option<u64> {
        match self {
            Self::Empty => Some(0),
            Self::Bytes(b) => Some(b.len() as u64),
            Self::Stream { length, .. } => *length,
        }
    }

    /// Whether the body is known to be empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// The buffered payload, for signers that hash it.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Empty => Some(&[]),
            Self::Bytes(b) => Some(b),
            Self::Stream { .. } => None,
        }
    }

    /// Read the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Body`] if the stream fails.
    pub async fn collect(self) -> Result<Bytes, TransportError> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Bytes(b) => Ok(b),
            Self::Stream { stream, .. } => collect_stream(stream).await,
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Stream { length, .. } => f.debug_struct("Stream").field("length", length).finish(),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

/// Body of an incoming response, consumed either whole or as a stream.
pub struct ResponseBody {
    stream: ByteStream,
}

impl ResponseBody {
    /// An empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_stream(futures::stream::empty())
    }

    /// A body made of a single buffer.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self::from_stream(futures::stream::once(async move { Ok(bytes) }))
    }

    /// A body backed by a stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
        }
    }

    /// Read the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Body`] if the stream fails.
    pub async fn collect(self) -> Result<Bytes, TransportError> {
        collect_stream(self.stream).await
    }

    /// The body as a stream of fragments.
    #[must_use]
    pub fn into_stream(self) -> ByteStream {
        self.stream
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody").finish_non_exhaustive()
    }
}

async fn collect_stream(mut stream: ByteStream) -> Result<Bytes, TransportError> {
    let mut buf = BytesMut::new();
    while let Some(fragment) = stream.next().await {
        buf.extend_from_slice(&fragment?);
    }
    Ok(buf.freeze())
}

/// Sends HTTP requests on behalf of the client.
///
/// Implementations must support streamed request bodies of known or unknown
/// length and return response bodies as streams.
#[async_trait]
pub trait HttpTransport: Send + Sync + fmt::Debug {
    /// Send a request and return the response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on connection-level failures only; HTTP
    /// error statuses are returned as responses.
    async fn send(
        &self,
        request: http::Request<RequestBody>,
    ) -> Result<http::Response<ResponseBody>, TransportError>;
}

/// [`HttpTransport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a default `reqwest` client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing `reqwest` client, e.g. one with custom timeouts.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: http::Request<RequestBody>,
    ) -> Result<http::Response<ResponseBody>, TransportError> {
        let (parts, body) = request.into_parts();

        let mut builder = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers);

        builder = match body {
            RequestBody::Empty => builder.header(http::header::CONTENT_LENGTH, 0),
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::Stream { stream, length } => {
                if let Some(len) = length {
                    builder = builder.header(http::header::CONTENT_LENGTH, len);
                }
                builder.body(reqwest::Body::wrap_stream(stream))
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Request(Box::new(e)))?;

        let status = response.status();
        let headers = response.headers().clone();
        let stream = response.bytes_stream().map_err(std::io::Error::other);

        let mut out = http::Response::new(ResponseBody::from_stream(stream));
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        Ok(out)
    }
}
