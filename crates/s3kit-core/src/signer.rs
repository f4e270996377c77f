//! Request signing abstraction.
//!
//! A [`Signer`] turns a bucket/key/method/parameters description into either a
//! presigned URL or a URL plus signed headers. Object, listing and multipart
//! operations use presigned URLs; bucket policy and website configuration use
//! header signing because some providers refuse presigned requests for them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use http::{Method, Uri};
use s3kit_auth::canonical::uri_encode_path;
use s3kit_auth::sigv4::{RequestToSign, SigningScope, UNSIGNED_PAYLOAD, hash_payload, sign_request};
use s3kit_auth::{AuthError, CredentialProvider, Credentials, StaticCredentialProvider, presign_url};

use crate::config::{AddressingStyle, S3ClientConfig};
use crate::error::S3ClientError;

/// What to sign.
#[derive(Debug, Clone)]
pub struct SignableRequest<'a> {
    /// HTTP method.
    pub method: Method,
    /// Bucket name.
    pub bucket: &'a str,
    /// Object key, absent for bucket-level operations.
    pub key: Option<&'a str>,
    /// Raw (unencoded) query parameters.
    pub query: &'a [(String, String)],
    /// Extra headers, such as those produced by `ObjectParams::to_headers`.
    pub headers: &'a [(String, String)],
}

/// A request ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Full URL, including the query string.
    pub url: String,
    /// Headers that must be sent with the request.
    pub headers: Vec<(String, String)>,
}

/// Builds authenticated requests.
pub trait Signer: Send + Sync + fmt::Debug {
    /// Produce a presigned URL valid for `expires_in`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if credentials are missing or the lifetime is out of range.
    fn presign(
        &self,
        request: &SignableRequest<'_>,
        expires_in: Duration,
    ) -> Result<SignedRequest, AuthError>;

    /// Produce a URL and `Authorization` headers for a direct signed request.
    ///
    /// `payload` is the buffered body to hash; `None` signs `UNSIGNED-PAYLOAD`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if credentials are missing.
    fn sign(
        &self,
        request: &SignableRequest<'_>,
        payload: Option<&[u8]>,
    ) -> Result<SignedRequest, AuthError>;
}

/// AWS Signature Version 4 [`Signer`].
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    credentials: Arc<dyn CredentialProvider>,
    region: String,
    scheme: String,
    authority: String,
    base_path: String,
    addressing_style: AddressingStyle,
}

impl SigV4Signer {
    /// Create a signer for an endpoint URL such as `https://s3.fr-par.scw.cloud`.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::InvalidConfig`] if the endpoint has no host.
    pub fn new(
        endpoint_url: &str,
        region: impl Into<String>,
        addressing_style: AddressingStyle,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, S3ClientError> {
        let uri: Uri = endpoint_url.parse().map_err(|e| {
            S3ClientError::InvalidConfig(format!("invalid endpoint url {endpoint_url}: {e}"))
        })?;
        let scheme = uri.scheme_str().unwrap_or("https").to_owned();
        let authority = uri.authority().ok_or_else(|| {
            S3ClientError::InvalidConfig(format!("endpoint url {endpoint_url} has no host"))
        })?;

        let default_port = match scheme.as_str() {
            "http" => Some(80),
            "https" => Some(443),
            _ => None,
        };
        let authority = match authority.port_u16() {
            Some(port) if Some(port) == default_port => authority.host().to_owned(),
            _ => authority.as_str().to_owned(),
        };

        Ok(Self {
            credentials,
            region: region.into(),
            scheme,
            authority,
            base_path: uri.path().trim_end_matches('/').to_owned(),
            addressing_style,
        })
    }

    /// Create a signer with static credentials taken from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::InvalidConfig`] if the endpoint is invalid.
    pub fn from_config(config: &S3ClientConfig) -> Result<Self, S3ClientError> {
        let mut credentials =
            Credentials::new(config.access_key_id.clone(), config.secret_access_key.clone());
        credentials.session_token.clone_from(&config.session_token);
        Self::new(
            &config.endpoint_url,
            config.region.clone(),
            config.addressing_style,
            Arc::new(StaticCredentialProvider::new(credentials)),
        )
    }

    /// Host and raw path of a request under the configured addressing style.
    fn host_and_path(&self, bucket: &str, key: Option<&str>) -> (String, String) {
        let key = key.unwrap_or_default();
        match self.addressing_style {
            AddressingStyle::Path => {
                let path = if key.is_empty() {
                    format!("{}/{bucket}", self.base_path)
                } else {
                    format!("{}/{bucket}/{key}", self.base_path)
                };
                (self.authority.clone(), path)
            }
            AddressingStyle::Virtual => (
                format!("{bucket}.{}", self.authority),
                format!("{}/{key}", self.base_path),
            ),
        }
    }

    fn url(&self, host: &str, path: &str, query: &str) -> String {
        let mut url = format!("{}://{host}{}", self.scheme, uri_encode_path(path));
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Presign at a fixed instant.
    ///
    /// # Errors
    ///
    /// See [`Signer::presign`].
    pub fn presign_at(
        &self,
        request: &SignableRequest<'_>,
        expires_in: Duration,
        timestamp: DateTime<Utc>,
    ) -> Result<SignedRequest, AuthError> {
        let credentials = self.credentials.credentials()?;
        let (host, path) = self.host_and_path(request.bucket, request.key);

        let mut headers = Vec::with_capacity(request.headers.len() + 1);
        headers.push(("host".to_owned(), host.clone()));
        headers.extend(request.headers.iter().cloned());

        let presigned = presign_url(
            &credentials,
            &SigningScope::s3(self.region.clone(), timestamp),
            expires_in.as_secs(),
            &RequestToSign {
                method: request.method.as_str(),
                path: &path,
                query: request.query,
                headers: &headers,
                payload_hash: UNSIGNED_PAYLOAD,
            },
        )?;

        Ok(SignedRequest {
            url: self.url(&host, &path, &presigned.query),
            headers: presigned.signed_headers,
        })
    }

    /// Header-sign at a fixed instant.
    ///
    /// # Errors
    ///
    /// See [`Signer::sign`].
    pub fn sign_at(
        &self,
        request: &SignableRequest<'_>,
        payload: Option<&[u8]>,
        timestamp: DateTime<Utc>,
    ) -> Result<SignedRequest, AuthError> {
        let credentials = self.credentials.credentials()?;
        let (host, path) = self.host_and_path(request.bucket, request.key);

        let mut headers = Vec::with_capacity(request.headers.len() + 1);
        headers.push(("host".to_owned(), host.clone()));
        headers.extend(request.headers.iter().cloned());

        let payload_hash = payload.map_or_else(|| UNSIGNED_PAYLOAD.to_owned(), hash_payload);
        let signed = sign_request(
            &credentials,
            &SigningScope::s3(self.region.clone(), timestamp),
            &RequestToSign {
                method: request.method.as_str(),
                path: &path,
                query: request.query,
                headers: &headers,
                payload_hash: &payload_hash,
            },
        )?;

        let query = s3kit_auth::canonical::build_canonical_query_string(request.query);
        let mut out_headers: Vec<(String, String)> = request.headers.to_vec();
        out_headers.extend(signed.headers);

        Ok(SignedRequest {
            url: self.url(&host, &path, &query),
            headers: out_headers,
        })
    }
}

impl Signer for SigV4Signer {
    fn presign(
        &self,
        request: &SignableRequest<'_>,
        expires_in: Duration,
    ) -> Result<SignedRequest, AuthError> {
        self.presign_at(request, expires_in, Utc::now())
    }

    fn sign(
        &self,
        request: &SignableRequest<'_>,
        payload: Option<&[u8]>,
    ) -> Result<SignedRequest, AuthError> {
        self.sign_at(request, payload, Utc::now())
    }
}
