//! Client configuration.
//!
//! Provides [`S3ClientConfig`] describing which endpoint to talk to and how.
//! Values can be loaded from environment variables with
//! [`S3ClientConfig::from_env`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::S3ClientError;

/// Default minimum multipart part size (5 MiB), the S3 lower bound for non-final parts.
pub const DEFAULT_MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// How the bucket name is placed in request URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressingStyle {
    /// `https://endpoint/bucket/key`, what MinIO and Garage expect.
    #[default]
    Path,
    /// `https://bucket.endpoint/key`.
    Virtual,
}

impl AddressingStyle {
    /// Returns the configuration string of this style.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Virtual => "virtual",
        }
    }
}

impl fmt::Display for AddressingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressingStyle {
    type Err = S3ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "path" => Ok(Self::Path),
            "virtual" | "virtual-hosted" => Ok(Self::Virtual),
            other => Err(S3ClientError::InvalidConfig(format!(
                "unknown addressing style: {other}"
            ))),
        }
    }
}

/// S3 client configuration.
///
/// # Examples
///
/// ```
/// use s3kit_core::config::S3ClientConfig;
///
/// let config = S3ClientConfig::builder()
///     .endpoint_url("http://localhost:9000".into())
///     .access_key_id("minioadmin".into())
///     .secret_access_key("minioadmin".into())
///     .build();
/// assert_eq!(config.region, "us-east-1");
/// assert_eq!(config.min_part_size, 5 * 1024 * 1024);
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase", default)]
pub struct S3ClientConfig {
    /// Base URL of the S3-compatible service.
    #[builder(default = String::from("http://localhost:9000"))]
    pub endpoint_url: String,

    /// Signing region.
    #[builder(default = String::from("us-east-1"))]
    pub region: String,

    /// Access key ID.
    #[builder(default)]
    pub access_key_id: String,

    /// Secret access key.
    #[builder(default)]
    pub secret_access_key: String,

    /// Session token for temporary credentials.
    #[builder(default)]
    pub session_token: Option<String>,

    /// Path-style or virtual-hosted-style URLs.
    #[builder(default)]
    pub addressing_style: AddressingStyle,

    /// Lifetime of presigned URLs, in seconds.
    #[builder(default = 3600)]
    pub presign_expires_secs: u64,

    /// Minimum size of every multipart part except the last.
    #[builder(default = DEFAULT_MIN_PART_SIZE)]
    pub min_part_size: usize,

    /// Upper bound on in-flight requests for bulk deletes (1 = sequential).
    #[builder(default = 1)]
    pub max_concurrent_requests: usize,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for S3ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::from("http://localhost:9000"),
            region: String::from("us-east-1"),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            session_token: None,
            addressing_style: AddressingStyle::Path,
            presign_expires_secs: 3600,
            min_part_size: DEFAULT_MIN_PART_SIZE,
            max_concurrent_requests: 1,
            log_level: String::from("info"),
        }
    }
}

impl fmt::Debug for S3ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3ClientConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("addressing_style", &self.addressing_style)
            .field("presign_expires_secs", &self.presign_expires_secs)
            .field("min_part_size", &self.min_part_size)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl S3ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Absent or unparsable values fall back to the defaults:
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `S3_ENDPOINT_URL` | `http://localhost:9000` |
    /// | `AWS_REGION` / `S3_REGION` | `us-east-1` |
    /// | `AWS_ACCESS_KEY_ID` | empty |
    /// | `AWS_SECRET_ACCESS_KEY` | empty |
    /// | `AWS_SESSION_TOKEN` | unset |
    /// | `S3_ADDRESSING_STYLE` | `path` |
    /// | `S3_PRESIGN_EXPIRES` | `3600` |
    /// | `S3_MIN_PART_SIZE` | `5242880` |
    /// | `S3_MAX_CONCURRENCY` | `1` |
    /// | `LOG_LEVEL` | `info` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("S3_ENDPOINT_URL") {
            config.endpoint_url = v;
        }
        if let Ok(v) = std::env::var("AWS_REGION").or_else(|_| std::env::var("S3_REGION")) {
            config.region = v;
        }
        if let Ok(v) = std::env::var("AWS_ACCESS_KEY_ID") {
            config.access_key_id = v;
        }
        if let Ok(v) = std::env::var("AWS_SECRET_ACCESS_KEY") {
            config.secret_access_key = v;
        }
        if let Ok(v) = std::env::var("AWS_SESSION_TOKEN") {
            if !v.is_empty() {
                config.session_token = Some(v);
            }
        }
        if let Ok(v) = std::env::var("S3_ADDRESSING_STYLE") {
            if let Ok(style) = v.parse() {
                config.addressing_style = style;
            }
        }
        if let Ok(v) = std::env::var("S3_PRESIGN_EXPIRES") {
            if let Ok(n) = v.parse::<u64>() {
                config.presign_expires_secs = n;
            }
        }
        if let Ok(v) = std::env::var("S3_MIN_PART_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                config.min_part_size = n;
            }
        }
        if let Ok(v) = std::env::var("S3_MAX_CONCURRENCY") {
            if let Ok(n) = v.parse::<usize>() {
                config.max_concurrent_requests = n;
            }
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::InvalidConfig`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), S3ClientError> {
        if self.endpoint_url.is_empty() {
            return Err(S3ClientError::InvalidConfig(
                "endpoint_url must not be empty".to_owned(),
            ));
        }
        if self.min_part_size == 0 {
            return Err(S3ClientError::InvalidConfig(
                "min_part_size must be positive".to_owned(),
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(S3ClientError::InvalidConfig(
                "max_concurrent_requests must be at least 1".to_owned(),
            ));
        }
        if self.presign_expires_secs == 0 || self.presign_expires_secs > 604_800 {
            return Err(S3ClientError::InvalidConfig(format!(
                "presign_expires_secs must be between 1 and 604800, got {}",
                self.presign_expires_secs
            )));
        }
        Ok(())
    }

    /// Presigned URL lifetime as a [`Duration`].
    #[must_use]
    pub fn presign_expires(&self) -> Duration {
        Duration::from_secs(self.presign_expires_secs)
    }
}
