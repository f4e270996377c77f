//! Core S3 data types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An object entry produced by a bucket listing.
///
/// Listing is the only producer. Entries are never cached: each listing
/// call decodes fresh values from the provider response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3Object {
    /// The object key, already percent-decoded.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Entity tag as returned by the provider (usually a quoted hex digest).
    #[serde(rename = "ETag")]
    pub etag: String,
    /// Time the object was last written.
    pub last_modified: DateTime<Utc>,
    /// Storage class reported by the provider (`STANDARD` when absent).
    pub storage_class: String,
}

/// A part uploaded within a multipart upload session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPart {
    /// 1-based part number, assigned sequentially by the session.
    pub part_number: u32,
    /// The `ETag` header returned by the upload-part request, if any.
    pub etag: Option<String>,
}

/// One `<Part>` entry of a complete-multipart-upload manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// Part number.
    pub part_number: u32,
    /// Entity tag of the part.
    pub etag: String,
}

impl From<&UploadPart> for CompletedPart {
    fn from(part: &UploadPart) -> Self {
        Self {
            part_number: part.part_number,
            etag: part.etag.clone().unwrap_or_default(),
        }
    }
}

/// The body of a complete-multipart-upload request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletedMultipartUpload {
    /// Parts in ascending part-number order.
    pub parts: Vec<CompletedPart>,
}

impl CompletedMultipartUpload {
    /// Build a manifest from the parts recorded by a session, sorted by part number.
    #[must_use]
    pub fn from_parts(parts: &[UploadPart]) -> Self {
        let mut parts: Vec<CompletedPart> = parts.iter().map(CompletedPart::from).collect();
        parts.sort_by_key(|p| p.part_number);
        Self { parts }
    }
}

/// Static website hosting configuration for a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteConfiguration {
    /// Suffix served for directory requests (e.g. `index.html`).
    pub index_document: String,
    /// Key served on 4xx errors.
    pub error_document: Option<String>,
}

/// Canned ACL applied to an object on write (`x-amz-acl`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObjectCannedAcl {
    /// Owner gets full control, nobody else has access.
    #[default]
    #[serde(rename = "private")]
    Private,
    /// Owner gets full control, everyone can read.
    #[serde(rename = "public-read")]
    PublicRead,
    /// Owner gets full control, everyone can read and write.
    #[serde(rename = "public-read-write")]
    PublicReadWrite,
    /// Owner gets full control, authenticated users can read.
    #[serde(rename = "authenticated-read")]
    AuthenticatedRead,
    /// Owner gets full control, EC2 can read AMI bundles.
    #[serde(rename = "aws-exec-read")]
    AwsExecRead,
    /// Object owner gets full control, the bucket owner can read.
    #[serde(rename = "bucket-owner-read")]
    BucketOwnerRead,
    /// Object and bucket owner both get full control.
    #[serde(rename = "bucket-owner-full-control")]
    BucketOwnerFullControl,
}

impl ObjectCannedAcl {
    /// Returns the header value of this ACL.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "public-read",
            Self::PublicReadWrite => "public-read-write",
            Self::AuthenticatedRead => "authenticated-read",
            Self::AwsExecRead => "aws-exec-read",
            Self::BucketOwnerRead => "bucket-owner-read",
            Self::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

impl fmt::Display for ObjectCannedAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectCannedAcl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "public-read" => Ok(Self::PublicRead),
            "public-read-write" => Ok(Self::PublicReadWrite),
            "authenticated-read" => Ok(Self::AuthenticatedRead),
            "aws-exec-read" => Ok(Self::AwsExecRead),
            "bucket-owner-read" => Ok(Self::BucketOwnerRead),
            "bucket-owner-full-control" => Ok(Self::BucketOwnerFullControl),
            other => Err(format!("unknown canned ACL: {other}")),
        }
    }
}

/// Storage class requested for a new object (`x-amz-storage-class`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    /// `STANDARD`
    #[default]
    Standard,
    /// `REDUCED_REDUNDANCY`
    ReducedRedundancy,
    /// `STANDARD_IA`
    StandardIa,
    /// `ONEZONE_IA`
    OnezoneIa,
    /// `INTELLIGENT_TIERING`
    IntelligentTiering,
    /// `GLACIER`
    Glacier,
    /// `GLACIER_IR`
    GlacierIr,
    /// `DEEP_ARCHIVE`
    DeepArchive,
}

impl StorageClass {
    /// Returns the header value of this storage class.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::ReducedRedundancy => "REDUCED_REDUNDANCY",
            Self::StandardIa => "STANDARD_IA",
            Self::OnezoneIa => "ONEZONE_IA",
            Self::IntelligentTiering => "INTELLIGENT_TIERING",
            Self::Glacier => "GLACIER",
            Self::GlacierIr => "GLACIER_IR",
            Self::DeepArchive => "DEEP_ARCHIVE",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STANDARD" => Ok(Self::Standard),
            "REDUCED_REDUNDANCY" => Ok(Self::ReducedRedundancy),
            "STANDARD_IA" => Ok(Self::StandardIa),
            "ONEZONE_IA" => Ok(Self::OnezoneIa),
            "INTELLIGENT_TIERING" => Ok(Self::IntelligentTiering),
            "GLACIER" => Ok(Self::Glacier),
            "GLACIER_IR" => Ok(Self::GlacierIr),
            "DEEP_ARCHIVE" => Ok(Self::DeepArchive),
            other => Err(format!("unknown storage class: {other}")),
        }
    }
}

/// Server-side encryption requested for a new object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerSideEncryption {
    /// S3-managed keys (`AES256`).
    #[serde(rename = "AES256")]
    Aes256,
    /// KMS-managed keys (`aws:kms`).
    #[serde(rename = "aws:kms")]
    AwsKms,
}

impl ServerSideEncryption {
    /// Returns the header value of this encryption mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes256 => "AES256",
            Self::AwsKms => "aws:kms",
        }
    }
}

/// Optional per-object metadata applied when an object is written.
///
/// Threaded unchanged from the upload entry points down to the signed
/// request, where it becomes request headers (see [`ObjectParams::to_headers`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectParams {
    /// Canned ACL. `None` sends no ACL header, which some providers require.
    pub acl: Option<ObjectCannedAcl>,
    /// `Content-Type` of the stored object.
    pub content_type: Option<String>,
    /// `Cache-Control` served with the object.
    pub cache_control: Option<String>,
    /// `Content-Disposition` served with the object.
    pub content_disposition: Option<String>,
    /// `Content-Encoding` served with the object.
    pub content_encoding: Option<String>,
    /// Storage class, sent as `x-amz-storage-class`.
    pub storage_class: Option<StorageClass>,
    /// Encryption at rest, sent as `x-amz-server-side-encryption`.
    pub server_side_encryption: Option<ServerSideEncryption>,
    /// KMS key used when `server_side_encryption` is `aws:kms`.
    pub sse_kms_key_id: Option<String>,
    /// User metadata, sent as `x-amz-meta-<name>` headers.
    pub metadata: BTreeMap<String, String>,
}

impl ObjectParams {
    /// Parameters carrying only a canned ACL.
    #[must_use]
    pub fn with_acl(acl: ObjectCannedAcl) -> Self {
        Self {
            acl: Some(acl),
            ..Self::default()
        }
    }

    /// Render the parameters as lowercase `(name, value)` request headers.
    #[must_use]
    pub fn to_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        let mut push = |name: &str, value: Option<&str>| {
            if let Some(v) = value {
                headers.push((name.to_owned(), v.to_owned()));
            }
        };

        push("x-amz-acl", self.acl.as_ref().map(ObjectCannedAcl::as_str));
        push(
            http::header::CONTENT_TYPE.as_str(),
            self.content_type.as_deref(),
        );
        push(
            http::header::CACHE_CONTROL.as_str(),
            self.cache_control.as_deref(),
        );
        push(
            http::header::CONTENT_DISPOSITION.as_str(),
            self.content_disposition.as_deref(),
        );
        push(
            http::header::CONTENT_ENCODING.as_str(),
            self.content_encoding.as_deref(),
        );
        push(
            "x-amz-storage-class",
            self.storage_class.as_ref().map(StorageClass::as_str),
        );
        push(
            "x-amz-server-side-encryption",
            self.server_side_encryption
                .as_ref()
                .map(ServerSideEncryption::as_str),
        );
        push(
            "x-amz-server-side-encryption-aws-kms-key-id",
            self.sse_kms_key_id.as_deref(),
        );

        for (name, value) in &self.metadata {
            headers.push((format!("x-amz-meta-{}", name.to_lowercase()), value.clone()));
        }

        headers
    }
}
