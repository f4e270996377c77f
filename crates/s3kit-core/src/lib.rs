//! Client core for S3-compatible object storage.
//!
//! Provides presigned and header-signed requests over a pluggable HTTP
//! transport, object and bucket operations, multipart upload sessions that
//! are aborted on any failure, lazy listing with client-side filtering,
//! size-aware stream uploads and one-way directory sync.
//!
//! # Architecture
//!
//! ```text
//!  sync / upload orchestration
//!        |
//!        v
//!  S3Client (object, bucket, list, multipart ops)
//!        |
//!        +--> Signer (SigV4 presign / header signing)
//!        |
//!        v
//!  HttpTransport (reqwest)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use s3kit_core::{S3Client, S3ClientConfig};
//!
//! # async fn run() -> Result<(), s3kit_core::S3ClientError> {
//! let client = S3Client::from_config(S3ClientConfig::from_env())?;
//! client.put_object("bucket", "hello.txt", "hi", &Default::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod multipart;
mod ops;
pub mod signer;
pub mod sync;
pub mod transport;
pub mod upload;

#[cfg(test)]
mod testing;

pub use client::S3Client;
pub use config::{AddressingStyle, S3ClientConfig};
pub use error::S3ClientError;
pub use filter::ObjectFilter;
pub use multipart::{MultipartState, MultipartUpload};
pub use ops::list::ListOptions;
pub use s3kit_model::{ObjectParams, S3Object};
pub use signer::{SigV4Signer, Signer};
pub use sync::{SyncOptions, SyncResult};
pub use transport::{HttpTransport, ReqwestTransport};
pub use upload::{UploadOptions, UploadOutcome, UploadPlan};
