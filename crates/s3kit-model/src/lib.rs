//! Data types for the s3kit S3 client.
//!
//! These are plain values with no I/O: the XML codec in `s3kit-xml` reads and
//! writes them, and `s3kit-core` passes them between its components.
//!
//! - [`types`] - objects, upload parts, per-object parameters and S3 enums
//! - [`output`] - decoded results of individual S3 operations
//! - [`error`] - the S3 `<Error>` response document

pub mod error;
pub mod output;
pub mod types;

pub use error::S3ErrorResponse;
pub use types::{
    CompletedMultipartUpload, CompletedPart, ObjectCannedAcl, ObjectParams, S3Object,
    ServerSideEncryption, StorageClass, UploadPart, WebsiteConfiguration,
};
