//! S3 XML codec for s3kit.
//!
//! The client only writes a handful of request bodies and reads a handful of
//! response documents, so the codec is hand-written on top of quick-xml
//! rather than derived.
//!
//! # Key components
//!
//! - [`S3Serialize`] trait and [`to_xml`] for request bodies
//!   (`CompleteMultipartUpload`, `WebsiteConfiguration`)
//! - [`S3Deserialize`] trait and [`from_xml`] for response documents
//!   (`ListBucketResult`, `InitiateMultipartUploadResult`,
//!   `CompleteMultipartUploadResult`, `Error`)
//!
//! # S3 XML conventions
//!
//! - Namespace: `http://s3.amazonaws.com/doc/2006-03-01/`
//! - Booleans: lowercase `true`/`false`
//! - Timestamps: ISO 8601 format (`2006-02-03T16:45:09.000Z`)

pub mod deserialize;
pub mod error;
pub mod serialize;

pub use deserialize::{S3Deserialize, from_xml};
pub use error::XmlError;
pub use serialize::{S3_NAMESPACE, S3Serialize, to_xml};
