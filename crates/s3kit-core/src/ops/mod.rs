//! S3 operations, grouped by category.
//!
//! Each submodule adds methods to [`crate::S3Client`].

pub mod bucket;
pub mod list;
pub mod object;
