//! Bucket-level operations.
//!
//! Policy and website configuration are sent with header signing; some
//! providers refuse presigned URLs for these sub-resources.

use bytes::Bytes;
use futures::TryStreamExt;
use http::Method;
use s3kit_model::WebsiteConfiguration;
use tracing::{debug, info};

use crate::client::{S3Client, S3Request, expect_success, is_not_found};
use crate::error::S3ClientError;
use crate::ops::list::ListOptions;

impl S3Client {
    /// Create a bucket.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Service`] if the bucket exists or cannot be created.
    pub async fn create_bucket(&self, bucket: &str) -> Result<(), S3ClientError> {
        let response = self
            .send(S3Request::new(Method::PUT, bucket, None).signed_with_headers())
            .await?;
        expect_success(response).await?;
        info!(bucket = %bucket, "bucket created");
        Ok(())
    }

    /// Delete an empty bucket.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Service`] if the bucket is missing or not empty.
    pub async fn delete_bucket(&self, bucket: &str) -> Result<(), S3ClientError> {
        let response = self
            .send(S3Request::new(Method::DELETE, bucket, None).signed_with_headers())
            .await?;
        expect_success(response).await?;
        info!(bucket = %bucket, "bucket deleted");
        Ok(())
    }

    /// Set the bucket policy.
    ///
    /// A JSON string value is sent verbatim as the policy document; any other
    /// value is serialized.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Service`] if the provider rejects the policy.
    pub async fn put_bucket_policy(
        &self,
        bucket: &str,
        policy: &serde_json::Value,
    ) -> Result<(), S3ClientError> {
        let body = match policy {
            serde_json::Value::String(raw) => Bytes::from(raw.clone()),
            other => Bytes::from(other.to_string()),
        };
        let response = self
            .send(
                S3Request::new(Method::PUT, bucket, None)
                    .query("policy", "")
                    .headers(vec![(
                        http::header::CONTENT_TYPE.as_str().to_owned(),
                        "application/json".to_owned(),
                    )])
                    .body(body)
                    .signed_with_headers(),
            )
            .await?;
        expect_success(response).await?;
        debug!(bucket = %bucket, "bucket policy set");
        Ok(())
    }

    /// Fetch the bucket policy. `None` when the bucket has no policy.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Service`] on a non-success status other than
    /// 404 and [`S3ClientError::Protocol`] if the policy is not valid JSON.
    pub async fn get_bucket_policy(
        &self,
        bucket: &str,
    ) -> Result<Option<serde_json::Value>, S3ClientError> {
        let response = self
            .send(
                S3Request::new(Method::GET, bucket, None)
                    .query("policy", "")
                    .signed_with_headers(),
            )
            .await?;
        if is_not_found(response.status()) {
            debug!(bucket = %bucket, "bucket has no policy");
            return Ok(None);
        }

        let body = expect_success(response).await?.into_body().collect().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| S3ClientError::Protocol(format!("invalid bucket policy document: {e}")))
    }

    /// Remove the bucket policy.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Service`] on a non-success status.
    pub async fn delete_bucket_policy(&self, bucket: &str) -> Result<(), S3ClientError> {
        let response = self
            .send(
                S3Request::new(Method::DELETE, bucket, None)
                    .query("policy", "")
                    .signed_with_headers(),
            )
            .await?;
        expect_success(response).await?;
        debug!(bucket = %bucket, "bucket policy deleted");
        Ok(())
    }

    /// Enable static website hosting.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Service`] on a non-success status.
    pub async fn put_bucket_website(
        &self,
        bucket: &str,
        index_document: &str,
        error_document: Option<&str>,
    ) -> Result<(), S3ClientError> {
        let config = WebsiteConfiguration {
            index_document: index_document.to_owned(),
            error_document: error_document.map(ToOwned::to_owned),
        };
        let body = s3kit_xml::to_xml("WebsiteConfiguration", &config)?;
        let response = self
            .send(
                S3Request::new(Method::PUT, bucket, None)
                    .query("website", "")
                    .headers(vec![(
                        http::header::CONTENT_TYPE.as_str().to_owned(),
                        "application/xml".to_owned(),
                    )])
                    .body(Bytes::from(body))
                    .signed_with_headers(),
            )
            .await?;
        expect_success(response).await?;
        debug!(bucket = %bucket, index_document, "bucket website set");
        Ok(())
    }

    /// Disable static website hosting.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Service`] on a non-success status.
    pub async fn delete_bucket_website(&self, bucket: &str) -> Result<(), S3ClientError> {
        let response = self
            .send(
                S3Request::new(Method::DELETE, bucket, None)
                    .query("website", "")
                    .signed_with_headers(),
            )
            .await?;
        expect_success(response).await?;
        debug!(bucket = %bucket, "bucket website deleted");
        Ok(())
    }

    /// Delete every object in the bucket. Returns the number of objects deleted.
    ///
    /// # Errors
    ///
    /// Returns the listing error, or [`S3ClientError::PartialDelete`] if some
    /// deletes failed.
    pub async fn empty_bucket(&self, bucket: &str) -> Result<usize, S3ClientError> {
        let keys: Vec<String> = self
            .list_objects(bucket, "", ListOptions::default())
            .map_ok(|object| object.key)
            .try_collect()
            .await?;

        let deleted = self.delete_objects(bucket, keys).await?.len();
        info!(bucket = %bucket, deleted, "bucket emptied");
        Ok(deleted)
    }
}
