//! Single-object operations.
//!
//! Implements `put_object`, `put_object_stream`, `get_object`,
//! `get_object_stream`, `delete_object` and the per-key bulk
//! `delete_objects`. All of them use presigned URLs.

use std::io;

use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use http::{Method, StatusCode};
use s3kit_model::ObjectParams;
use s3kit_model::output::{DeleteObjectOutput, PutObjectOutput};
use tracing::{debug, info};

use crate::client::{S3Client, S3Request, error_from_response, etag_header, expect_success, is_not_found};
use crate::error::S3ClientError;
use crate::transport::{ByteStream, RequestBody};

impl S3Client {
    /// Store `body` under `key` with a single `PUT`.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Service`] on a non-success status.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: impl Into<Bytes>,
        params: &ObjectParams,
    ) -> Result<PutObjectOutput, S3ClientError> {
        let body = body.into();
        let size = body.len();
        let response = self
            .send(
                S3Request::new(Method::PUT, bucket, Some(key))
                    .headers(params.to_headers())
                    .body(body),
            )
            .await?;
        let response = expect_success(response).await?;

        debug!(bucket = %bucket, key = %key, size, "put_object completed");

        Ok(PutObjectOutput {
            status: response.status(),
            etag: etag_header(&response),
        })
    }

    /// Store a stream of `content_length` bytes under `key` with a single
    /// `PUT`, without buffering it.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Http`] if the source stream fails and
    /// [`S3ClientError::Service`] on a non-success status, including a stream
    /// shorter or longer than `content_length`.
    pub async fn put_object_stream<S>(
        &self,
        bucket: &str,
        key: &str,
        body: S,
        content_length: u64,
        params: &ObjectParams,
    ) -> Result<PutObjectOutput, S3ClientError>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        let response = self
            .send(
                S3Request::new(Method::PUT, bucket, Some(key))
                    .headers(params.to_headers())
                    .body(RequestBody::Stream {
                        stream: Box::pin(body),
                        length: Some(content_length),
                    }),
            )
            .await?;
        let response = expect_success(response).await?;

        debug!(bucket = %bucket, key = %key, size = content_length, "put_object_stream completed");

        Ok(PutObjectOutput {
            status: response.status(),
            etag: etag_header(&response),
        })
    }

    /// Fetch a whole object. A missing key yields `None`.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Service`] on any non-success status other than 404.
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Option<Bytes>, S3ClientError> {
        match self.get_object_stream(bucket, key).await? {
            Some(stream) => {
                let body = crate::transport::ResponseBody::from_stream(stream)
                    .collect()
                    .await?;
                Ok(Some(body))
            }
            None => Ok(None),
        }
    }

    /// Fetch an object as a stream of body fragments. A missing key yields `None`.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Service`] on any non-success status other than 404.
    pub async fn get_object_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ByteStream>, S3ClientError> {
        let response = self
            .send(S3Request::new(Method::GET, bucket, Some(key)))
            .await?;

        if is_not_found(response.status()) {
            debug!(bucket = %bucket, key = %key, "object not found");
            return Ok(None);
        }
        let response = expect_success(response).await?;
        Ok(Some(response.into_body().into_stream()))
    }

    /// Delete an object. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Service`] on any non-success status other than 404.
    pub async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<DeleteObjectOutput, S3ClientError> {
        let response = self
            .send(S3Request::new(Method::DELETE, bucket, Some(key)))
            .await?;

        let status = response.status();
        if !status.is_success() && !is_not_found(status) {
            return Err(error_from_response(response).await);
        }

        debug!(bucket = %bucket, key = %key, status = %status, "delete_object completed");
        Ok(DeleteObjectOutput {
            status: if is_not_found(status) {
                StatusCode::NO_CONTENT
            } else {
                status
            },
        })
    }

    /// Delete every key with one request per key.
    ///
    /// Up to `max_concurrent_requests` deletes are in flight at once and every
    /// key is attempted even when some fail. Outputs are returned in key order.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::PartialDelete`] listing the deleted keys and
    /// each failed key with its error when at least one delete failed.
    pub async fn delete_objects<I, K>(
        &self,
        bucket: &str,
        keys: I,
    ) -> Result<Vec<DeleteObjectOutput>, S3ClientError>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let total = keys.len();

        let results: Vec<(String, Result<DeleteObjectOutput, S3ClientError>)> =
            stream::iter(keys)
                .map(|key| async move {
                    let result = self.delete_object(bucket, &key).await;
                    (key, result)
                })
                .buffered(self.concurrency())
                .collect()
                .await;

        let mut outputs = Vec::with_capacity(total);
        let mut deleted = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for (key, result) in results {
            match result {
                Ok(output) => {
                    outputs.push(output);
                    deleted.push(key);
                }
                Err(e) => failures.push((key, e)),
            }
        }

        if failures.is_empty() {
            info!(bucket = %bucket, count = total, "delete_objects completed");
            Ok(outputs)
        } else {
            info!(
                bucket = %bucket,
                deleted = deleted.len(),
                failed = failures.len(),
                "delete_objects partially failed"
            );
            Err(S3ClientError::PartialDelete { deleted, failures })
        }
    }
}
