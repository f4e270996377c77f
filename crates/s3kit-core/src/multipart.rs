//! Multipart upload session.
//!
//! A [`MultipartUpload`] walks the S3 multipart lifecycle:
//!
//! ```text
//! Uninitialized --create--> Created --upload_part--> Uploading --complete--> Completed
//!                              |                        |
//!                              +---------abort----------+----------------> Aborted
//! ```
//!
//! Exactly one terminal request (complete or abort) is sent per created
//! upload. [`S3Client::with_multipart_upload`] scopes a session: it completes
//! on success and aborts on error. A session dropped while still open (for
//! example because the task driving it was cancelled) spawns an abort on the
//! current Tokio runtime.

use std::fmt;

use bytes::Bytes;
use http::Method;
use s3kit_model::output::{CompleteMultipartUploadOutput, CreateMultipartUploadOutput};
use s3kit_model::{CompletedMultipartUpload, ObjectParams, S3ErrorResponse, UploadPart};
use tracing::{debug, info, warn};

use crate::client::{
    S3Client, S3Request, etag_header, expect_success, is_not_found, service_error,
};
use crate::error::S3ClientError;

/// Lifecycle state of a [`MultipartUpload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartState {
    /// `create` has not been called.
    Uninitialized,
    /// The upload exists on the server and has no parts yet.
    Created,
    /// At least one part was uploaded.
    Uploading,
    /// The upload was completed into an object.
    Completed,
    /// The upload was discarded.
    Aborted,
}

impl MultipartState {
    /// Whether no further operation is allowed.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Whether the server holds an open upload for this session.
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, Self::Created | Self::Uploading)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Created => "created",
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for MultipartState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One multipart upload of one object.
///
/// Parts are numbered from 1 in call order. The session owns its part list;
/// it is driven by a single caller and never shared.
#[derive(Debug)]
pub struct MultipartUpload {
    client: S3Client,
    bucket: String,
    key: String,
    params: ObjectParams,
    upload_id: Option<String>,
    parts: Vec<UploadPart>,
    state: MultipartState,
}

impl MultipartUpload {
    fn new(client: S3Client, bucket: &str, key: &str, params: ObjectParams) -> Self {
        Self {
            client,
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            params,
            upload_id: None,
            parts: Vec::new(),
            state: MultipartState::Uninitialized,
        }
    }

    /// Target bucket.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Target key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Upload ID assigned by `create`.
    #[must_use]
    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    /// Parts uploaded so far, in upload order.
    #[must_use]
    pub fn parts(&self) -> &[UploadPart] {
        &self.parts
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> MultipartState {
        self.state
    }

    fn invalid_state(&self, operation: &'static str) -> S3ClientError {
        S3ClientError::InvalidState {
            upload_id: self.upload_id.clone(),
            state: self.state,
            operation,
        }
    }

    /// Start the upload on the server. The object parameters are sent here.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::InvalidState`] unless the session is
    /// uninitialized, and [`S3ClientError::Xml`] if the response carries no
    /// `UploadId`.
    pub async fn create(&mut self) -> Result<&str, S3ClientError> {
        if self.state != MultipartState::Uninitialized {
            return Err(self.invalid_state("create"));
        }

        let response = self
            .client
            .send(
                S3Request::new(Method::POST, &self.bucket, Some(&self.key))
                    .query("uploads", "")
                    .headers(self.params.to_headers()),
            )
            .await?;
        let body = expect_success(response).await?.into_body().collect().await?;
        let output: CreateMultipartUploadOutput = s3kit_xml::from_xml(&body)?;

        info!(
            bucket = %self.bucket,
            key = %self.key,
            upload_id = %output.upload_id,
            "multipart upload created"
        );
        self.state = MultipartState::Created;
        Ok(self.upload_id.insert(output.upload_id).as_str())
    }

    /// Upload the next part.
    ///
    /// The part is recorded only if the request succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::InvalidState`] unless the session is created
    /// or uploading, and [`S3ClientError::Service`] if the upload fails.
    pub async fn upload_part(&mut self, body: Bytes) -> Result<UploadPart, S3ClientError> {
        let upload_id = match (&self.upload_id, self.state.is_open()) {
            (Some(id), true) => id.clone(),
            _ => return Err(self.invalid_state("upload_part")),
        };
        let part_number = u32::try_from(self.parts.len() + 1).map_err(|_| {
            S3ClientError::Protocol(format!("too many parts in upload {upload_id}"))
        })?;
        let size = body.len();

        let response = self
            .client
            .send(
                S3Request::new(Method::PUT, &self.bucket, Some(&self.key))
                    .query("partNumber", part_number.to_string())
                    .query("uploadId", upload_id.as_str())
                    .body(body),
            )
            .await?;
        let response = expect_success(response).await?;

        let part = UploadPart {
            part_number,
            etag: etag_header(&response),
        };
        debug!(
            bucket = %self.bucket,
            key = %self.key,
            upload_id = %upload_id,
            part_number,
            size,
            "part uploaded"
        );
        self.parts.push(part.clone());
        self.state = MultipartState::Uploading;
        Ok(part)
    }

    /// Assemble the uploaded parts into the object.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::InvalidState`] if the upload was never created
    /// or is already terminal, and [`S3ClientError::Service`] if the provider
    /// rejects the manifest (including an error document sent with status 200).
    pub async fn complete(&mut self) -> Result<CompleteMultipartUploadOutput, S3ClientError> {
        let upload_id = match (&self.upload_id, self.state.is_open()) {
            (Some(id), true) => id.clone(),
            _ => return Err(self.invalid_state("complete")),
        };

        let manifest = s3kit_xml::to_xml(
            "CompleteMultipartUpload",
            &CompletedMultipartUpload::from_parts(&self.parts),
        )?;
        let response = self
            .client
            .send(
                S3Request::new(Method::POST, &self.bucket, Some(&self.key))
                    .query("uploadId", upload_id.as_str())
                    .headers(vec![(
                        http::header::CONTENT_TYPE.as_str().to_owned(),
                        "application/xml".to_owned(),
                    )])
                    .body(Bytes::from(manifest)),
            )
            .await?;
        let response = expect_success(response).await?;
        let status = response.status();
        let body = response.into_body().collect().await?;

        if body.windows(b"<Error>".len()).any(|w| w == b"<Error>") {
            let error: S3ErrorResponse = s3kit_xml::from_xml(&body)?;
            return Err(service_error(status, error));
        }
        let output = if body.iter().all(u8::is_ascii_whitespace) {
            CompleteMultipartUploadOutput::default()
        } else {
            s3kit_xml::from_xml(&body)?
        };

        info!(
            bucket = %self.bucket,
            key = %self.key,
            upload_id = %upload_id,
            parts = self.parts.len(),
            "multipart upload completed"
        );
        self.state = MultipartState::Completed;
        Ok(output)
    }

    /// Discard the upload and its parts.
    ///
    /// Aborting twice is a no-op, and aborting an upload that was never
    /// created only marks the session aborted. The session is marked aborted
    /// before the request is sent, so a failed abort is never retried.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::InvalidState`] after `complete`, and
    /// [`S3ClientError::Service`] if the abort request fails.
    pub async fn abort(&mut self) -> Result<(), S3ClientError> {
        match self.state {
            MultipartState::Aborted => return Ok(()),
            MultipartState::Completed => return Err(self.invalid_state("abort")),
            MultipartState::Uninitialized => {
                self.state = MultipartState::Aborted;
                return Ok(());
            }
            MultipartState::Created | MultipartState::Uploading => {}
        }
        self.state = MultipartState::Aborted;

        let Some(upload_id) = self.upload_id.as_deref() else {
            return Ok(());
        };
        self.client
            .abort_multipart_upload(&self.bucket, &self.key, upload_id)
            .await
    }

    /// Leave the session scope with `result`.
    ///
    /// On `Ok` the upload is completed unless it is already terminal; if
    /// completing fails the upload is aborted and the completion error is
    /// returned. On `Err` the upload is aborted unless already terminal and
    /// the original error is returned.
    ///
    /// # Errors
    ///
    /// Returns the error in `result` or the completion error.
    pub async fn finish<T>(
        mut self,
        result: Result<T, S3ClientError>,
    ) -> Result<T, S3ClientError> {
        match result {
            Ok(value) => {
                if !self.state.is_terminal() {
                    if let Err(e) = self.complete().await {
                        self.abort_quietly().await;
                        return Err(e);
                    }
                }
                Ok(value)
            }
            Err(e) => {
                self.abort_quietly().await;
                Err(e)
            }
        }
    }

    async fn abort_quietly(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if let Err(e) = self.abort().await {
            warn!(
                bucket = %self.bucket,
                key = %self.key,
                upload_id = ?self.upload_id,
                error = %e,
                "failed to abort multipart upload"
            );
        }
    }
}

impl Drop for MultipartUpload {
    fn drop(&mut self) {
        if !self.state.is_open() {
            return;
        }
        self.state = MultipartState::Aborted;
        let Some(upload_id) = self.upload_id.take() else {
            return;
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                bucket = %self.bucket,
                key = %self.key,
                upload_id = %upload_id,
                "multipart upload dropped outside a runtime and left open"
            );
            return;
        };

        warn!(
            bucket = %self.bucket,
            key = %self.key,
            upload_id = %upload_id,
            "multipart upload dropped while open, aborting"
        );
        let client = self.client.clone();
        let bucket = std::mem::take(&mut self.bucket);
        let key = std::mem::take(&mut self.key);
        handle.spawn(async move {
            if let Err(e) = client.abort_multipart_upload(&bucket, &key, &upload_id).await {
                warn!(
                    bucket = %bucket,
                    key = %key,
                    upload_id = %upload_id,
                    error = %e,
                    "failed to abort dropped multipart upload"
                );
            }
        });
    }
}

impl S3Client {
    /// Start a multipart upload session for `key`. Call
    /// [`MultipartUpload::create`] before uploading parts.
    #[must_use]
    pub fn multipart_upload(&self, bucket: &str, key: &str, params: ObjectParams) -> MultipartUpload {
        MultipartUpload::new(self.clone(), bucket, key, params)
    }

    /// Run `f` inside a created multipart upload session.
    ///
    /// The upload is completed when `f` returns `Ok` (unless `f` completed or
    /// aborted it itself) and aborted when `f` returns `Err`, in which case
    /// the error of `f` is returned.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bytes::Bytes;
    /// use s3kit_core::{ObjectParams, S3Client, S3ClientConfig};
    ///
    /// # async fn run() -> Result<(), s3kit_core::S3ClientError> {
    /// let client = S3Client::from_config(S3ClientConfig::from_env())?;
    /// client
    ///     .with_multipart_upload("backups", "db.tar", ObjectParams::default(), async |upload| {
    ///         upload.upload_part(Bytes::from(vec![0u8; 5 * 1024 * 1024])).await?;
    ///         upload.upload_part(Bytes::from_static(b"tail")).await?;
    ///         Ok(())
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the create error, the error of `f`, or the completion error.
    pub async fn with_multipart_upload<T, F>(
        &self,
        bucket: &str,
        key: &str,
        params: ObjectParams,
        f: F,
    ) -> Result<T, S3ClientError>
    where
        F: AsyncFnOnce(&mut MultipartUpload) -> Result<T, S3ClientError>,
    {
        let mut upload = self.multipart_upload(bucket, key, params);
        upload.create().await?;
        let result = f(&mut upload).await;
        upload.finish(result).await
    }

    /// Send an abort for `upload_id`. An upload the server no longer knows is
    /// treated as aborted.
    pub(crate) async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), S3ClientError> {
        let response = self
            .send(S3Request::new(Method::DELETE, bucket, Some(key)).query("uploadId", upload_id))
            .await?;
        if !is_not_found(response.status()) {
            expect_success(response).await?;
        }
        info!(bucket = %bucket, key = %key, upload_id = %upload_id, "multipart upload aborted");
        Ok(())
    }
}
