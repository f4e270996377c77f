//! Upload orchestration: single `PUT` or multipart, decided once up front.

use std::fmt;
use std::io;
use std::path::Path;
use std::pin::pin;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, TryStreamExt};
use s3kit_model::output::{CompleteMultipartUploadOutput, PutObjectOutput};
use s3kit_model::{ObjectParams, UploadPart};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::chunk::chunked;
use crate::client::S3Client;
use crate::error::S3ClientError;
use crate::multipart::MultipartUpload;

/// Callback invoked with every fragment read from the source stream.
pub type ChunkObserver = Box<dyn FnMut(&[u8]) + Send>;

/// How an upload is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPlan {
    /// The length is known and below the part size: buffer and `PUT` once.
    SinglePut,
    /// The length is known and at least one part: multipart upload.
    MultipartFromStart,
    /// The length is unknown: multipart upload, falling back to a single
    /// `PUT` if the stream ends before a full part was read.
    MultipartWithLateFallback,
}

impl UploadPlan {
    /// Pick the plan for a stream of `content_length` bytes.
    ///
    /// ```
    /// use s3kit_core::upload::UploadPlan;
    ///
    /// assert_eq!(UploadPlan::choose(Some(10), 100), UploadPlan::SinglePut);
    /// assert_eq!(UploadPlan::choose(Some(100), 100), UploadPlan::MultipartFromStart);
    /// assert_eq!(UploadPlan::choose(None, 100), UploadPlan::MultipartWithLateFallback);
    /// ```
    #[must_use]
    pub fn choose(content_length: Option<u64>, min_part_size: usize) -> Self {
        match content_length {
            Some(len) if len < min_part_size as u64 => Self::SinglePut,
            Some(_) => Self::MultipartFromStart,
            None => Self::MultipartWithLateFallback,
        }
    }
}

/// Options of [`S3Client::upload_stream`].
#[derive(Default)]
pub struct UploadOptions {
    /// Total length of the stream, when known.
    pub content_length: Option<u64>,
    /// Part size; the client's `min_part_size` when `None`.
    pub min_part_size: Option<usize>,
    /// Object parameters for the written object.
    pub params: ObjectParams,
    /// Observer of raw source fragments, e.g. for progress or hashing.
    pub on_chunk_received: Option<ChunkObserver>,
}

impl fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadOptions")
            .field("content_length", &self.content_length)
            .field("min_part_size", &self.min_part_size)
            .field("params", &self.params)
            .field("on_chunk_received", &self.on_chunk_received.is_some())
            .finish()
    }
}

/// What an upload ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The object was written with one `PUT`.
    SinglePut(PutObjectOutput),
    /// The object was assembled from parts.
    Multipart {
        /// Upload ID of the completed upload.
        upload_id: String,
        /// The uploaded parts.
        parts: Vec<UploadPart>,
        /// The completion response.
        output: CompleteMultipartUploadOutput,
    },
}

impl S3Client {
    /// Upload a stream of fragments to `key`.
    ///
    /// With a known length below the part size the stream is buffered and
    /// sent in one `PUT`. Otherwise a multipart upload is created and the
    /// stream is re-chunked into parts of at least the part size; if the
    /// stream turns out to fit in a single chunk, the multipart upload is
    /// aborted and that chunk is sent with one `PUT` instead.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Io`] if the source fails, or the error of the
    /// failed request. An open multipart upload is aborted before returning.
    pub async fn upload_stream<S>(
        &self,
        bucket: &str,
        key: &str,
        stream: S,
        options: UploadOptions,
    ) -> Result<UploadOutcome, S3ClientError>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let UploadOptions {
            content_length,
            min_part_size,
            params,
            mut on_chunk_received,
        } = options;
        let min_part_size = min_part_size
            .unwrap_or_else(|| self.config().min_part_size)
            .max(1);
        let plan = UploadPlan::choose(content_length, min_part_size);
        debug!(
            bucket = %bucket,
            key = %key,
            content_length = ?content_length,
            min_part_size,
            plan = ?plan,
            "upload plan chosen"
        );

        let stream = stream.inspect_ok(move |fragment| {
            if let Some(observer) = on_chunk_received.as_mut() {
                observer(fragment);
            }
        });

        match plan {
            UploadPlan::SinglePut => {
                let body = stream
                    .try_fold(BytesMut::new(), |mut buf, fragment| async move {
                        buf.extend_from_slice(&fragment);
                        Ok(buf)
                    })
                    .await?
                    .freeze();
                let output = self.put_object(bucket, key, body, &params).await?;
                Ok(UploadOutcome::SinglePut(output))
            }
            UploadPlan::MultipartFromStart | UploadPlan::MultipartWithLateFallback => {
                let late_fallback = plan == UploadPlan::MultipartWithLateFallback;
                let mut upload = self.multipart_upload(bucket, key, params.clone());
                upload.create().await?;

                match upload_parts(&mut upload, chunked(stream, min_part_size), late_fallback)
                    .await
                {
                    Ok(Some(body)) => {
                        upload.abort().await?;
                        debug!(
                            bucket = %bucket,
                            key = %key,
                            size = body.len(),
                            "stream smaller than one part, falling back to single put"
                        );
                        let output = self.put_object(bucket, key, body, &params).await?;
                        Ok(UploadOutcome::SinglePut(output))
                    }
                    Ok(None) => {
                        let output = match upload.complete().await {
                            Ok(output) => output,
                            Err(e) => return upload.finish(Err(e)).await,
                        };
                        Ok(UploadOutcome::Multipart {
                            upload_id: upload.upload_id().unwrap_or_default().to_owned(),
                            parts: upload.parts().to_vec(),
                            output,
                        })
                    }
                    Err(e) => upload.finish(Err(e)).await,
                }
            }
        }
    }

    /// Upload a local file to `key`, using its size as the content length.
    ///
    /// A file below the part size is streamed straight into one `PUT`;
    /// larger files go through [`S3Client::upload_stream`].
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Io`] if the file cannot be opened, or the
    /// upload error.
    pub async fn upload_file(
        &self,
        bucket: &str,
        path: impl AsRef<Path>,
        key: &str,
        params: ObjectParams,
    ) -> Result<UploadOutcome, S3ClientError> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let content_length = file.metadata().await?.len();
        let min_part_size = self.config().min_part_size.max(1);

        let outcome = if UploadPlan::choose(Some(content_length), min_part_size)
            == UploadPlan::SinglePut
        {
            let output = self
                .put_object_stream(bucket, key, ReaderStream::new(file), content_length, &params)
                .await?;
            UploadOutcome::SinglePut(output)
        } else {
            self.upload_stream(
                bucket,
                key,
                ReaderStream::new(file),
                UploadOptions {
                    content_length: Some(content_length),
                    params,
                    ..UploadOptions::default()
                },
            )
            .await?
        };
        info!(
            bucket = %bucket,
            key = %key,
            path = %path.display(),
            size = content_length,
            "file uploaded"
        );
        Ok(outcome)
    }
}

/// Upload every chunk as a part.
///
/// Returns the bytes to send with a single `PUT` instead when the stream is
/// empty or, with `late_fallback`, fits in one chunk. The session is then
/// left without parts.
async fn upload_parts<S>(
    upload: &mut MultipartUpload,
    chunks: S,
    late_fallback: bool,
) -> Result<Option<Bytes>, S3ClientError>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let mut chunks = pin!(chunks.peekable());
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        if late_fallback && upload.parts().is_empty() && chunks.as_mut().peek().await.is_none() {
            return Ok(Some(chunk));
        }
        upload.upload_part(chunk).await?;
    }

    if upload.parts().is_empty() {
        Ok(Some(Bytes::new()))
    } else {
        Ok(None)
    }
}
