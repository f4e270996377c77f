//! Paginated, filtered bucket listing.
//!
//! [`S3Client::list_objects`] returns a lazy stream: one `ListObjectsV2`
//! request is sent per page and only when the consumer needs more items, so
//! dropping the stream (or reaching `max_items`) stops pagination.

use std::borrow::Cow;
use std::collections::VecDeque;

use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use http::Method;
use percent_encoding::percent_decode_str;
use s3kit_model::S3Object;
use s3kit_model::output::ListObjectsV2Output;
use tracing::debug;

use crate::client::{S3Client, S3Request, expect_success};
use crate::error::S3ClientError;
use crate::filter::ObjectFilter;

/// Options of [`S3Client::list_objects`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Filter applied to each page before its objects are yielded.
    pub search_query: Option<ObjectFilter>,
    /// Stop after this many objects have been yielded (counted after filtering).
    pub max_items: Option<usize>,
    /// `max-keys` sent with each page request; the provider default when `None`.
    pub page_size: Option<u32>,
    /// Continuation token to resume a previous listing from.
    pub starting_token: Option<String>,
}

impl ListOptions {
    /// Parse and set the search query.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::InvalidFilter`] if the query does not parse.
    pub fn with_search_query(mut self, query: &str) -> Result<Self, S3ClientError> {
        self.search_query = Some(ObjectFilter::parse(query)?);
        Ok(self)
    }

    /// Set `max_items`.
    #[must_use]
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    /// Set `page_size`.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

struct ListState {
    client: S3Client,
    bucket: String,
    prefix: String,
    filter: Option<ObjectFilter>,
    page_size: Option<u32>,
    buffer: VecDeque<S3Object>,
    remaining: Option<usize>,
    token: Option<String>,
    exhausted: bool,
}

impl S3Client {
    /// Fetch one page of a `ListObjectsV2` listing, with keys decoded.
    ///
    /// # Errors
    ///
    /// Returns [`S3ClientError::Service`] on a non-success status and
    /// [`S3ClientError::Xml`] or [`S3ClientError::Protocol`] on a malformed
    /// response.
    pub async fn list_objects_v2_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
        page_size: Option<u32>,
    ) -> Result<ListObjectsV2Output, S3ClientError> {
        let mut request = S3Request::new(Method::GET, bucket, None)
            .query("list-type", "2")
            .query("prefix", prefix)
            .query("encoding-type", "url");
        if let Some(max_keys) = page_size {
            request = request.query("max-keys", max_keys.to_string());
        }
        if let Some(token) = continuation_token {
            request = request.query("continuation-token", token);
        }

        let response = expect_success(self.send(request).await?).await?;
        let body = response.into_body().collect().await?;
        let mut page: ListObjectsV2Output = s3kit_xml::from_xml(&body)?;

        let url_encoded = page
            .encoding_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("url"));
        for object in &mut page.contents {
            object.key = decode_key(&object.key, url_encoded)?;
        }

        debug!(
            bucket = %bucket,
            prefix = %prefix,
            count = page.contents.len(),
            truncated = page.is_truncated,
            "list_objects_v2 page received"
        );
        Ok(page)
    }

    /// List objects under `prefix` as a lazy stream.
    ///
    /// Pages are requested one at a time while the provider reports more
    /// results. The filter runs on each page, and `max_items` counts filtered
    /// objects: no page is requested once that many have been yielded.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use futures::TryStreamExt;
    /// use s3kit_core::{ListOptions, S3Client, S3ClientConfig};
    ///
    /// # async fn run() -> Result<(), s3kit_core::S3ClientError> {
    /// let client = S3Client::from_config(S3ClientConfig::from_env())?;
    /// let options = ListOptions::default()
    ///     .with_search_query("Contents[?Size > `1048576`][]")?
    ///     .with_max_items(10);
    /// let large: Vec<_> = client.list_objects("media", "videos/", options).try_collect().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        options: ListOptions,
    ) -> BoxStream<'static, Result<S3Object, S3ClientError>> {
        let state = ListState {
            client: self.clone(),
            bucket: bucket.to_owned(),
            prefix: prefix.to_owned(),
            filter: options.search_query,
            page_size: options.page_size,
            buffer: VecDeque::new(),
            remaining: options.max_items,
            token: options.starting_token,
            exhausted: false,
        };

        stream::try_unfold(state, |mut state| async move {
            loop {
                if state.remaining == Some(0) {
                    return Ok(None);
                }
                if let Some(object) = state.buffer.pop_front() {
                    if let Some(remaining) = state.remaining.as_mut() {
                        *remaining -= 1;
                    }
                    return Ok(Some((object, state)));
                }
                if state.exhausted {
                    return Ok(None);
                }

                let page = state
                    .client
                    .list_objects_v2_page(
                        &state.bucket,
                        &state.prefix,
                        state.token.as_deref(),
                        state.page_size,
                    )
                    .await?;

                let ListObjectsV2Output {
                    contents,
                    is_truncated,
                    next_continuation_token,
                    ..
                } = page;
                let contents = match &state.filter {
                    Some(filter) => filter.apply(contents),
                    None => contents,
                };
                state.buffer.extend(contents);

                // A truncated page without a token cannot be continued.
                state.token = next_continuation_token.filter(|_| is_truncated);
                state.exhausted = state.token.is_none();
            }
        })
        .boxed()
    }

    /// Collect every object under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns the first error of any page request.
    pub async fn list_all(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<S3Object>, S3ClientError> {
        self.list_objects(bucket, prefix, ListOptions::default())
            .try_collect()
            .await
    }
}

/// Percent-decode a listed key. With `encoding-type=url`, `+` stands for a space.
fn decode_key(key: &str, url_encoded: bool) -> Result<String, S3ClientError> {
    let raw: Cow<'_, str> = if url_encoded && key.contains('+') {
        Cow::Owned(key.replace('+', " "))
    } else {
        Cow::Borrowed(key)
    };
    percent_decode_str(&raw)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|e| S3ClientError::Protocol(format!("listed key {key:?} is not valid UTF-8: {e}")))
}
