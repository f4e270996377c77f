//! In-memory S3-compatible transport for unit tests.
//!
//! Interprets path-style requests produced by [`SigV4Signer`] (presigned or
//! header-signed), keeps buckets, objects and multipart uploads in memory and
//! records every request so tests can assert the exact wire sequence.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use http::{Method, StatusCode};
use percent_encoding::percent_decode_str;
use sha2::{Digest, Sha256};

use crate::client::S3Client;
use crate::config::S3ClientConfig;
use crate::signer::SigV4Signer;
use crate::transport::{HttpTransport, RequestBody, ResponseBody, TransportError};

pub(crate) const TEST_BUCKET: &str = "test-bucket";

pub(crate) fn test_config() -> S3ClientConfig {
    S3ClientConfig::builder()
        .endpoint_url("http://localhost:9000".into())
        .access_key_id("test-access-key".into())
        .secret_access_key("test-secret-key".into())
        .build()
}

pub(crate) fn test_client(transport: &MemoryTransport) -> S3Client {
    test_client_with(transport, test_config())
}

pub(crate) fn test_client_with(transport: &MemoryTransport, config: S3ClientConfig) -> S3Client {
    let signer = SigV4Signer::from_config(&config).expect("test signer");
    S3Client::new(config, Arc::new(signer), Arc::new(transport.clone()))
}

/// A request as received by the transport, decoded.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub operation: &'static str,
    pub method: Method,
    pub bucket: String,
    pub key: Option<String>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Whether the body arrived as a stream rather than a buffer.
    pub streamed: bool,
    /// Length announced with the body, if any.
    pub declared_length: Option<u64>,
}

impl RecordedRequest {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn has_query(&self, name: &str) -> bool {
        self.query.iter().any(|(n, _)| n == name)
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    etag: String,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Bucket {
    objects: BTreeMap<String, StoredObject>,
    policy: Option<String>,
    website: Option<String>,
}

#[derive(Debug)]
struct Upload {
    bucket: String,
    key: String,
    parts: BTreeMap<u32, (String, Bytes)>,
}

#[derive(Debug, Default)]
struct State {
    buckets: HashMap<String, Bucket>,
    uploads: HashMap<String, Upload>,
    next_upload: u64,
    failing_keys: BTreeSet<String>,
    failing_operations: BTreeSet<&'static str>,
    raw_listing_keys: bool,
    requests: Vec<RecordedRequest>,
}

/// Shared in-memory S3 state. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryTransport {
    state: Arc<Mutex<State>>,
}

impl MemoryTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_bucket(bucket: &str) -> Self {
        let transport = Self::new();
        transport
            .lock()
            .buckets
            .insert(bucket.to_owned(), Bucket::default());
        transport
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory transport lock")
    }

    pub(crate) fn put(&self, bucket: &str, key: &str, body: &[u8]) {
        let mut state = self.lock();
        let bucket = state.buckets.entry(bucket.to_owned()).or_default();
        bucket
            .objects
            .insert(key.to_owned(), stored(Bytes::copy_from_slice(body)));
    }

    pub(crate) fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| o.body.clone())
    }

    pub(crate) fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .buckets
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn bucket_policy(&self, bucket: &str) -> Option<String> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.policy.clone())
    }

    pub(crate) fn set_bucket_policy(&self, bucket: &str, policy: &str) {
        if let Some(b) = self.lock().buckets.get_mut(bucket) {
            b.policy = Some(policy.to_owned());
        }
    }

    pub(crate) fn bucket_website(&self, bucket: &str) -> Option<String> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.website.clone())
    }

    pub(crate) fn pending_uploads(&self) -> usize {
        self.lock().uploads.len()
    }

    /// Answer 500 to every object-level request on `key`.
    pub(crate) fn fail_key(&self, key: &str) {
        self.lock().failing_keys.insert(key.to_owned());
    }

    /// Answer 500 to every request of `operation`.
    pub(crate) fn fail_operation(&self, operation: &'static str) {
        self.lock().failing_operations.insert(operation);
    }

    /// Answer listings with raw keys and no `EncodingType`, whatever was asked.
    pub(crate) fn ignore_encoding_type(&self) {
        self.lock().raw_listing_keys = true;
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub(crate) fn last_request(&self) -> Option<RecordedRequest> {
        self.lock().requests.last().cloned()
    }

    pub(crate) fn operations(&self) -> Vec<&'static str> {
        self.lock().requests.iter().map(|r| r.operation).collect()
    }

    pub(crate) fn count_operation(&self, operation: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.operation == operation)
            .count()
    }
}

#[async_trait]
impl HttpTransport for MemoryTransport {
    async fn send(
        &self,
        request: http::Request<RequestBody>,
    ) -> Result<http::Response<ResponseBody>, TransportError> {
        let (parts, body) = request.into_parts();
        let streamed = matches!(body, RequestBody::Stream { .. });
        let declared_length = body.len();
        let body = body.collect().await?;
        let mut recorded = decode_request(&parts, body)?;
        recorded.streamed = streamed;
        recorded.declared_length = declared_length;

        let mut state = self.lock();
        state.requests.push(recorded.clone());
        Ok(state.handle(&recorded))
    }
}

fn decode_request(
    parts: &http::request::Parts,
    body: Bytes,
) -> Result<RecordedRequest, TransportError> {
    let decode = |s: &str| {
        percent_decode_str(s)
            .decode_utf8()
            .map(|c| c.into_owned())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))
    };

    let path = parts.uri.path().trim_start_matches('/');
    let (bucket, key) = match path.split_once('/') {
        Some((bucket, key)) if !key.is_empty() => (decode(bucket)?, Some(decode(key)?)),
        Some((bucket, _)) => (decode(bucket)?, None),
        None => (decode(path)?, None),
    };

    let mut query = Vec::new();
    for pair in parts.uri.query().unwrap_or_default().split('&') {
        if pair.is_empty() {
            continue;
        }
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        query.push((decode(name)?, decode(value)?));
    }

    let headers = parts
        .headers
        .iter()
        .map(|(n, v)| {
            (
                n.as_str().to_owned(),
                v.to_str().unwrap_or_default().to_owned(),
            )
        })
        .collect();

    let mut recorded = RecordedRequest {
        operation: "",
        method: parts.method.clone(),
        bucket,
        key,
        query,
        headers,
        body,
        streamed: false,
        declared_length: None,
    };
    recorded.operation = operation_of(&recorded);
    Ok(recorded)
}

fn operation_of(r: &RecordedRequest) -> &'static str {
    let m = &r.method;
    match (&r.key, m) {
        (None, _) if r.has_query("policy") => match *m {
            Method::PUT => "PutBucketPolicy",
            Method::GET => "GetBucketPolicy",
            Method::DELETE => "DeleteBucketPolicy",
            _ => "Unsupported",
        },
        (None, _) if r.has_query("website") => match *m {
            Method::PUT => "PutBucketWebsite",
            Method::DELETE => "DeleteBucketWebsite",
            _ => "Unsupported",
        },
        (None, &Method::GET) if r.query_value("list-type") == Some("2") => "ListObjectsV2",
        (None, &Method::PUT) => "CreateBucket",
        (None, &Method::DELETE) => "DeleteBucket",
        (Some(_), &Method::POST) if r.has_query("uploads") => "CreateMultipartUpload",
        (Some(_), &Method::PUT) if r.has_query("uploadId") && r.has_query("partNumber") => {
            "UploadPart"
        }
        (Some(_), &Method::POST) if r.has_query("uploadId") => "CompleteMultipartUpload",
        (Some(_), &Method::DELETE) if r.has_query("uploadId") => "AbortMultipartUpload",
        (Some(_), &Method::PUT) => "PutObject",
        (Some(_), &Method::GET) => "GetObject",
        (Some(_), &Method::DELETE) => "DeleteObject",
        _ => "Unsupported",
    }
}

impl State {
    fn handle(&mut self, r: &RecordedRequest) -> http::Response<ResponseBody> {
        let authenticated = r.query_value("X-Amz-Signature").is_some()
            || r.header("authorization").is_some();
        if !authenticated {
            return error(StatusCode::FORBIDDEN, "AccessDenied", "missing signature");
        }
        if r.declared_length.is_some_and(|len| len != r.body.len() as u64) {
            return error(
                StatusCode::BAD_REQUEST,
                "IncompleteBody",
                "You did not provide the number of bytes specified by the Content-Length",
            );
        }
        if self.failing_operations.contains(r.operation)
            || r.key.as_ref().is_some_and(|k| self.failing_keys.contains(k))
        {
            return error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalError",
                "injected failure",
            );
        }
        if r.operation == "CreateBucket" {
            return self.create_bucket(&r.bucket);
        }
        if !self.buckets.contains_key(&r.bucket) {
            return error(
                StatusCode::NOT_FOUND,
                "NoSuchBucket",
                "The specified bucket does not exist",
            );
        }

        let key = r.key.clone().unwrap_or_default();
        match r.operation {
            "DeleteBucket" => self.delete_bucket(&r.bucket),
            "PutBucketPolicy" => {
                self.bucket(&r.bucket).policy =
                    Some(String::from_utf8_lossy(&r.body).into_owned());
                empty(StatusCode::NO_CONTENT)
            }
            "GetBucketPolicy" => match self.bucket(&r.bucket).policy.clone() {
                Some(policy) => response(StatusCode::OK, policy),
                None => error(
                    StatusCode::NOT_FOUND,
                    "NoSuchBucketPolicy",
                    "The bucket policy does not exist",
                ),
            },
            "DeleteBucketPolicy" => {
                self.bucket(&r.bucket).policy = None;
                empty(StatusCode::NO_CONTENT)
            }
            "PutBucketWebsite" => {
                self.bucket(&r.bucket).website =
                    Some(String::from_utf8_lossy(&r.body).into_owned());
                empty(StatusCode::OK)
            }
            "DeleteBucketWebsite" => {
                self.bucket(&r.bucket).website = None;
                empty(StatusCode::NO_CONTENT)
            }
            "ListObjectsV2" => self.list(r),
            "PutObject" => {
                let object = stored(r.body.clone());
                let etag = object.etag.clone();
                self.bucket(&r.bucket).objects.insert(key, object);
                with_etag(empty(StatusCode::OK), &etag)
            }
            "GetObject" => match self.bucket(&r.bucket).objects.get(&key) {
                Some(object) => {
                    let body = object.body.clone();
                    let fragments: Vec<Result<Bytes, std::io::Error>> = body
                        .chunks(256)
                        .map(|c| Ok(Bytes::copy_from_slice(c)))
                        .collect();
                    let mut out = http::Response::new(ResponseBody::from_stream(
                        futures::stream::iter(fragments),
                    ));
                    *out.status_mut() = StatusCode::OK;
                    with_etag(out, &object.etag)
                }
                None => error(
                    StatusCode::NOT_FOUND,
                    "NoSuchKey",
                    "The specified key does not exist.",
                ),
            },
            "DeleteObject" => {
                self.bucket(&r.bucket).objects.remove(&key);
                empty(StatusCode::NO_CONTENT)
            }
            "CreateMultipartUpload" => {
                self.next_upload += 1;
                let upload_id = format!("upload-{}", self.next_upload);
                self.uploads.insert(
                    upload_id.clone(),
                    Upload {
                        bucket: r.bucket.clone(),
                        key: key.clone(),
                        parts: BTreeMap::new(),
                    },
                );
                response(
                    StatusCode::OK,
                    format!(
                        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                         <InitiateMultipartUploadResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
                         <Bucket>{}</Bucket><Key>{}</Key><UploadId>{upload_id}</UploadId>\
                         </InitiateMultipartUploadResult>",
                        escape(&r.bucket),
                        escape(&key)
                    ),
                )
            }
            "UploadPart" => self.upload_part(r),
            "CompleteMultipartUpload" => self.complete(r),
            "AbortMultipartUpload" => {
                let upload_id = r.query_value("uploadId").unwrap_or_default();
                if self.uploads.remove(upload_id).is_some() {
                    empty(StatusCode::NO_CONTENT)
                } else {
                    no_such_upload()
                }
            }
            _ => error(
                StatusCode::NOT_IMPLEMENTED,
                "NotImplemented",
                "unsupported request",
            ),
        }
    }

    fn bucket(&mut self, name: &str) -> &mut Bucket {
        self.buckets.entry(name.to_owned()).or_default()
    }

    fn create_bucket(&mut self, name: &str) -> http::Response<ResponseBody> {
        if self.buckets.contains_key(name) {
            return error(
                StatusCode::CONFLICT,
                "BucketAlreadyOwnedByYou",
                "Your previous request to create the named bucket succeeded",
            );
        }
        self.buckets.insert(name.to_owned(), Bucket::default());
        empty(StatusCode::OK)
    }

    fn delete_bucket(&mut self, name: &str) -> http::Response<ResponseBody> {
        if self.buckets.get(name).is_some_and(|b| !b.objects.is_empty()) {
            return error(
                StatusCode::CONFLICT,
                "BucketNotEmpty",
                "The bucket you tried to delete is not empty",
            );
        }
        self.buckets.remove(name);
        empty(StatusCode::NO_CONTENT)
    }

    fn list(&mut self, r: &RecordedRequest) -> http::Response<ResponseBody> {
        let prefix = r.query_value("prefix").unwrap_or_default();
        let max_keys: usize = r
            .query_value("max-keys")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);
        let url_encoded = !self.raw_listing_keys && r.query_value("encoding-type") == Some("url");
        let start_after = r
            .query_value("continuation-token")
            .and_then(|t| hex::decode(t).ok())
            .map(|t| String::from_utf8_lossy(&t).into_owned());

        let bucket = self.bucket(&r.bucket);
        let matching: Vec<(&String, &StoredObject)> = bucket
            .objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .filter(|(k, _)| start_after.as_ref().is_none_or(|s| k.as_str() > s.as_str()))
            .collect();
        let truncated = matching.len() > max_keys;
        let page = &matching[..matching.len().min(max_keys)];

        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">",
        );
        xml.push_str(&format!(
            "<Name>{}</Name><Prefix>{}</Prefix><KeyCount>{}</KeyCount><MaxKeys>{max_keys}</MaxKeys>",
            escape(&r.bucket),
            escape(prefix),
            page.len()
        ));
        if url_encoded {
            xml.push_str("<EncodingType>url</EncodingType>");
        }
        xml.push_str(&format!("<IsTruncated>{truncated}</IsTruncated>"));
        if let (true, Some((last, _))) = (truncated, page.last()) {
            xml.push_str(&format!(
                "<NextContinuationToken>{}</NextContinuationToken>",
                hex::encode(last.as_bytes())
            ));
        }
        for (key, object) in page {
            let key = if url_encoded {
                url_encode_key(key)
            } else {
                escape(key)
            };
            xml.push_str(&format!(
                "<Contents><Key>{key}</Key><LastModified>{}</LastModified>\
                 <ETag>{}</ETag><Size>{}</Size><StorageClass>STANDARD</StorageClass></Contents>",
                object.last_modified.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                escape(&object.etag),
                object.body.len()
            ));
        }
        xml.push_str("</ListBucketResult>");
        response(StatusCode::OK, xml)
    }

    fn upload_part(&mut self, r: &RecordedRequest) -> http::Response<ResponseBody> {
        let upload_id = r.query_value("uploadId").unwrap_or_default();
        let Some(part_number) = r
            .query_value("partNumber")
            .and_then(|n| n.parse::<u32>().ok())
        else {
            return error(StatusCode::BAD_REQUEST, "InvalidArgument", "bad partNumber");
        };
        let Some(upload) = self.uploads.get_mut(upload_id) else {
            return no_such_upload();
        };
        let etag = etag_of(&r.body);
        upload
            .parts
            .insert(part_number, (etag.clone(), r.body.clone()));
        with_etag(empty(StatusCode::OK), &etag)
    }

    fn complete(&mut self, r: &RecordedRequest) -> http::Response<ResponseBody> {
        let upload_id = r.query_value("uploadId").unwrap_or_default();
        let Some(upload) = self.uploads.get(upload_id) else {
            return no_such_upload();
        };

        let manifest = String::from_utf8_lossy(&r.body);
        let numbers = element_texts(&manifest, "PartNumber");
        let etags = element_texts(&manifest, "ETag");
        if numbers.is_empty() || numbers.len() != etags.len() {
            return error(
                StatusCode::BAD_REQUEST,
                "MalformedXML",
                "invalid manifest",
            );
        }

        let mut data = BytesMut::new();
        let mut previous = 0u32;
        for (number, etag) in numbers.iter().zip(&etags) {
            let Ok(number) = number.parse::<u32>() else {
                return error(StatusCode::BAD_REQUEST, "MalformedXML", "bad PartNumber");
            };
            if number <= previous {
                return error(
                    StatusCode::BAD_REQUEST,
                    "InvalidPartOrder",
                    "parts must be in ascending order",
                );
            }
            previous = number;
            match upload.parts.get(&number) {
                Some((stored_etag, body)) if stored_etag == etag => data.extend_from_slice(body),
                _ => {
                    return error(
                        StatusCode::BAD_REQUEST,
                        "InvalidPart",
                        "one or more parts could not be found",
                    );
                }
            }
        }

        let Some(upload) = self.uploads.remove(upload_id) else {
            return no_such_upload();
        };
        let object = stored(data.freeze());
        let etag = object.etag.clone();
        self.bucket(&upload.bucket)
            .objects
            .insert(upload.key.clone(), object);
        response(
            StatusCode::OK,
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                 <CompleteMultipartUploadResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
                 <Location>http://localhost:9000/{0}/{1}</Location><Bucket>{0}</Bucket>\
                 <Key>{1}</Key><ETag>{2}</ETag></CompleteMultipartUploadResult>",
                escape(&upload.bucket),
                escape(&upload.key),
                escape(&etag)
            ),
        )
    }
}

fn stored(body: Bytes) -> StoredObject {
    StoredObject {
        etag: etag_of(&body),
        body,
        last_modified: Utc::now(),
    }
}

fn etag_of(body: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(body));
    format!("\"{}\"", &digest[..32])
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Keys as AWS encodes them with `encoding-type=url`: `/` kept, space as `+`.
fn url_encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| s3kit_auth::canonical::uri_encode(segment).replace("%20", "+"))
        .collect::<Vec<_>>()
        .join("/")
}

fn element_texts(xml: &str, name: &str) -> Vec<String> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let mut out = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        let Some(end) = after.find(&close) else {
            break;
        };
        out.push(unescape(&after[..end]));
        rest = &after[end + close.len()..];
    }
    out
}

fn response(status: StatusCode, body: impl Into<Bytes>) -> http::Response<ResponseBody> {
    let mut out = http::Response::new(ResponseBody::from_bytes(body));
    *out.status_mut() = status;
    out
}

fn empty(status: StatusCode) -> http::Response<ResponseBody> {
    let mut out = http::Response::new(ResponseBody::empty());
    *out.status_mut() = status;
    out
}

fn with_etag(mut out: http::Response<ResponseBody>, etag: &str) -> http::Response<ResponseBody> {
    if let Ok(value) = http::HeaderValue::from_str(etag) {
        out.headers_mut().insert(http::header::ETAG, value);
    }
    out
}

fn error(status: StatusCode, code: &str, message: &str) -> http::Response<ResponseBody> {
    response(
        status,
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <Error><Code>{code}</Code><Message>{}</Message><RequestId>mem-0001</RequestId></Error>",
            escape(message)
        ),
    )
}

fn no_such_upload() -> http::Response<ResponseBody> {
    error(
        StatusCode::NOT_FOUND,
        "NoSuchUpload",
        "The specified upload does not exist",
    )
}
