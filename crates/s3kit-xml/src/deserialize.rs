//! S3 XML deserialization: parsing provider response documents.
//!
//! Unknown elements are skipped so that provider extensions (`Owner`,
//! `ChecksumAlgorithm`, `CommonPrefixes`, ...) never break decoding.

use quick_xml::Reader;
use quick_xml::events::Event;
use s3kit_model::S3ErrorResponse;
use s3kit_model::output::{
    CompleteMultipartUploadOutput, CreateMultipartUploadOutput, ListObjectsV2Output,
};
use s3kit_model::types::S3Object;
use tracing::trace;

use crate::error::XmlError;

/// Trait for deserializing S3 types from XML.
///
/// The root element has already been consumed by the caller; the implementation
/// reads child elements until the matching end tag.
pub trait S3Deserialize: Sized {
    /// Deserialize an instance from the given XML reader.
    ///
    /// The reader is positioned just after the opening tag of this element.
    ///
    /// # Errors
    ///
    /// Returns `XmlError` if the XML is malformed or required fields are missing.
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError>;
}

/// Deserialize S3-compatible XML into a typed value.
///
/// Finds the root element and delegates to the type's `S3Deserialize` implementation.
///
/// # Errors
///
/// Returns `XmlError` if the XML is malformed or deserialization fails.
pub fn from_xml<T: S3Deserialize>(xml: &[u8]) -> Result<T, XmlError> {
    let mut reader = Reader::from_reader(xml);

    loop {
        match reader.read_event()? {
            Event::Start(_) => {
                return T::deserialize_xml(&mut reader);
            }
            Event::Eof => {
                return Err(XmlError::MissingElement("root element".to_string()));
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read the text content of the current element and consume its end tag.
///
/// Text is kept byte for byte: object keys may start or end with whitespace
/// and quick-xml splits text around entity references.
fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let decoded = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                let unescaped = quick_xml::escape::unescape(&decoded)
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::GeneralRef(e) => {
                // quick-xml 0.38+ reports entity references separately.
                let name = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                let entity = format!("&{name};");
                let unescaped = quick_xml::escape::unescape(&entity)
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::End(_) => {
                return Ok(text);
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while reading text content".to_string(),
                ));
            }
            _ => {}
        }
    }
}

/// Skip over an element and all its children.
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while skipping element".to_string(),
                ));
            }
            _ => {}
        }
    }
}

/// Walk the children of the current element, calling `on_child` for every start tag.
///
/// `on_child` must consume the child up to and including its end tag. Empty
/// elements (`<Tag/>`) are passed with `empty == true` and nothing to consume.
fn for_each_child<F>(reader: &mut Reader<&[u8]>, context: &str, mut on_child: F) -> Result<(), XmlError>
where
    F: FnMut(&mut Reader<&[u8]>, &str, bool) -> Result<(), XmlError>,
{
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = std::str::from_utf8(e.name().as_ref())
                    .map_err(|err| XmlError::ParseError(err.to_string()))?
                    .to_owned();
                on_child(reader, &name, false)?;
            }
            Event::Empty(e) => {
                let name = std::str::from_utf8(e.name().as_ref())
                    .map_err(|err| XmlError::ParseError(err.to_string()))?
                    .to_owned();
                on_child(reader, &name, true)?;
            }
            Event::End(_) => return Ok(()),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(format!(
                    "unexpected EOF in {context}"
                )));
            }
            _ => {}
        }
    }
}

/// Read a text child, treating `<Tag/>` as the empty string.
fn read_child_text(reader: &mut Reader<&[u8]>, empty: bool) -> Result<String, XmlError> {
    if empty {
        Ok(String::new())
    } else {
        read_text_content(reader)
    }
}

/// Skip a child unless it was an empty element.
fn skip_child(reader: &mut Reader<&[u8]>, name: &str, empty: bool) -> Result<(), XmlError> {
    trace!(element = name, "skipping unknown element");
    if empty { Ok(()) } else { skip_element(reader) }
}

fn parse_bool(s: &str) -> Result<bool, XmlError> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(XmlError::ParseError(format!("invalid boolean: {s}"))),
    }
}

fn parse_u32(s: &str) -> Result<u32, XmlError> {
    s.parse::<u32>()
        .map_err(|e| XmlError::ParseError(format!("invalid u32 '{s}': {e}")))
}

fn parse_u64(s: &str) -> Result<u64, XmlError> {
    s.parse::<u64>()
        .map_err(|e| XmlError::ParseError(format!("invalid u64 '{s}': {e}")))
}

/// Parse an ISO 8601 timestamp from XML text.
fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>, XmlError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .or_else(|_| {
            // S3 format without offset: 2006-02-03T16:45:09.000Z
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| XmlError::ParseError(format!("invalid timestamp '{s}': {e}")))
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

// ---------------------------------------------------------------------------
// Response documents
// ---------------------------------------------------------------------------

/// A `<Contents>` entry of `ListBucketResult`.
///
/// `Key`, `Size` and `LastModified` are required. A missing `ETag` decodes as
/// the empty string and a missing `StorageClass` as `STANDARD`.
impl S3Deserialize for S3Object {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut key = None;
        let mut size = None;
        let mut etag = None;
        let mut last_modified = None;
        let mut storage_class = None;

        for_each_child(reader, "Contents", |reader, name, empty| {
            match name {
                "Key" => key = Some(read_child_text(reader, empty)?),
                "Size" => size = Some(parse_u64(&read_child_text(reader, empty)?)?),
                "ETag" => etag = Some(read_child_text(reader, empty)?),
                "LastModified" => {
                    last_modified = Some(parse_timestamp(&read_child_text(reader, empty)?)?);
                }
                "StorageClass" => storage_class = non_empty(read_child_text(reader, empty)?),
                _ => skip_child(reader, name, empty)?,
            }
            Ok(())
        })?;

        Ok(S3Object {
            key: key.ok_or_else(|| XmlError::MissingElement("Key".to_string()))?,
            size: size.ok_or_else(|| XmlError::MissingElement("Size".to_string()))?,
            etag: etag.unwrap_or_default(),
            last_modified: last_modified
                .ok_or_else(|| XmlError::MissingElement("LastModified".to_string()))?,
            storage_class: storage_class.unwrap_or_else(|| "STANDARD".to_string()),
        })
    }
}

/// `ListBucketResult` as returned by `ListObjectsV2`.
impl S3Deserialize for ListObjectsV2Output {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut output = ListObjectsV2Output::default();

        for_each_child(reader, "ListBucketResult", |reader, name, empty| {
            match name {
                "Contents" => {
                    if !empty {
                        output.contents.push(S3Object::deserialize_xml(reader)?);
                    }
                }
                "Name" => output.name = non_empty(read_child_text(reader, empty)?),
                "Prefix" => output.prefix = non_empty(read_child_text(reader, empty)?),
                "IsTruncated" => {
                    output.is_truncated = parse_bool(&read_child_text(reader, empty)?)?;
                }
                "ContinuationToken" => {
                    output.continuation_token = non_empty(read_child_text(reader, empty)?);
                }
                "NextContinuationToken" => {
                    output.next_continuation_token = non_empty(read_child_text(reader, empty)?);
                }
                "KeyCount" => output.key_count = Some(parse_u32(&read_child_text(reader, empty)?)?),
                "MaxKeys" => output.max_keys = Some(parse_u32(&read_child_text(reader, empty)?)?),
                "EncodingType" => output.encoding_type = non_empty(read_child_text(reader, empty)?),
                "StartAfter" => output.start_after = non_empty(read_child_text(reader, empty)?),
                _ => skip_child(reader, name, empty)?,
            }
            Ok(())
        })?;

        Ok(output)
    }
}

/// `InitiateMultipartUploadResult`. `UploadId` is required.
impl S3Deserialize for CreateMultipartUploadOutput {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut bucket = None;
        let mut key = None;
        let mut upload_id = None;

        for_each_child(reader, "InitiateMultipartUploadResult", |reader, name, empty| {
            match name {
                "Bucket" => bucket = non_empty(read_child_text(reader, empty)?),
                "Key" => key = non_empty(read_child_text(reader, empty)?),
                "UploadId" => upload_id = non_empty(read_child_text(reader, empty)?),
                _ => skip_child(reader, name, empty)?,
            }
            Ok(())
        })?;

        Ok(CreateMultipartUploadOutput {
            bucket,
            key,
            upload_id: upload_id.ok_or_else(|| XmlError::MissingElement("UploadId".to_string()))?,
        })
    }
}

/// `CompleteMultipartUploadResult`.
impl S3Deserialize for CompleteMultipartUploadOutput {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut output = CompleteMultipartUploadOutput::default();

        for_each_child(reader, "CompleteMultipartUploadResult", |reader, name, empty| {
            match name {
                "Location" => output.location = non_empty(read_child_text(reader, empty)?),
                "Bucket" => output.bucket = non_empty(read_child_text(reader, empty)?),
                "Key" => output.key = non_empty(read_child_text(reader, empty)?),
                "ETag" => output.etag = non_empty(read_child_text(reader, empty)?),
                _ => skip_child(reader, name, empty)?,
            }
            Ok(())
        })?;

        Ok(output)
    }
}

/// The flat `<Error>` document S3 returns on failures.
impl S3Deserialize for S3ErrorResponse {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut error = S3ErrorResponse::default();

        for_each_child(reader, "Error", |reader, name, empty| {
            match name {
                "Code" => error.code = read_child_text(reader, empty)?,
                "Message" => error.message = read_child_text(reader, empty)?,
                "Resource" => error.resource = non_empty(read_child_text(reader, empty)?),
                "RequestId" => error.request_id = non_empty(read_child_text(reader, empty)?),
                _ => skip_child(reader, name, empty)?,
            }
            Ok(())
        })?;

        Ok(error)
    }
}
