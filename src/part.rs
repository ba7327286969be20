use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::Error;

const HEADER_BODY_SEPARATOR: &[u8] = b"\r\n\r\n";
const CRLF: &[u8] = b"\r\n";

/// One boundary-delimited segment of a multipart body. Lives only for the
/// duration of one decomposition call.
pub struct Part {
    // Just store the headers as the entire lines for now.
    headers_data: Bytes,
    payload_data: Bytes,
}

impl Part {
    /// Splits a segment into its sub-header block and payload on the first
    /// blank line. Segments without the separator yield `None` and are
    /// skipped by the caller, not treated as malformed.
    pub(crate) fn from_segment(bs: &[u8]) -> Option<Self> {
        let i = twoway::find_bytes(bs, HEADER_BODY_SEPARATOR)?;
        let mut payload = &bs[i + HEADER_BODY_SEPARATOR.len()..];

        // The trailing CRLF belongs to the next boundary marker, not the payload.
        if payload.ends_with(CRLF) {
            payload = &payload[..payload.len() - CRLF.len()];
        }

        Some(Part {
            headers_data: Bytes::copy_from_slice(&bs[..i]),
            payload_data: Bytes::copy_from_slice(payload),
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload_data
    }

    pub fn into_payload(self) -> Bytes {
        self.payload_data
    }

    pub fn payload_len(&self) -> usize {
        self.payload_data.len()
    }

    /// Returns an iterator over all the header lines, with their line endings trimmed.
    pub fn header_lines(&self) -> impl Iterator<Item = Result<&str, std::str::Utf8Error>> {
        let slice = &self.headers_data;
        slice.split(|e| *e == b'\n').map(|line| {
            // trim of the last \r
            std::str::from_utf8(line).map(|s| s.trim())
        })
    }

    pub fn headers(&self) -> HeaderMap<HeaderValue> {
        let mut res = HeaderMap::new();

        self.header_lines()
            .filter_map(|line| line.ok())
            .filter_map(parse_header_line)
            .for_each(|(name, value)| {
                res.insert(name, value);
            });

        res
    }
}

fn parse_header_line(s: &str) -> Option<(HeaderName, HeaderValue)> {
    s.find(':')?;

    let mut parts = s.split(':');

    let header_name = parts
        .next()
        .map(|s| HeaderName::from_bytes(s.trim().as_bytes()));

    let header_value = parts.next().map(|s| HeaderValue::from_str(s.trim()));

    match (header_name, header_value) {
        (Some(Ok(name)), Some(Ok(value))) => Some((name, value)),
        _ => None,
    }
}

/// Extracts a quoted attribute such as `name="photo"` from a
/// Content-Disposition value. An opening quote without a closing quote is
/// malformed and aborts the whole request's extraction.
pub(crate) fn disposition_param(value: &str, key: &str) -> Result<Option<String>, Error> {
    let needle = format!("{}=\"", key);

    for (i, _) in value.match_indices(&needle) {
        // `name="` also occurs inside `filename="`; require an attribute start.
        if i > 0 && value.as_bytes()[i - 1].is_ascii_alphanumeric() {
            continue;
        }

        let start = i + needle.len();
        return match value[start..].find('"') {
            Some(end) => Ok(Some(value[start..start + end].to_string())),
            None => Err(Error::malformed(format!("unterminated {}= attribute", key))),
        };
    }

    Ok(None)
}
