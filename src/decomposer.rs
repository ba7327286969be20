use bytes::Bytes;
use log::debug;

use crate::part::disposition_param;
use crate::{Classification, Error, Part};

const MULTIPART_MARKER: &[u8] = b"multipart/form-data";
const CONTENT_TYPE_LINE: &[u8] = b"Content-Type: multipart/form-data";
const BOUNDARY_ATTR: &[u8] = b"boundary=";
const DISPOSITION_MARKER: &[u8] = b"Content-Disposition: form-data";
const CRLF: &[u8] = b"\r\n";

/// An instruction to write a named byte payload to durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistAction {
    pub filename: String,
    pub bytes: Bytes,
}

/// Decomposes one complete raw request into persistence actions, one per
/// extractable image part, in boundary order.
///
/// Requests without a `multipart/form-data` marker or a parsable `boundary=`
/// attribute yield an empty result. A malformed part aborts extraction for
/// the whole request: no partial action list is returned.
///
/// Parts are located by splitting the raw bytes on `--` + boundary. This is a
/// plain substring split, so a payload that happens to contain the delimiter
/// byte sequence will be split incorrectly. Header folding and repeated
/// Content-Type lines are likewise unsupported; only the first matching
/// header line is consulted.
pub fn decompose(request: &[u8], timestamp: &str) -> Result<Vec<PersistAction>, Error> {
    if twoway::find_bytes(request, MULTIPART_MARKER).is_none() {
        return Ok(Vec::new());
    }

    let boundary = match find_boundary(request) {
        Some(b) => b,
        None => {
            debug!("multipart marker present but no parsable boundary");
            return Ok(Vec::new());
        }
    };

    debug!("Splitting on boundary: {:?}", String::from_utf8_lossy(boundary));

    let delimiter = [&b"--"[..], boundary].concat();
    let mut actions = Vec::new();

    for segment in split_bytes(request, &delimiter) {
        // Excludes the request headers, the epilogue and the closing `--` marker.
        if twoway::find_bytes(segment, DISPOSITION_MARKER).is_none() {
            continue;
        }

        let part = match Part::from_segment(segment) {
            Some(part) => part,
            None => {
                debug!("Part without header/body separator, skipping");
                continue;
            }
        };

        let headers = part.headers();
        let content_type = headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string());
        let disposition = headers
            .get(http::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let (field_name, file_name) = match disposition {
            Some(ref value) => (
                disposition_param(value, "name")?,
                disposition_param(value, "filename")?,
            ),
            None => (None, None),
        };

        match Classification::of(content_type.as_deref(), part.payload()) {
            Classification::Image { ext } => {
                let filename = match file_name {
                    Some(original) => format!("{}_{}", timestamp, original),
                    None => format!("{}_image{}", timestamp, ext),
                };

                debug!("Image part ({} bytes) -> {}", part.payload_len(), filename);
                actions.push(PersistAction {
                    filename,
                    bytes: part.into_payload(),
                });
            }

            Classification::TextField => {
                debug!(
                    "Field {}: {:?}",
                    field_name.as_deref().unwrap_or("<unnamed>"),
                    String::from_utf8_lossy(part.payload())
                );
            }

            Classification::UnclassifiedBinary => {
                debug!(
                    "Field {}: binary data ({} bytes)",
                    field_name.as_deref().unwrap_or("<unnamed>"),
                    part.payload_len()
                );
            }

            Classification::Empty => {}
        }
    }

    Ok(actions)
}

/// Finds the boundary token declared in the request headers. Only the first
/// line carrying both the multipart content type and a `boundary=` attribute
/// is consulted.
fn find_boundary(request: &[u8]) -> Option<&[u8]> {
    split_bytes(request, CRLF)
        .into_iter()
        .find(|line| {
            twoway::find_bytes(line, CONTENT_TYPE_LINE).is_some()
                && twoway::find_bytes(line, BOUNDARY_ATTR).is_some()
        })
        .and_then(|line| {
            let i = twoway::find_bytes(line, BOUNDARY_ATTR)?;
            let value = line[i + BOUNDARY_ATTR.len()..].trim_ascii();
            if value.is_empty() {
                None
            } else {
                Some(value)
            }
        })
}

fn split_bytes<'a>(buf: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut segments = Vec::new();
    let mut rest = buf;

    while let Some(i) = twoway::find_bytes(rest, delimiter) {
        segments.push(&rest[..i]);
        rest = &rest[i + delimiter.len()..];
    }

    segments.push(rest);
    segments
}

#[cfg(test)]
mod tests {

    use super::*;

    const TS: &str = "2024-01-02-03-04-05";

    fn upload(parts: &[&str]) -> Vec<u8> {
        let mut req = String::from(
            "POST /upload HTTP/1.1\r\n\
             Host: localhost\r\n\
             Content-Type: multipart/form-data; boundary=XBOUND\r\n\
             \r\n",
        );

        for part in parts {
            req.push_str("--XBOUND\r\n");
            req.push_str(part);
        }

        req.push_str("--XBOUND--\r\n");
        req.into_bytes()
    }

    #[test]
    fn no_marker_yields_nothing() {
        let req = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert!(decompose(req, TS).expect("decompose").is_empty());
    }

    #[test]
    fn marker_without_boundary_yields_nothing() {
        let req = b"POST / HTTP/1.1\r\n\
                    Content-Type: multipart/form-data\r\n\
                    \r\nsome body";
        assert!(decompose(req, TS).expect("decompose").is_empty());
    }

    #[test]
    fn named_image_part_uses_original_filename() {
        let req = upload(&[
            "Content-Disposition: form-data; name=\"photo\"; filename=\"a.png\"\r\n\
             Content-Type: image/png\r\n\
             \r\n\
             PNGDATA\r\n",
        ]);

        let actions = decompose(&req, TS).expect("decompose");

        assert_eq!(1, actions.len());
        assert_eq!("2024-01-02-03-04-05_a.png", actions[0].filename);
        assert_eq!(b"PNGDATA", &actions[0].bytes[..]);
    }

    #[test]
    fn unmapped_image_subtype_without_filename_gets_bin_extension() {
        let req = upload(&[
            "Content-Disposition: form-data; name=\"photo\"\r\n\
             Content-Type: image/bmp\r\n\
             \r\n\
             BMPDATA\r\n",
        ]);

        let actions = decompose(&req, TS).expect("decompose");

        assert_eq!(1, actions.len());
        assert_eq!("2024-01-02-03-04-05_image.bin", actions[0].filename);
    }

    #[test]
    fn text_fields_are_not_persisted() {
        let req = upload(&[
            "Content-Disposition: form-data; name=\"comment\"\r\n\
             \r\n\
             a plain text value\r\n",
            "Content-Disposition: form-data; name=\"tag\"\r\n\
             Content-Type: text/plain\r\n\
             \r\n\
             tagged\r\n",
        ]);

        assert!(decompose(&req, TS).expect("decompose").is_empty());
    }

    #[test]
    fn non_utf8_non_image_part_is_not_persisted() {
        let mut req = upload(&[]);
        let pos = twoway::find_bytes(&req, b"--XBOUND--").expect("closing marker");
        let part: &[u8] = b"--XBOUND\r\n\
              Content-Disposition: form-data; name=\"blob\"\r\n\
              Content-Type: application/octet-stream\r\n\
              \r\n\
              \xff\xfe\x00\x01\r\n";
        req.splice(pos..pos, part.iter().copied());

        assert!(decompose(&req, TS).expect("decompose").is_empty());
    }

    #[test]
    fn image_parts_keep_boundary_order() {
        let req = upload(&[
            "Content-Disposition: form-data; name=\"a\"; filename=\"first.jpg\"\r\n\
             Content-Type: image/jpeg\r\n\
             \r\n\
             ONE\r\n",
            "Content-Disposition: form-data; name=\"b\"\r\n\
             Content-Type: image/gif\r\n\
             \r\n\
             TWO\r\n",
            "Content-Disposition: form-data; name=\"c\"; filename=\"third.png\"\r\n\
             Content-Type: image/png\r\n\
             \r\n\
             THREE\r\n",
        ]);

        let actions = decompose(&req, TS).expect("decompose");

        let names: Vec<&str> = actions.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(
            vec![
                "2024-01-02-03-04-05_first.jpg",
                "2024-01-02-03-04-05_image.gif",
                "2024-01-02-03-04-05_third.png",
            ],
            names
        );
    }

    #[test]
    fn payload_of_bare_crlf_is_empty_and_skipped() {
        let req = upload(&[
            "Content-Disposition: form-data; name=\"photo\"\r\n\
             Content-Type: image/png\r\n\
             \r\n\
             \r\n",
        ]);

        assert!(decompose(&req, TS).expect("decompose").is_empty());
    }

    #[test]
    fn part_without_separator_is_skipped() {
        // No blank line between headers and payload.
        let req = upload(&["Content-Disposition: form-data; name=\"photo\"\r\nPNGDATA\r\n"]);

        assert!(decompose(&req, TS).expect("decompose").is_empty());
    }

    #[test]
    fn malformed_part_discards_the_whole_request() {
        // A valid image part followed by an unterminated filename attribute.
        let req = upload(&[
            "Content-Disposition: form-data; name=\"a\"; filename=\"ok.png\"\r\n\
             Content-Type: image/png\r\n\
             \r\n\
             GOOD\r\n",
            "Content-Disposition: form-data; name=\"b\"; filename=\"broken.png\r\n\
             Content-Type: image/png\r\n\
             \r\n\
             BAD\r\n",
        ]);

        match decompose(&req, TS) {
            Err(Error::MalformedPart(_)) => {}
            other => panic!("expected MalformedPart, got {:?}", other.map(|a| a.len())),
        }
    }
}
