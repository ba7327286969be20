/// What one part turned out to hold, derived from its content type and its
/// payload after trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// An image attachment. `ext` is used to name the output file when the
    /// part carries no filename attribute of its own.
    Image { ext: &'static str },
    /// A non-empty payload that decodes as UTF-8. Reported, never persisted.
    TextField,
    /// A non-empty payload that is neither an image nor valid UTF-8.
    UnclassifiedBinary,
    /// Nothing left after trimming. Produces no action.
    Empty,
}

impl Classification {
    pub fn of(content_type: Option<&str>, payload: &[u8]) -> Self {
        if payload.is_empty() {
            return Classification::Empty;
        }

        if let Some(ext) = content_type.and_then(image_ext) {
            return Classification::Image { ext };
        }

        if std::str::from_utf8(payload).is_ok() {
            Classification::TextField
        } else {
            Classification::UnclassifiedBinary
        }
    }
}

fn image_ext(content_type: &str) -> Option<&'static str> {
    let mime_type = content_type.parse::<mime::Mime>().ok()?;

    if mime_type.type_() != mime::IMAGE {
        return None;
    }

    Some(match mime_type.subtype().as_str() {
        "jpeg" | "jpg" => ".jpg",
        "png" => ".png",
        "gif" => ".gif",
        _ => ".bin",
    })
}
