use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Top-level MIME family of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFamily {
    Image,
    Video,
    Audio,
    Other,
}

/// Known subtypes: (extension, canonical MIME type, family).
///
/// The first entry for a MIME type is its canonical extension, so `image/jpeg`
/// classifies as `jpg`.
const KNOWN_SUBTYPES: &[(&str, &str, MediaFamily)] = &[
    ("png", "image/png", MediaFamily::Image),
    ("jpg", "image/jpeg", MediaFamily::Image),
    ("jpeg", "image/jpeg", MediaFamily::Image),
    ("gif", "image/gif", MediaFamily::Image),
    ("webp", "image/webp", MediaFamily::Image),
    ("bmp", "image/bmp", MediaFamily::Image),
    ("tiff", "image/tiff", MediaFamily::Image),
    ("avif", "image/avif", MediaFamily::Image),
    ("heic", "image/heic", MediaFamily::Image),
    ("heif", "image/heif", MediaFamily::Image),
    ("mp4", "video/mp4", MediaFamily::Video),
    ("mov", "video/quicktime", MediaFamily::Video),
    ("m4v", "video/x-m4v", MediaFamily::Video),
    ("webm", "video/webm", MediaFamily::Video),
    ("avi", "video/x-msvideo", MediaFamily::Video),
    ("mkv", "video/x-matroska", MediaFamily::Video),
    ("3gp", "video/3gpp", MediaFamily::Video),
    ("m4a", "audio/mp4", MediaFamily::Audio),
];

/// Classified media type of a payload.
///
/// The subtype doubles as the normalized file extension used in storage keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaKind {
    family: MediaFamily,
    subtype: String,
}

impl MediaKind {
    pub fn new(family: MediaFamily, subtype: impl Into<String>) -> Self {
        Self {
            family,
            subtype: subtype.into().trim().to_lowercase(),
        }
    }

    /// Kind for a MIME type such as `image/jpeg` or `video/mp4; codecs=avc1`.
    ///
    /// Unknown subtypes keep the MIME subtype as-is so rejections can name it.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next()?.trim().to_lowercase();
        let (top, sub) = essence.split_once('/')?;
        if top.is_empty() || sub.is_empty() {
            return None;
        }

        if let Some((ext, _, family)) = KNOWN_SUBTYPES.iter().find(|(_, m, _)| *m == essence) {
            return Some(Self::new(*family, *ext));
        }

        let family = match top {
            "image" => MediaFamily::Image,
            "video" => MediaFamily::Video,
            "audio" => MediaFamily::Audio,
            _ => MediaFamily::Other,
        };
        Some(Self::new(family, sub))
    }

    /// Kind for a bare file extension (no leading dot).
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.trim().trim_start_matches('.').to_lowercase();
        let family = KNOWN_SUBTYPES
            .iter()
            .find(|(e, _, _)| *e == ext)
            .map(|(_, _, family)| *family)
            .unwrap_or(MediaFamily::Other);
        Self::new(family, ext)
    }

    pub fn family(&self) -> MediaFamily {
        self.family
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// Normalized extension used for `{key}.{extension}` storage keys
    pub fn extension(&self) -> &str {
        &self.subtype
    }

    pub fn is_image(&self) -> bool {
        self.family == MediaFamily::Image
    }

    pub fn is_video(&self) -> bool {
        self.family == MediaFamily::Video
    }

    /// Canonical MIME type sent to the object store
    pub fn content_type(&self) -> &'static str {
        KNOWN_SUBTYPES
            .iter()
            .find(|(e, _, _)| *e == self.subtype)
            .map(|(_, mime, _)| *mime)
            .unwrap_or("application/octet-stream")
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.subtype)
    }
}
