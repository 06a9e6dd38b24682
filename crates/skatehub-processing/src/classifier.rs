use crate::payload::PayloadDescriptor;
use skatehub_core::{MediaConfig, MediaError, MediaFamily, MediaKind, MediaResult};

/// Subtypes accepted when no allow-list is configured
pub const DEFAULT_ALLOWED_SUBTYPES: &[&str] = &["png", "jpg", "jpeg", "mp4"];

/// Determines the real media kind of a payload and enforces the allow-list.
///
/// Evidence is weighed in order: magic bytes sniffed from the payload, then the
/// declared MIME type (multipart content type or data URI media type), then the
/// filename extension. Classification never looks past the first few bytes, so
/// a payload that only claims to be an image is caught later by decoding.
#[derive(Debug, Clone)]
pub struct MediaClassifier {
    allowed_subtypes: Vec<String>,
}

impl Default for MediaClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_SUBTYPES.iter().map(|s| s.to_string()))
    }
}

impl MediaClassifier {
    pub fn new<I, S>(allowed_subtypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_subtypes: allowed_subtypes
                .into_iter()
                .map(|s| s.as_ref().trim().trim_start_matches('.').to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(&config.allowed_subtypes)
    }

    pub fn allowed_subtypes(&self) -> &[String] {
        &self.allowed_subtypes
    }

    pub fn is_allowed(&self, kind: &MediaKind) -> bool {
        self.allowed_subtypes.iter().any(|s| s == kind.subtype())
    }

    /// Classify a payload, failing with `UnsupportedMediaKind` unless the
    /// detected subtype is on the allow-list. Video whose bytes are not a
    /// recognizable container fails with `CorruptMedia`.
    pub fn classify(&self, payload: &PayloadDescriptor) -> MediaResult<MediaKind> {
        let kind = self
            .detect(payload)
            .ok_or_else(|| MediaError::UnsupportedMediaKind("unknown".to_string()))?;

        if !self.is_allowed(&kind) {
            tracing::debug!(
                subtype = %kind.subtype(),
                allowed = ?self.allowed_subtypes,
                "Rejected media kind"
            );
            return Err(MediaError::UnsupportedMediaKind(kind.subtype().to_string()));
        }

        // Video is never decoded, so its container must be recognized up front.
        if kind.is_video() && sniff(&payload.head()).is_none() {
            return Err(MediaError::CorruptMedia(format!(
                "payload is not a recognizable {} container",
                kind
            )));
        }

        Ok(kind)
    }

    /// Best guess at the payload's kind, without applying the allow-list.
    pub fn detect(&self, payload: &PayloadDescriptor) -> Option<MediaKind> {
        let extension = payload.filename_extension();

        if let Some(sniffed) = sniff(&payload.head()) {
            // JPEG sniffs as `jpg`; keep the client's spelling when it said `jpeg`.
            if sniffed.subtype() == "jpg" && extension.as_deref() == Some("jpeg") {
                return Some(MediaKind::new(MediaFamily::Image, "jpeg"));
            }
            return Some(sniffed);
        }

        let declared = payload
            .declared_mime()
            .filter(|mime| !is_generic_mime(mime))
            .and_then(MediaKind::from_mime);
        if let Some(kind) = declared {
            return Some(kind);
        }

        extension.map(|ext| MediaKind::from_extension(&ext))
    }
}

fn is_generic_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("application/octet-stream")
        || essence.eq_ignore_ascii_case("binary/octet-stream")
}

/// Identify a media kind from leading magic bytes.
pub fn sniff(head: &[u8]) -> Option<MediaKind> {
    if let Ok(format) = image::guess_format(head) {
        if let Some(ext) = format.extensions_str().first() {
            return Some(MediaKind::new(MediaFamily::Image, *ext));
        }
    }
    sniff_video(head)
}

fn sniff_video(head: &[u8]) -> Option<MediaKind> {
    // ISO base media: [size:4]["ftyp"][major brand:4]
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return Some(iso_brand_kind(&head[8..12]));
    }

    // Matroska / WebM: EBML header, DocType names the flavour.
    if head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        let is_webm = head.windows(4).any(|w| w == b"webm");
        let subtype = if is_webm { "webm" } else { "mkv" };
        return Some(MediaKind::new(MediaFamily::Video, subtype));
    }

    if head.len() >= 12 && &head[0..4] == b"RIFF" && &head[8..12] == b"AVI " {
        return Some(MediaKind::new(MediaFamily::Video, "avi"));
    }

    None
}

/// Kind named by an ISO base media `ftyp` major brand.
///
/// Only the MP4 brands classify as `mp4`. HEIF stills, M4A audio and 3GPP share
/// the container but are different media; an unknown brand keeps its own name.
fn iso_brand_kind(brand: &[u8]) -> MediaKind {
    match brand {
        b"isom" | b"iso2" | b"iso3" | b"iso4" | b"iso5" | b"iso6" | b"iso8" | b"iso9"
        | b"mp41" | b"mp42" | b"mp71" | b"avc1" | b"dash" | b"mmp4" | b"MSNV" | b"NDAS"
        | b"f4v " => MediaKind::new(MediaFamily::Video, "mp4"),
        b"qt  " => MediaKind::new(MediaFamily::Video, "mov"),
        b"M4V " | b"M4VH" | b"M4VP" => MediaKind::new(MediaFamily::Video, "m4v"),
        b"heic" | b"heix" | b"heim" | b"heis" | b"hevc" | b"hevx" => {
            MediaKind::new(MediaFamily::Image, "heic")
        }
        b"mif1" | b"msf1" | b"heif" => MediaKind::new(MediaFamily::Image, "heif"),
        b"avif" | b"avis" => MediaKind::new(MediaFamily::Image, "avif"),
        b"M4A " | b"M4B " | b"M4P " => MediaKind::new(MediaFamily::Audio, "m4a"),
        [b'3', b'g', ..] => MediaKind::new(MediaFamily::Video, "3gp"),
        other => {
            let name: String = other
                .iter()
                .filter(|b| b.is_ascii_alphanumeric())
                .map(|&b| b as char)
                .collect();
            if name.is_empty() {
                MediaKind::new(MediaFamily::Other, "unknown")
            } else {
                MediaKind::new(MediaFamily::Other, name)
            }
        }
    }
}
