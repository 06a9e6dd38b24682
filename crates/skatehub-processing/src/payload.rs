//! Submitted media payloads
//!
//! A payload arrives either as a multipart file (bytes plus whatever filename and
//! content type the client declared) or as an inline base64 string, usually a
//! `data:<mime>;base64,` URI produced by a browser canvas or file reader.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use bytes::Bytes;
use skatehub_core::{MediaError, MediaResult};
use std::borrow::Cow;
use std::path::Path;

/// Standard alphabet, padding optional: some clients strip the trailing `=`.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Base64 characters decoded up front for content sniffing (66 bytes)
const SNIFF_CHARS: usize = 88;

/// Bytes of a multipart payload inspected for content sniffing
const SNIFF_BYTES: usize = 64;

#[derive(Debug, Clone)]
pub enum PayloadDescriptor {
    /// Uploaded file with client-declared metadata
    Multipart {
        filename: Option<String>,
        content_type: Option<String>,
        data: Bytes,
    },
    /// Inline base64, with or without a `data:<mime>;base64,` prefix
    DataUri(String),
}

impl PayloadDescriptor {
    pub fn multipart(
        filename: Option<String>,
        content_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        PayloadDescriptor::Multipart {
            filename,
            content_type,
            data: data.into(),
        }
    }

    pub fn data_uri(value: impl Into<String>) -> Self {
        PayloadDescriptor::DataUri(value.into())
    }

    /// Client-declared filename, if any
    pub fn filename(&self) -> Option<&str> {
        match self {
            PayloadDescriptor::Multipart { filename, .. } => filename.as_deref(),
            PayloadDescriptor::DataUri(_) => None,
        }
    }

    /// Lowercased extension of the declared filename
    pub fn filename_extension(&self) -> Option<String> {
        self.filename()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Declared MIME type: the multipart content type or the data URI media type
    pub fn declared_mime(&self) -> Option<&str> {
        let mime = match self {
            PayloadDescriptor::Multipart { content_type, .. } => content_type.as_deref(),
            PayloadDescriptor::DataUri(value) => split_data_uri(value).ok()?.0,
        };
        mime.map(str::trim).filter(|m| !m.is_empty())
    }

    /// Leading bytes of the payload for content sniffing.
    ///
    /// For inline payloads only a short prefix is decoded; malformed base64
    /// yields an empty slice and is reported when the payload is decoded in full.
    pub fn head(&self) -> Cow<'_, [u8]> {
        match self {
            PayloadDescriptor::Multipart { data, .. } => {
                Cow::Borrowed(&data[..data.len().min(SNIFF_BYTES)])
            }
            PayloadDescriptor::DataUri(value) => {
                let Ok((_, body)) = split_data_uri(value) else {
                    return Cow::Owned(Vec::new());
                };
                let prefix: Vec<u8> = body
                    .bytes()
                    .filter(|b| !b.is_ascii_whitespace())
                    .take(SNIFF_CHARS)
                    .collect();
                let usable = prefix.len() - prefix.len() % 4;
                Cow::Owned(BASE64.decode(&prefix[..usable]).unwrap_or_default())
            }
        }
    }

    /// Upper bound on the decoded size, computed without decoding.
    pub fn estimated_size(&self) -> usize {
        match self {
            PayloadDescriptor::Multipart { data, .. } => data.len(),
            PayloadDescriptor::DataUri(value) => match split_data_uri(value) {
                Ok((_, body)) => body.len().div_ceil(4) * 3,
                Err(_) => 0,
            },
        }
    }

    /// Decode the payload into raw bytes, enforcing `max_bytes`.
    ///
    /// Empty payloads and malformed base64 fail with `CorruptMedia`.
    pub fn into_bytes(self, max_bytes: usize) -> MediaResult<Bytes> {
        let data = match self {
            PayloadDescriptor::Multipart { data, .. } => data,
            PayloadDescriptor::DataUri(value) => decode_inline(&value, max_bytes)?,
        };

        if data.is_empty() {
            return Err(MediaError::CorruptMedia("empty payload".to_string()));
        }
        if data.len() > max_bytes {
            return Err(MediaError::PayloadTooLarge {
                size: data.len(),
                max: max_bytes,
            });
        }

        Ok(data)
    }
}

/// Split an inline payload into (declared MIME, base64 body).
///
/// A string without the `data:` scheme is taken to be bare base64.
fn split_data_uri(value: &str) -> MediaResult<(Option<&str>, &str)> {
    let value = value.trim();
    let Some(rest) = value.strip_prefix("data:") else {
        return Ok((None, value));
    };

    let (header, body) = rest
        .split_once(',')
        .ok_or_else(|| MediaError::CorruptMedia("data URI has no payload".to_string()))?;

    let mut params = header.split(';');
    let mime = params.next().filter(|m| !m.is_empty());
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(MediaError::CorruptMedia(
            "data URI is not base64 encoded".to_string(),
        ));
    }

    Ok((mime, body))
}

fn decode_inline(value: &str, max_bytes: usize) -> MediaResult<Bytes> {
    let (_, body) = split_data_uri(value)?;

    let cleaned: Vec<u8> = body
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    let estimated = cleaned.len() / 4 * 3;
    if estimated > max_bytes {
        return Err(MediaError::PayloadTooLarge {
            size: estimated,
            max: max_bytes,
        });
    }

    let decoded = BASE64
        .decode(&cleaned)
        .map_err(|e| MediaError::CorruptMedia(format!("invalid base64 payload: {}", e)))?;

    Ok(Bytes::from(decoded))
}
