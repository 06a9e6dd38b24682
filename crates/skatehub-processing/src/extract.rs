//! Dimension extraction for image payloads

use bytes::Bytes;
use image::{ImageError, ImageFormat, ImageReader};
use skatehub_core::{Dimensions, MediaError, MediaKind, MediaResult};
use std::io::Cursor;

/// Pixel dimensions of an image payload, or `None` for non-image kinds.
///
/// Decoding is CPU-bound and runs on the blocking pool.
pub async fn extract_dimensions(data: Bytes, kind: &MediaKind) -> MediaResult<Option<Dimensions>> {
    if !kind.is_image() {
        return Ok(None);
    }

    let kind = kind.clone();
    let dimensions = tokio::task::spawn_blocking(move || decode_dimensions(&data, &kind))
        .await
        .map_err(|e| MediaError::Internal(format!("Failed to process image: {}", e)))??;

    Ok(Some(dimensions))
}

/// Decode `data` as an image of the claimed kind and return its dimensions.
///
/// The whole image is decoded, not just the header, so truncated or mislabeled
/// payloads fail with `CorruptMedia`. Kinds this build has no decoder for fail
/// with `UnsupportedMediaKind`.
pub fn decode_dimensions(data: &[u8], kind: &MediaKind) -> MediaResult<Dimensions> {
    let format = ImageFormat::from_extension(kind.extension())
        .ok_or_else(|| MediaError::UnsupportedMediaKind(kind.subtype().to_string()))?;

    let img = ImageReader::with_format(Cursor::new(data), format)
        .decode()
        .map_err(|e| decode_error(kind, e))?;

    Ok(Dimensions::new(img.width(), img.height()))
}

/// A format this build cannot decode is unsupported; anything else is bad input.
fn decode_error(kind: &MediaKind, err: ImageError) -> MediaError {
    match err {
        ImageError::Unsupported(e) => {
            tracing::warn!(subtype = %kind, error = %e, "No decoder available for allowed image kind");
            MediaError::UnsupportedMediaKind(kind.subtype().to_string())
        }
        e => {
            tracing::warn!(subtype = %kind, error = %e, "Image payload failed to decode");
            MediaError::CorruptMedia(format!("not a valid {} image: {}", kind, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::error::{ImageFormatHint, UnsupportedError, UnsupportedErrorKind};
    use image::{Rgba, RgbaImage};
    use skatehub_core::MediaFamily;

    fn create_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]));
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        if format == ImageFormat::Jpeg {
            image::DynamicImage::ImageRgba8(img)
                .to_rgb8()
                .write_to(&mut cursor, format)
                .unwrap();
        } else {
            img.write_to(&mut cursor, format).unwrap();
        }
        buffer
    }

    fn png() -> MediaKind {
        MediaKind::new(MediaFamily::Image, "png")
    }

    #[tokio::test]
    async fn test_png_dimensions() {
        let data = Bytes::from(create_test_image(10, 20, ImageFormat::Png));
        let dims = extract_dimensions(data, &png()).await.unwrap();
        assert_eq!(dims, Some(Dimensions::new(10, 20)));
    }

    #[tokio::test]
    async fn test_jpeg_dimensions_for_both_spellings() {
        let data = Bytes::from(create_test_image(33, 7, ImageFormat::Jpeg));
        for subtype in ["jpg", "jpeg"] {
            let kind = MediaKind::new(MediaFamily::Image, subtype);
            let dims = extract_dimensions(data.clone(), &kind).await.unwrap();
            assert_eq!(dims, Some(Dimensions::new(33, 7)));
        }
    }

    #[tokio::test]
    async fn test_video_has_no_dimensions() {
        let kind = MediaKind::new(MediaFamily::Video, "mp4");
        let dims = extract_dimensions(Bytes::from_static(b"not decoded"), &kind)
            .await
            .unwrap();
        assert_eq!(dims, None);
    }

    #[tokio::test]
    async fn test_garbage_labeled_png_is_corrupt() {
        let result = extract_dimensions(Bytes::from_static(b"definitely not a png"), &png()).await;
        assert!(matches!(result, Err(MediaError::CorruptMedia(_))));
    }

    #[test]
    fn test_truncated_png_is_corrupt() {
        let mut data = create_test_image(64, 64, ImageFormat::Png);
        data.truncate(data.len() / 2);
        assert!(matches!(
            decode_dimensions(&data, &png()),
            Err(MediaError::CorruptMedia(_))
        ));
    }

    #[test]
    fn test_kind_without_decoder_is_unsupported() {
        let heic = MediaKind::new(MediaFamily::Image, "heic");
        assert!(matches!(
            decode_dimensions(b"ftypheic", &heic),
            Err(MediaError::UnsupportedMediaKind(ref s)) if s == "heic"
        ));

        let avif = MediaKind::new(MediaFamily::Image, "avif");
        let hint = ImageFormatHint::Exact(ImageFormat::Avif);
        let err = ImageError::Unsupported(UnsupportedError::from_format_and_kind(
            hint.clone(),
            UnsupportedErrorKind::Format(hint),
        ));
        assert!(matches!(
            decode_error(&avif, err),
            MediaError::UnsupportedMediaKind(ref s) if s == "avif"
        ));
    }

    #[test]
    fn test_bytes_of_another_format_are_corrupt() {
        let data = create_test_image(5, 5, ImageFormat::Png);
        let jpg = MediaKind::new(MediaFamily::Image, "jpg");
        assert!(matches!(
            decode_dimensions(&data, &jpg),
            Err(MediaError::CorruptMedia(_))
        ));
    }
}
