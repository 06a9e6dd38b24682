//! Payload fixtures

use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use skatehub_processing::PayloadDescriptor;
use std::io::Cursor;

/// Encode a solid-colour `width`×`height` image in `format`.
pub fn image_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    let result = match format {
        // JPEG has no alpha channel
        ImageFormat::Jpeg => DynamicImage::ImageRgba8(img).to_rgb8().write_to(&mut cursor, format),
        _ => img.write_to(&mut cursor, format),
    };
    if let Err(e) = result {
        panic!("failed to encode {:?} fixture: {}", format, e);
    }
    buffer
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    image_bytes(width, height, ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    image_bytes(width, height, ImageFormat::Jpeg)
}

pub fn gif_bytes(width: u32, height: u32) -> Vec<u8> {
    image_bytes(width, height, ImageFormat::Gif)
}

/// Minimal MP4: an `ftyp` box followed by an empty `mdat`.
pub fn mp4_bytes() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x18]);
    data.extend_from_slice(b"ftypisom");
    data.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
    data.extend_from_slice(b"isommp42");
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x08]);
    data.extend_from_slice(b"mdat");
    data
}

/// Multipart payload with a filename and declared content type.
pub fn file_payload(filename: &str, content_type: &str, data: Vec<u8>) -> PayloadDescriptor {
    PayloadDescriptor::multipart(
        Some(filename.to_string()),
        Some(content_type.to_string()),
        data,
    )
}

/// `data:<mime>;base64,...` payload as a browser would submit it.
pub fn data_uri_payload(mime: &str, data: &[u8]) -> PayloadDescriptor {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    PayloadDescriptor::data_uri(format!("data:{};base64,{}", mime, encoded))
}
