//! Image encoding: `DynamicImage` → PNG bytes, and PNG → base64 `ImageData`.
//!
//! PNG is used everywhere because it is lossless: table renderings and
//! figure crops are stored for humans to inspect, and recognition models
//! read crisp glyph edges far better than JPEG artefacts.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode an image as a base64 PNG attachment for a VLM request.
///
/// `detail` is the provider tiling hint: `"high"` keeps fine print legible,
/// `"low"` sends a single downscaled tile.
pub fn encode_for_vlm(img: &DynamicImage, detail: &str) -> Result<ImageData, image::ImageError> {
    let buf = encode_png(img)?;
    let b64 = STANDARD.encode(&buf);
    debug!("Encoded {}x{} image → {} bytes base64", img.width(), img.height(), b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail(detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn red_square() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn png_has_signature() {
        let bytes = encode_png(&red_square()).expect("encode should succeed");
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn vlm_payload_is_base64_png() {
        let data = encode_for_vlm(&red_square(), "high").expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[..4], b"\x89PNG");
    }
}
