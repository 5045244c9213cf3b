//! Image ingestion gate
//!
//! Every uploaded payload passes through here before it can reach the
//! object store or the image pool. Accepted images are re-encoded to a
//! canonical 3-channel JPEG, which both closes format-confusion attack
//! surface and gives the content hasher a stable byte stream.

use crate::error::{MosaicError, MosaicResult};
use image::{codecs::jpeg::JpegEncoder, ImageFormat};
use sha2::{Digest, Sha256};

/// Container formats accepted at the gate
const ALLOWED_FORMATS: &[ImageFormat] = &[ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

/// Validate an uploaded payload and normalize it to JPEG
///
/// Fails with `InvalidImage` when the sniffed container format is not
/// allowed, the payload exceeds `max_bytes`, or the payload does not decode
/// as a structurally valid image.
pub fn validate_and_normalize(raw: &[u8], max_bytes: usize, quality: u8) -> MosaicResult<Vec<u8>> {
    let format = image::guess_format(raw)
        .map_err(|_| MosaicError::InvalidImage("Unrecognized image format".to_string()))?;

    if !ALLOWED_FORMATS.contains(&format) {
        return Err(MosaicError::InvalidImage(format!(
            "Unsupported image format: {:?}",
            format
        )));
    }

    if raw.len() > max_bytes {
        return Err(MosaicError::InvalidImage(format!(
            "Image exceeds the maximum size of {} bytes",
            max_bytes
        )));
    }

    // Full decode doubles as structural verification
    let decoded = image::load_from_memory_with_format(raw, format)
        .map_err(|e| MosaicError::InvalidImage(format!("Corrupt or truncated image: {}", e)))?;

    // Re-encode as 3-channel JPEG, discarding the original encoding
    let rgb = decoded.to_rgb8();
    let mut normalized = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut normalized, quality);
    encoder
        .encode_image(&rgb)
        .map_err(|e| MosaicError::Internal(format!("JPEG encoding failed: {}", e)))?;

    Ok(normalized)
}

/// SHA-256 hex digest of a byte stream
pub fn content_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Content-addressed storage key, namespaced by owner
pub fn content_key(owner_id: &str, digest: &str) -> String {
    format!("users/{}/{}.jpg", owner_id, digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    const MAX_BYTES: usize = 5 * 1024 * 1024;

    fn png_bytes(width: u32, height: u32, fill: u8) -> Vec<u8> {
        let mut img = RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            pixel.0 = [fill, fill / 2, fill / 3];
        }
        let mut buf = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buf);
        img.write_to(&mut cursor, ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn test_accepts_png_and_outputs_jpeg() {
        let normalized = validate_and_normalize(&png_bytes(16, 16, 200), MAX_BYTES, 75).unwrap();
        assert_eq!(image::guess_format(&normalized).unwrap(), ImageFormat::Jpeg);

        // Output must itself decode
        let decoded = image::load_from_memory(&normalized).unwrap();
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 16);
    }

    #[test]
    fn test_rejects_non_image_payload() {
        let err = validate_and_normalize(b"definitely not an image", MAX_BYTES, 75).unwrap_err();
        assert!(matches!(err, MosaicError::InvalidImage(_)));
    }

    #[test]
    fn test_rejects_disallowed_format() {
        // Valid GIF header; GIF is sniffed but not in the allowed set
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;".to_vec();
        let err = validate_and_normalize(&gif, MAX_BYTES, 75).unwrap_err();
        assert!(matches!(err, MosaicError::InvalidImage(_)));
        assert!(err.to_string().contains("Unsupported"));
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let data = png_bytes(64, 64, 10);
        let err = validate_and_normalize(&data, data.len() - 1, 75).unwrap_err();
        assert!(matches!(err, MosaicError::InvalidImage(_)));
        assert!(err.to_string().contains("maximum size"));
    }

    #[test]
    fn test_rejects_truncated_image() {
        let mut data = png_bytes(64, 64, 10);
        data.truncate(data.len() / 2);
        let err = validate_and_normalize(&data, MAX_BYTES, 75).unwrap_err();
        assert!(matches!(err, MosaicError::InvalidImage(_)));
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let raw = png_bytes(32, 32, 99);
        let a = validate_and_normalize(&raw, MAX_BYTES, 75).unwrap();
        let b = validate_and_normalize(&raw, MAX_BYTES, 75).unwrap();
        assert_eq!(a, b);
        assert_eq!(content_digest(&a), content_digest(&b));
    }

    #[test]
    fn test_rgba_input_converts_to_rgb() {
        let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([10, 20, 30, 128]));
        let mut buf = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buf);
        img.write_to(&mut cursor, ImageFormat::Png).unwrap();

        let normalized = validate_and_normalize(&buf, MAX_BYTES, 75).unwrap();
        let decoded = image::load_from_memory(&normalized).unwrap();
        assert_eq!(decoded.color().channel_count(), 3);
    }

    #[test]
    fn test_content_digest_is_deterministic() {
        assert_eq!(content_digest(b"hello"), content_digest(b"hello"));
        assert_ne!(content_digest(b"hello"), content_digest(b"world"));
        assert_eq!(content_digest(b"hello").len(), 64);
    }

    #[test]
    fn test_content_key_is_namespaced_by_owner() {
        let digest = content_digest(b"same bytes");
        let a = content_key("owner-a", &digest);
        let b = content_key("owner-b", &digest);
        assert_ne!(a, b);
        assert!(a.starts_with("users/owner-a/"));
        assert!(a.ends_with(".jpg"));
    }
}
