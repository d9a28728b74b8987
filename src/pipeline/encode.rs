//! Image preparation: raw bytes → bounded base64 JPEG wrapped in `ImageData`.
//!
//! ## Why JPEG?
//! The payload is a photograph, not rendered text: lossy compression is
//! invisible to object detection, and a 12-megapixel phone frame re-encoded
//! at quality 85 shrinks from ~6 MB to a few hundred KB of request body.
//!
//! ## Why downscale?
//! Vision APIs tile images down to roughly 1500 px on the long side before
//! the model ever sees them. Uploading more pixels than that buys nothing
//! except latency and upload cost, so the longer dimension is capped and the
//! other scaled proportionally.

use crate::error::AnalysisError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;
use tracing::debug;

/// Decode, downscale, and re-encode image bytes for the vision API.
pub fn prepare_image(
    bytes: &[u8],
    max_pixels: u32,
    jpeg_quality: u8,
) -> Result<ImageData, AnalysisError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| AnalysisError::ImageDecode(e.to_string()))?;
    let img = cap_dimensions(img, max_pixels);

    // JPEG has no alpha channel; flatten unconditionally.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), jpeg_quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| AnalysisError::ImageEncode(e.to_string()))?;

    let b64 = STANDARD.encode(&buf);
    debug!("Prepared image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/jpeg").with_detail("high"))
}

/// Wrap an already-encoded base64 payload without re-encoding.
///
/// This is the path behind the public `analyze` operation: the caller (a
/// browser front-end, typically) already produced a bounded JPEG, so the
/// bytes are only sniffed for a MIME type, not decoded.
pub fn image_data_from_base64(image_base64: &str) -> Result<ImageData, AnalysisError> {
    let bytes = STANDARD
        .decode(image_base64.trim())
        .map_err(|e| AnalysisError::InvalidBase64(e.to_string()))?;

    let mime = match image::guess_format(&bytes) {
        Ok(image::ImageFormat::Png) => "image/png",
        // The contract says JPEG; tolerate anything else the decoder knows.
        _ => "image/jpeg",
    };

    Ok(ImageData::new(image_base64.trim().to_string(), mime).with_detail("high"))
}

/// Cap the longer dimension at `max_pixels`, preserving aspect ratio.
fn cap_dimensions(img: DynamicImage, max_pixels: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w.max(h) <= max_pixels {
        return img;
    }
    debug!("Downscaling {}×{} to fit {} px", w, h, max_pixels);
    img.resize(max_pixels, max_pixels, image::imageops::FilterType::Triangle)
}
