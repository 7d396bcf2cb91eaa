//! Privacy crop for receipt photos
//!
//! Card digits and signature lines cluster at the bottom of a receipt, so
//! only the top 75% of the photo is uploaded. The crop is best-effort: any
//! decode or encode failure falls back to the untouched original bytes.

use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Fraction of the photo height kept, measured from the top.
const KEEP_RATIO: f64 = 0.75;

/// Upload-ready image bytes with their resolved type.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    /// File extension without the dot ("jpg", "png", ...).
    pub extension: String,
    pub content_type: String,
}

/// Crop and re-encode a photo for upload.
///
/// On success the source format is kept; formats the encoder cannot write
/// are converted to JPEG. When the bytes cannot be processed at all the
/// original bytes pass through, typed from `declared_type` or a content
/// sniff.
pub fn prepare(bytes: Vec<u8>, declared_type: Option<&str>) -> PreparedImage {
    match crop_top(&bytes) {
        Ok((cropped, format)) => PreparedImage {
            bytes: cropped,
            extension: format_extension(format),
            content_type: format.to_mime_type().to_string(),
        },
        Err(e) => {
            debug!("privacy crop failed, uploading original bytes: {e}");
            let (extension, content_type) = fallback_type(&bytes, declared_type);
            PreparedImage {
                bytes,
                extension,
                content_type,
            }
        }
    }
}

fn crop_top(bytes: &[u8]) -> Result<(Vec<u8>, ImageFormat), image::ImageError> {
    let format = image::guess_format(bytes)?;
    let img = image::load_from_memory(bytes)?;
    let kept = ((img.height() as f64 * KEEP_RATIO) as u32).max(1);
    let cropped = img.crop_imm(0, 0, img.width(), kept);

    let mut out = Cursor::new(Vec::new());
    match cropped.write_to(&mut out, format) {
        Ok(()) => Ok((out.into_inner(), format)),
        Err(_) => {
            // No encoder for the source format; JPEG always works once
            // any alpha channel is dropped.
            let mut out = Cursor::new(Vec::new());
            DynamicImage::ImageRgb8(cropped.to_rgb8()).write_to(&mut out, ImageFormat::Jpeg)?;
            Ok((out.into_inner(), ImageFormat::Jpeg))
        }
    }
}

fn format_extension(format: ImageFormat) -> String {
    format
        .extensions_str()
        .first()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "jpg".to_string())
}

/// Type the untouched bytes: declared content type first, then a magic
/// byte sniff, then assume JPEG.
fn fallback_type(bytes: &[u8], declared_type: Option<&str>) -> (String, String) {
    if let Some(mime) = declared_type.filter(|t| t.starts_with("image/")) {
        let subtype = mime.split('/').nth(1).unwrap_or("jpeg");
        let extension = if subtype == "jpeg" { "jpg" } else { subtype };
        return (extension.to_string(), mime.to_string());
    }
    if let Some(kind) = infer::get(bytes) {
        return (kind.extension().to_string(), kind.mime_type().to_string());
    }
    ("jpg".to_string(), "image/jpeg".to_string())
}
