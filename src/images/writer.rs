//! Resampling, encoding and output of decoded images.

use super::ImageFormat;
use crate::error::{Error, Result};
use crate::model::Rect;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::imageops::FilterType;
use image::DynamicImage;
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Largest output edge in pixels.
const MAX_EDGE: u32 = 10_000;

/// Pixel size for an image displayed in `bbox` (points) at `dpi`.
pub fn target_size(bbox: &Rect, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / 72.0;
    let px = |points: f32| ((points.abs() * scale).round() as u32).clamp(1, MAX_EDGE);
    (px(bbox.width()), px(bbox.height()))
}

/// Resample to the displayed size at `dpi`.
pub fn resample(image: DynamicImage, bbox: &Rect, dpi: u32) -> DynamicImage {
    let (width, height) = target_size(bbox, dpi);
    if (width, height) == (image.width(), image.height()) {
        return image;
    }
    let filter = if width < image.width() {
        FilterType::Triangle
    } else {
        FilterType::Lanczos3
    };
    image.resize_exact(width, height, filter)
}

/// Encode to the requested format.
pub fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, format.codec())
        .map_err(|e| Error::Decode(format!("{} encoding: {}", format.extension(), e)))?;
    Ok(buffer.into_inner())
}

/// Write encoded bytes, creating the directory if needed.
pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> Result<String> {
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    fs::write(&path, bytes)?;
    Ok(path.to_string_lossy().replace('\\', "/"))
}

/// `data:` URI with base64 payload.
pub fn data_uri(bytes: &[u8], format: ImageFormat) -> String {
    format!("data:{};base64,{}", format.mime(), STANDARD.encode(bytes))
}
