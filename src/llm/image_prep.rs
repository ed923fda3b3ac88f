//! Image preparation for upload — downscale and re-encode as JPEG.

use crate::error::OcrError;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::fmt;

const JPEG_QUALITY: u8 = 85;

/// How aggressively to shrink images before sending them to a cloud engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageOptimization {
    /// Send at source resolution.
    Original,
    /// Longest side capped at 2048px.
    High,
    /// Longest side capped at 1024px.
    #[default]
    Medium,
    /// Longest side capped at 768px.
    Low,
}

impl ImageOptimization {
    pub fn max_dimension(&self) -> Option<u32> {
        match self {
            ImageOptimization::Original => None,
            ImageOptimization::High => Some(2048),
            ImageOptimization::Medium => Some(1024),
            ImageOptimization::Low => Some(768),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "original" => Some(ImageOptimization::Original),
            "high" => Some(ImageOptimization::High),
            "medium" => Some(ImageOptimization::Medium),
            "low" => Some(ImageOptimization::Low),
            _ => None,
        }
    }
}

impl fmt::Display for ImageOptimization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImageOptimization::Original => "original",
            ImageOptimization::High => "high",
            ImageOptimization::Medium => "medium",
            ImageOptimization::Low => "low",
        };
        f.write_str(s)
    }
}

/// An encoded image ready for transport.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// `data:image/jpeg;base64,...`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }
}

/// Target size that fits `max` on the longest side, preserving aspect ratio.
/// Never upscales.
pub fn target_dimensions(width: u32, height: u32, max: Option<u32>) -> (u32, u32) {
    let Some(max) = max else {
        return (width, height);
    };
    let longest = width.max(height);
    if longest <= max {
        return (width, height);
    }
    let scale = max as f64 / longest as f64;
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Resize per `level` and encode as JPEG.
pub fn prepare_for_upload(
    image: &DynamicImage,
    level: ImageOptimization,
) -> Result<EncodedImage, OcrError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(OcrError::InvalidImage("image has zero size".to_string()));
    }

    let (w, h) = target_dimensions(width, height, level.max_dimension());
    let rgb = if (w, h) == (width, height) {
        image.to_rgb8()
    } else {
        image.resize_exact(w, h, FilterType::Lanczos3).to_rgb8()
    };

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| OcrError::InvalidImage(format!("JPEG encode failed: {}", e)))?;

    log::info!(
        "[LLM] Image prepared: {}x{} → {}x{} ({}, {} bytes)",
        width,
        height,
        w,
        h,
        level,
        bytes.len()
    );

    Ok(EncodedImage {
        bytes,
        mime_type: "image/jpeg",
        width: w,
        height: h,
    })
}
