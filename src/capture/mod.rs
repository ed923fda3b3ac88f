//! Capture domain — images handed to OCR.
//!
//! A capture is a raster image plus where it came from. Screen grabs,
//! imported images and document pages all arrive as `CapturedImage`;
//! multi-page imports carry a 0-based page index.

use crate::error::OcrError;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where an image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Capture,
    Pdf,
    Image,
    File,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Capture => "capture",
            SourceKind::Pdf => "pdf",
            SourceKind::Image => "image",
            SourceKind::File => "file",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One image ready for OCR.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub image: DynamicImage,
    pub source: SourceKind,
    /// 0-based page within a multi-page import.
    pub page_index: Option<u32>,
    pub original_path: Option<PathBuf>,
}

impl CapturedImage {
    /// A screen-region grab.
    pub fn from_capture(image: DynamicImage) -> Self {
        Self {
            image,
            source: SourceKind::Capture,
            page_index: None,
            original_path: None,
        }
    }

    /// An image file imported from disk.
    pub fn from_file(path: &Path) -> Result<Self, OcrError> {
        Ok(Self {
            image: load_image(path)?,
            source: SourceKind::Image,
            page_index: None,
            original_path: Some(path.to_path_buf()),
        })
    }

    /// One rendered page of a document.
    pub fn page(image: DynamicImage, page_index: u32, original_path: Option<PathBuf>) -> Self {
        Self {
            image,
            source: SourceKind::Pdf,
            page_index: Some(page_index),
            original_path,
        }
    }
}

/// Decode an in-memory image (PNG, JPEG, ...).
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, OcrError> {
    if bytes.is_empty() {
        return Err(OcrError::InvalidImage("no image data".to_string()));
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Read and decode an image file.
pub fn load_image(path: &Path) -> Result<DynamicImage, OcrError> {
    let bytes = std::fs::read(path)?;
    decode_image(&bytes).map_err(|e| match e {
        OcrError::InvalidImage(msg) => {
            OcrError::InvalidImage(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Crop a pixel rectangle out of `image`.
///
/// Empty rectangles and rectangles reaching past the image are rejected.
pub fn crop_region(
    image: &DynamicImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Result<DynamicImage, OcrError> {
    if width == 0 || height == 0 {
        return Err(OcrError::InvalidImage("selection is empty".to_string()));
    }
    let (img_w, img_h) = image.dimensions();
    let fits_x = x.checked_add(width).is_some_and(|right| right <= img_w);
    let fits_y = y.checked_add(height).is_some_and(|bottom| bottom <= img_h);
    if !fits_x || !fits_y {
        return Err(OcrError::InvalidImage(format!(
            "selection {}x{}+{}+{} outside {}x{} image",
            width, height, x, y, img_w, img_h
        )));
    }

    log::info!(
        "[CAPTURE] Cropping {}x{} at ({}, {}) from {}x{}",
        width,
        height,
        x,
        y,
        img_w,
        img_h
    );
    Ok(image.crop_imm(x, y, width, height))
}
