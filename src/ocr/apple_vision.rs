//! macOS OCR via Apple Vision Framework (swift-bridge FFI).
//!
//! This module is only compiled on macOS. The Swift side
//! (swift-src/vision_bridge.swift) wraps VNRecognizeTextRequest and
//! NLLanguageRecognizer, and hands observations back as JSON so the FFI
//! surface stays a handful of strings.

use super::{DetectionRequest, LanguageIdentifier, Observation, TextRecognizer};
use crate::error::OcrError;
use image::DynamicImage;

#[swift_bridge::bridge]
mod ffi {
    #[swift_bridge(swift_repr = "struct")]
    struct VisionDetection {
        ok: bool,
        error: String,
        observations_json: String,
        latency_ms: f64,
    }

    extern "Swift" {
        fn vision_detect_text(
            data: Vec<u8>,
            level: i32,
            languages: String,
            language_correction: bool,
            max_observations: i32,
        ) -> VisionDetection;
        fn vision_dominant_language(text: String) -> String;
        fn warm_up_vision();
    }
}

/// Apple Vision text detector.
#[derive(Debug, Default, Clone, Copy)]
pub struct VisionRecognizer;

impl TextRecognizer for VisionRecognizer {
    fn detect(
        &self,
        image: &DynamicImage,
        request: &DetectionRequest,
    ) -> Result<Vec<Observation>, OcrError> {
        // Vision decodes the image itself; hand it PNG bytes, no disk I/O.
        let mut png_bytes = Vec::new();
        image
            .write_to(
                &mut std::io::Cursor::new(&mut png_bytes),
                image::ImageFormat::Png,
            )
            .map_err(|e| OcrError::InvalidImage(format!("PNG encode failed: {}", e)))?;

        let max = request
            .max_observations
            .map(|n| i32::try_from(n).unwrap_or(i32::MAX))
            .unwrap_or(0);
        let result = ffi::vision_detect_text(
            png_bytes,
            request.level as i32,
            request.languages.join(","),
            request.language_correction,
            max,
        );

        if !result.ok {
            log::error!("[OCR] Vision request failed: {}", result.error);
            return Err(OcrError::Recognition(result.error));
        }
        log::debug!(
            "[OCR] Vision {:?} pass: {:.1}ms",
            request.level,
            result.latency_ms
        );

        Ok(serde_json::from_str(&result.observations_json)?)
    }
}

/// NLLanguageRecognizer-backed identifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaturalLanguageIdentifier;

impl LanguageIdentifier for NaturalLanguageIdentifier {
    fn dominant_language(&self, text: &str) -> Option<String> {
        let tag = ffi::vision_dominant_language(text.to_string());
        if tag.is_empty() || tag == "und" {
            None
        } else {
            Some(tag)
        }
    }
}

/// Warm up Vision Framework with a throwaway recognition request.
/// Call once at startup to avoid cold-start penalty on the first capture.
pub fn warm_up() {
    ffi::warm_up_vision();
}
