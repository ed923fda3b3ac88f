//! Normalized OCR output — the common model every engine produces.
//!
//! Boxes are normalized to the source image (0–1, origin top-left).
//! Values outside [0, 1] from cloud responses are kept as-is.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A rectangle in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    /// Convert between bottom-left and top-left origin: `y' = 1 - y - h`.
    ///
    /// The conversion is its own inverse.
    pub fn flipped_vertically(&self) -> Self {
        Self {
            x: self.x,
            y: 1.0 - self.y - self.height,
            width: self.width,
            height: self.height,
        }
    }
}

/// One recognized text fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    pub text: String,
    pub bounding_box: NormalizedRect,
    /// 0–1. Cloud engines report a fixed 1.0, which is not a probability.
    pub confidence: f64,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, bounding_box: NormalizedRect, confidence: f64) -> Self {
        Self {
            text: text.into(),
            bounding_box,
            confidence,
        }
    }
}

/// One completed recognition pass. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    id: Uuid,
    text_blocks: Vec<TextBlock>,
    text: String,
    confidence: f64,
    language: Option<String>,
    processing_time_ms: u64,
    engine: String,
}

impl OcrResult {
    /// Build a result from positioned blocks. Text is the newline join of
    /// the blocks, confidence their mean (0.0 when there are none).
    pub fn from_blocks(
        text_blocks: Vec<TextBlock>,
        language: Option<String>,
        processing_time: Duration,
        engine: impl Into<String>,
    ) -> Self {
        let text = text_blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let confidence = if text_blocks.is_empty() {
            0.0
        } else {
            text_blocks.iter().map(|b| b.confidence).sum::<f64>() / text_blocks.len() as f64
        };
        Self {
            id: Uuid::new_v4(),
            text_blocks,
            text,
            confidence,
            language,
            processing_time_ms: processing_time.as_millis() as u64,
            engine: engine.into(),
        }
    }

    /// Build a text-only result for engines that never produce blocks.
    pub fn from_text(text: impl Into<String>, processing_time: Duration, engine: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text_blocks: Vec::new(),
            text: text.into(),
            confidence: 1.0,
            language: None,
            processing_time_ms: processing_time.as_millis() as u64,
            engine: engine.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn text_blocks(&self) -> &[TextBlock] {
        &self.text_blocks
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn processing_time(&self) -> Duration {
        Duration::from_millis(self.processing_time_ms)
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
