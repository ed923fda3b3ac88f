//! OCR domain — on-device text detection.
//!
//! `LocalVisionEngine` produces the authoritative text boxes: it is the
//! default engine when no API key is set, and the geometry source for the
//! cloud engines. The actual detector sits behind `TextRecognizer`:
//!   - macOS: Apple Vision via swift-bridge (apple_vision.rs)
//!   - elsewhere: the tesseract CLI (tesseract.rs)

#[cfg(target_os = "macos")]
pub mod apple_vision;
pub mod heuristics;
pub mod tesseract;

use crate::engine::{EngineKind, OcrEngine};
use crate::error::OcrError;
use crate::model::{NormalizedRect, OcrResult, TextBlock};
use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

/// Observations kept from the fast sampling pass.
pub const SAMPLE_OBSERVATIONS: usize = 5;

/// Recognition level for the underlying detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecognitionLevel {
    Accurate = 0,
    #[default]
    Fast = 1,
}

/// Parameters for one detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRequest {
    pub level: RecognitionLevel,
    /// BCP-47 recognition hints, most likely first.
    pub languages: Vec<String>,
    pub language_correction: bool,
    /// Stop after this many observations.
    pub max_observations: Option<usize>,
}

/// One detected line, in the detector's bottom-left-origin coordinates.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Observation {
    /// Best candidate string.
    pub text: String,
    pub confidence: f64,
    pub bounding_box: NormalizedRect,
}

/// A text detector.
pub trait TextRecognizer: Send + Sync {
    /// Detect text. Blocking; called off the async executor.
    fn detect(
        &self,
        image: &DynamicImage,
        request: &DetectionRequest,
    ) -> Result<Vec<Observation>, OcrError>;
}

/// Identifies the dominant language of a text sample.
pub trait LanguageIdentifier: Send + Sync {
    /// BCP-47-ish tag such as "ko" or "zh-Hans".
    fn dominant_language(&self, text: &str) -> Option<String>;
}

/// On-device OCR with language-aware hints.
pub struct LocalVisionEngine {
    recognizer: Arc<dyn TextRecognizer>,
    identifier: Arc<dyn LanguageIdentifier>,
}

impl LocalVisionEngine {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, identifier: Arc<dyn LanguageIdentifier>) -> Self {
        Self {
            recognizer,
            identifier,
        }
    }

    /// The platform's native detector and language identifier.
    #[cfg(target_os = "macos")]
    pub fn platform_default() -> Self {
        Self::new(
            Arc::new(apple_vision::VisionRecognizer),
            Arc::new(apple_vision::NaturalLanguageIdentifier),
        )
    }

    /// The platform's native detector and language identifier.
    #[cfg(not(target_os = "macos"))]
    pub fn platform_default() -> Self {
        Self::new(
            Arc::new(tesseract::TesseractRecognizer::new()),
            Arc::new(heuristics::ScriptLanguageIdentifier),
        )
    }

    /// Blocking body of `recognize`.
    fn run(&self, image: &DynamicImage) -> Result<OcrResult, OcrError> {
        let start = Instant::now();

        // Pass 1: quick sample to guess the language.
        let sample = self.recognizer.detect(
            image,
            &DetectionRequest {
                level: RecognitionLevel::Fast,
                languages: vec!["en-US".to_string()],
                language_correction: false,
                max_observations: Some(SAMPLE_OBSERVATIONS),
            },
        )?;
        let sample_text = sample
            .iter()
            .take(SAMPLE_OBSERVATIONS)
            .map(|o| o.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let languages = if sample_text.trim().is_empty() {
            heuristics::FALLBACK_LANGUAGES
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            let guess = self.identifier.dominant_language(&sample_text);
            log::info!("[OCR] Sample language guess: {:?}", guess);
            heuristics::recognition_languages(guess.as_deref())
        };
        log::info!("[OCR] Recognition languages: {:?}", languages);

        // Pass 2: accurate recognition with the derived hints.
        let observations = self.recognizer.detect(
            image,
            &DetectionRequest {
                level: RecognitionLevel::Accurate,
                languages,
                language_correction: true,
                max_observations: None,
            },
        )?;

        let blocks: Vec<TextBlock> = observations
            .into_iter()
            .map(|o| TextBlock::new(o.text, o.bounding_box.flipped_vertically(), o.confidence))
            .collect();

        let joined = blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let language = if joined.trim().is_empty() {
            None
        } else {
            self.identifier.dominant_language(&joined)
        };

        let result = OcrResult::from_blocks(
            blocks,
            language,
            start.elapsed(),
            EngineKind::LocalVision.display_name(),
        );
        log::info!(
            "[OCR] Extracted {} block(s), {} chars in {}ms, confidence={:.2}, language={:?}",
            result.text_blocks().len(),
            result.text().chars().count(),
            result.processing_time().as_millis(),
            result.confidence(),
            result.language()
        );
        Ok(result)
    }
}

#[async_trait]
impl OcrEngine for LocalVisionEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::LocalVision
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<OcrResult, OcrError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidImage("image has zero size".to_string()));
        }

        let engine = LocalVisionEngine {
            recognizer: Arc::clone(&self.recognizer),
            identifier: Arc::clone(&self.identifier),
        };
        let image = image.clone();
        tokio::task::spawn_blocking(move || engine.run(&image))
            .await
            .map_err(|e| OcrError::Recognition(format!("recognizer task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedRecognizer {
        sample: Vec<Observation>,
        accurate: Vec<Observation>,
        requests: Mutex<Vec<DetectionRequest>>,
    }

    impl TextRecognizer for ScriptedRecognizer {
        fn detect(
            &self,
            _image: &DynamicImage,
            request: &DetectionRequest,
        ) -> Result<Vec<Observation>, OcrError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(match request.level {
                RecognitionLevel::Fast => self.sample.clone(),
                RecognitionLevel::Accurate => self.accurate.clone(),
            })
        }
    }

    fn obs(text: &str, y: f64, confidence: f64) -> Observation {
        Observation {
            text: text.to_string(),
            confidence,
            bounding_box: NormalizedRect::new(0.1, y, 0.3, 0.05),
        }
    }

    fn image() -> DynamicImage {
        DynamicImage::new_rgb8(64, 32)
    }

    #[tokio::test]
    async fn korean_sample_drives_korean_hints() {
        let recognizer = Arc::new(ScriptedRecognizer {
            sample: vec![obs("안녕하세요", 0.8, 0.4)],
            accurate: vec![obs("안녕하세요", 0.75, 0.9), obs("세계", 0.5, 0.7)],
            requests: Mutex::new(Vec::new()),
        });
        let engine = LocalVisionEngine::new(
            recognizer.clone(),
            Arc::new(heuristics::ScriptLanguageIdentifier),
        );

        let result = engine.recognize(&image()).await.unwrap();

        let requests = recognizer.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].max_observations, Some(SAMPLE_OBSERVATIONS));
        assert!(!requests[0].language_correction);
        assert_eq!(requests[1].level, RecognitionLevel::Accurate);
        assert_eq!(requests[1].languages, vec!["ko-KR", "en-US"]);
        assert!(requests[1].language_correction);

        assert_eq!(result.text(), "안녕하세요\n세계");
        assert_eq!(result.language(), Some("ko"));
        assert!((result.confidence() - 0.8).abs() < 1e-9);
        assert_eq!(result.engine(), "Local Vision");
    }

    #[tokio::test]
    async fn boxes_are_flipped_to_top_left_origin() {
        let recognizer = Arc::new(ScriptedRecognizer {
            sample: vec![obs("Hello", 0.75, 0.9)],
            accurate: vec![obs("Hello", 0.75, 0.9)],
            requests: Mutex::new(Vec::new()),
        });
        let engine = LocalVisionEngine::new(recognizer, Arc::new(heuristics::ScriptLanguageIdentifier));
        let result = engine.recognize(&image()).await.unwrap();
        let rect = result.text_blocks()[0].bounding_box;
        assert!((rect.y - 0.2).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&rect.y));
    }

    #[tokio::test]
    async fn empty_sample_uses_fallback_language_list() {
        let recognizer = Arc::new(ScriptedRecognizer {
            sample: Vec::new(),
            accurate: Vec::new(),
            requests: Mutex::new(Vec::new()),
        });
        let engine = LocalVisionEngine::new(
            recognizer.clone(),
            Arc::new(heuristics::ScriptLanguageIdentifier),
        );
        let result = engine.recognize(&image()).await.unwrap();

        let requests = recognizer.requests.lock().unwrap();
        assert_eq!(requests[1].languages.len(), heuristics::FALLBACK_LANGUAGES.len());
        assert_eq!(requests[1].languages[0], "ko-KR");
        assert!(result.text_blocks().is_empty());
        assert_eq!(result.language(), None);
    }

    #[tokio::test]
    async fn unidentified_sample_uses_english() {
        let recognizer = Arc::new(ScriptedRecognizer {
            sample: vec![obs("1234", 0.5, 0.9)],
            accurate: vec![obs("1234", 0.5, 0.9)],
            requests: Mutex::new(Vec::new()),
        });
        let engine = LocalVisionEngine::new(
            recognizer.clone(),
            Arc::new(heuristics::ScriptLanguageIdentifier),
        );
        engine.recognize(&image()).await.unwrap();
        assert_eq!(recognizer.requests.lock().unwrap()[1].languages, vec!["en-US"]);
    }

    #[tokio::test]
    async fn detector_errors_propagate() {
        struct Failing;
        impl TextRecognizer for Failing {
            fn detect(&self, _: &DynamicImage, _: &DetectionRequest) -> Result<Vec<Observation>, OcrError> {
                Err(OcrError::Recognition("request failed".to_string()))
            }
        }
        let engine = LocalVisionEngine::new(Arc::new(Failing), Arc::new(heuristics::ScriptLanguageIdentifier));
        let err = engine.recognize(&image()).await.unwrap_err();
        assert!(matches!(err, OcrError::Recognition(_)));
    }

    #[tokio::test]
    async fn zero_sized_image_is_invalid() {
        let recognizer = Arc::new(ScriptedRecognizer {
            sample: Vec::new(),
            accurate: Vec::new(),
            requests: Mutex::new(Vec::new()),
        });
        let engine = LocalVisionEngine::new(recognizer, Arc::new(heuristics::ScriptLanguageIdentifier));
        let err = engine.recognize(&DynamicImage::new_rgb8(0, 0)).await.unwrap_err();
        assert!(matches!(err, OcrError::InvalidImage(_)));
    }
}
