//! Live cloud API smoke tests.
//!
//! Load keys from .env.local / .env like the library does, and skip when a
//! key is absent. Each test renders a line of text, runs the engine for
//! real and only checks the shape of the result.

use image::{DynamicImage, Rgb, RgbImage};
use std::sync::Arc;
use textsnap_lib::credentials::{CredentialStore, SystemCredentialStore};
use textsnap_lib::llm::{EngineContext, MistralOcrEngine};
use textsnap_lib::usage::UsageCounter;
use textsnap_lib::{EngineKind, OcrEngine, SharedSettings};

fn key_present(kind: EngineKind) -> bool {
    textsnap_lib::init();
    let present = SystemCredentialStore::new().secret(kind).is_some();
    eprintln!("[TEST] {} key present: {}", kind, present);
    present
}

/// Black bars on white; enough for the OCR endpoint to accept the page.
fn bars() -> DynamicImage {
    let mut img = RgbImage::from_pixel(400, 120, Rgb([255, 255, 255]));
    for y in [30u32, 60, 90] {
        for x in 40..360 {
            for dy in 0..8 {
                img.put_pixel(x, y + dy, Rgb([0, 0, 0]));
            }
        }
    }
    DynamicImage::ImageRgb8(img)
}

#[tokio::test]
async fn mistral_live_returns_text_or_empty_response() {
    if !key_present(EngineKind::MistralOcr) {
        eprintln!("SKIP: No MISTRAL_API_KEY");
        return;
    }

    let usage = Arc::new(UsageCounter::new());
    let ctx = EngineContext::new(
        SharedSettings::default(),
        Arc::new(SystemCredentialStore::new()),
        usage.clone(),
    );
    let engine = MistralOcrEngine::new(ctx);

    let start = std::time::Instant::now();
    let outcome = engine.recognize(&bars()).await;
    eprintln!("[TEST] Mistral returned in {}ms", start.elapsed().as_millis());

    match outcome {
        Ok(result) => {
            assert!(result.text_blocks().is_empty());
            assert_eq!(result.engine(), "Mistral OCR");
            assert!(usage.total("Mistral OCR") >= 1);
        }
        Err(textsnap_lib::OcrError::EmptyResponse(_)) => {
            eprintln!("[TEST] No text on the test image");
        }
        Err(e) => panic!("Mistral call failed: {}", e),
    }
}

#[tokio::test]
async fn gemini_live_answers_per_region() {
    if !key_present(EngineKind::Gemini) {
        eprintln!("SKIP: No GEMINI_API_KEY");
        return;
    }

    let ctx = EngineContext::new(
        SharedSettings::default(),
        Arc::new(SystemCredentialStore::new()),
        Arc::new(UsageCounter::new()),
    );
    let engine = textsnap_lib::llm::GeminiEngine::new(ctx);
    let priors = vec![textsnap_lib::TextBlock::new(
        "",
        textsnap_lib::NormalizedRect::new(0.1, 0.2, 0.8, 0.6),
        0.5,
    )];

    match engine.recognize_with_priors(&bars(), &priors).await {
        // Whatever the model reads, it can only land on the one prior box.
        Ok(result) => assert!(result.text_blocks().len() <= 1),
        Err(textsnap_lib::OcrError::EmptyResponse(_)) => {}
        Err(e) => panic!("Gemini call failed: {}", e),
    }
}
