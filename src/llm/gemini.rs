//! Gemini region OCR — `generateContent` with the image inline as base64.
//!
//! Key differences from the OpenAI engine:
//! - API key in URL query param, not header
//! - `responseMimeType: "application/json"` asks for bare JSON (fences are
//!   still stripped, the model does not always comply)
//! - Text in `candidates[0].content.parts[*].text`
//! - Token usage in `usageMetadata.totalTokenCount`

use super::image_prep::prepare_for_upload;
use super::prompts::{build_region_prompt, MAX_OUTPUT_TOKENS};
use super::{http, region_result, EngineContext};
use crate::credentials::require_secret;
use crate::engine::{unsupported, EngineKind, OcrEngine};
use crate::error::OcrError;
use crate::model::{OcrResult, TextBlock};
use async_trait::async_trait;
use image::DynamicImage;
use std::time::Instant;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiEngine {
    ctx: EngineContext,
    base_url: String,
}

impl GeminiEngine {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ctx,
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Point the engine at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Build the `generateContent` request body.
pub fn build_request(prompt: &str, image_base64: &str, mime_type: &str) -> serde_json::Value {
    serde_json::json!({
        "contents": [
            {
                "role": "user",
                "parts": [
                    { "text": prompt },
                    {
                        "inline_data": {
                            "mime_type": mime_type,
                            "data": image_base64
                        }
                    }
                ]
            }
        ],
        "generationConfig": {
            "maxOutputTokens": MAX_OUTPUT_TOKENS,
            "temperature": 0.1,
            "responseMimeType": "application/json"
        }
    })
}

/// Concatenate the text parts of the first candidate.
pub fn extract_text(body: &serde_json::Value) -> Option<String> {
    let parts = body
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    Some(text)
}

pub fn extract_usage(body: &serde_json::Value) -> Option<u64> {
    body.get("usageMetadata")?.get("totalTokenCount")?.as_u64()
}

#[async_trait]
impl OcrEngine for GeminiEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Gemini
    }

    async fn recognize(&self, _image: &DynamicImage) -> Result<OcrResult, OcrError> {
        Err(unsupported(self.kind(), "recognize without prior regions"))
    }

    async fn recognize_with_priors(
        &self,
        image: &DynamicImage,
        priors: &[TextBlock],
    ) -> Result<OcrResult, OcrError> {
        let api_key = require_secret(self.ctx.credentials.as_ref(), EngineKind::Gemini)?;
        let settings = self.ctx.settings.snapshot();
        let model = settings.model_for(EngineKind::Gemini).unwrap_or_default();

        let start = Instant::now();
        let encoded = prepare_for_upload(image, settings.image_optimization)?;
        let prompt = build_region_prompt(settings.prompt(), priors);

        log::info!("[LLM] Provider: gemini");
        log::info!("[LLM] Model: {}", model);
        log::info!("[LLM] Regions: {}", priors.len());

        let url = http::endpoint(
            &self.base_url,
            &format!("v1beta/models/{}:generateContent", model),
        );
        let body = build_request(&prompt, &encoded.base64(), encoded.mime_type);
        // Header, not query string: reqwest errors echo the URL.
        let request = self.ctx.client.post(&url).header("x-goog-api-key", api_key.as_str());
        let response = http::post_json(EngineKind::Gemini, request, &body).await?;

        self.ctx.track_usage(EngineKind::Gemini, extract_usage(&response));

        let text = extract_text(&response).ok_or(OcrError::EmptyResponse(EngineKind::Gemini))?;
        region_result(EngineKind::Gemini, &text, priors, start)
    }
}
