//! OpenAI region OCR — chat completions with the image as a data URL.

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

pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiEngine {
    ctx: EngineContext,
    base_url: String,
}

impl OpenAiEngine {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ctx,
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

pub fn build_request(model: &str, prompt: &str, data_url: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "max_tokens": MAX_OUTPUT_TOKENS,
        "temperature": 0.1,
        "messages": [
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }
        ]
    })
}

pub fn extract_text(body: &serde_json::Value) -> Option<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
}

pub fn extract_usage(body: &serde_json::Value) -> Option<u64> {
    body["usage"]["total_tokens"].as_u64()
}

#[async_trait]
impl OcrEngine for OpenAiEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::OpenAi
    }

    async fn recognize(&self, _image: &DynamicImage) -> Result<OcrResult, OcrError> {
        Err(unsupported(self.kind(), "recognize without prior regions"))
    }

    async fn recognize_with_priors(
        &self,
        image: &DynamicImage,
        priors: &[TextBlock],
    ) -> Result<OcrResult, OcrError> {
        let api_key = require_secret(self.ctx.credentials.as_ref(), EngineKind::OpenAi)?;
        let settings = self.ctx.settings.snapshot();
        let model = settings.model_for(EngineKind::OpenAi).unwrap_or_default();

        let start = Instant::now();
        let encoded = prepare_for_upload(image, settings.image_optimization)?;
        let prompt = build_region_prompt(settings.prompt(), priors);

        log::info!("[LLM] Provider: openai");
        log::info!("[LLM] Model: {}", model);
        log::info!("[LLM] Regions: {}", priors.len());

        let url = http::endpoint(&self.base_url, "v1/chat/completions");
        let request = self.ctx.client.post(&url).bearer_auth(&api_key);
        let body = build_request(&model, &prompt, &encoded.data_url());
        let response = http::post_json(EngineKind::OpenAi, request, &body).await?;

        self.ctx.track_usage(EngineKind::OpenAi, extract_usage(&response));

        let text = extract_text(&response).ok_or(OcrError::EmptyResponse(EngineKind::OpenAi))?;
        region_result(EngineKind::OpenAi, &text, priors, start)
    }
}
