//! Mistral OCR — page-oriented document OCR returning markdown per page.
//!
//! No region prompt and no hybrid stage: the API reads the whole image and
//! the result is flat text. Embedded image references (`![alt](src)`) are
//! stripped from each page and pages are joined with `PAGE_SEPARATOR`.

use super::image_prep::prepare_for_upload;
use super::{http, EngineContext};
use crate::credentials::require_secret;
use crate::engine::{EngineKind, OcrEngine};
use crate::error::OcrError;
use crate::model::OcrResult;
use async_trait::async_trait;
use image::DynamicImage;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Instant;

pub const MISTRAL_BASE_URL: &str = "https://api.mistral.ai";

/// Separator placed between pages in the combined text.
pub const PAGE_SEPARATOR: &str = "\n\n---\n\n";

pub struct MistralOcrEngine {
    ctx: EngineContext,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Vec<OcrPage>,
    usage_info: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct OcrPage {
    #[serde(default)]
    markdown: String,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    pages_processed: Option<u64>,
}

impl MistralOcrEngine {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ctx,
            base_url: MISTRAL_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

pub fn build_request(model: &str, data_url: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "document": {
            "type": "image_url",
            "image_url": data_url
        }
    })
}

fn image_reference() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid image reference regex"))
}

/// Remove markdown image references and the blank lines they leave behind.
pub fn strip_image_references(markdown: &str) -> String {
    let stripped = image_reference().replace_all(markdown, "");
    let mut out = Vec::new();
    let mut previous_blank = false;
    for line in stripped.lines() {
        let line = line.trim_end();
        let blank = line.trim().is_empty();
        if blank && (previous_blank || out.is_empty()) {
            continue;
        }
        out.push(line);
        previous_blank = blank;
    }
    while out.last().is_some_and(|l| l.trim().is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Strip each page and join the non-empty ones.
pub fn combine_pages<'a>(pages: impl IntoIterator<Item = &'a str>) -> String {
    pages
        .into_iter()
        .map(strip_image_references)
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}

#[async_trait]
impl OcrEngine for MistralOcrEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::MistralOcr
    }

    async fn recognize(&self, image: &DynamicImage) -> Result<OcrResult, OcrError> {
        let api_key = require_secret(self.ctx.credentials.as_ref(), EngineKind::MistralOcr)?;
        let settings = self.ctx.settings.snapshot();
        let model = settings.model_for(EngineKind::MistralOcr).unwrap_or_default();

        let start = Instant::now();
        let encoded = prepare_for_upload(image, settings.image_optimization)?;

        log::info!("[LLM] Provider: mistral");
        log::info!("[LLM] Model: {}", model);

        let url = http::endpoint(&self.base_url, "v1/ocr");
        let request = self.ctx.client.post(&url).bearer_auth(&api_key);
        let body = build_request(&model, &encoded.data_url());
        let response = http::post_json(EngineKind::MistralOcr, request, &body).await?;
        let response: OcrResponse = serde_json::from_value(response)?;

        self.ctx.track_usage(
            EngineKind::MistralOcr,
            response.usage_info.and_then(|u| u.pages_processed),
        );

        let text = combine_pages(response.pages.iter().map(|p| p.markdown.as_str()));
        log::info!(
            "[LLM] Mistral OCR: {} page(s), {} chars",
            response.pages.len(),
            text.len()
        );
        if text.trim().is_empty() {
            return Err(OcrError::EmptyResponse(EngineKind::MistralOcr));
        }

        Ok(OcrResult::from_text(
            text,
            start.elapsed(),
            EngineKind::MistralOcr.display_name(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_image_markdown() {
        assert_eq!(strip_image_references("# Title\n![img](x.jpg)"), "# Title");
        assert_eq!(
            strip_image_references("before ![a](img-0.jpeg) after"),
            "before  after"
        );
        assert_eq!(
            strip_image_references("![](a.png)\n\nPara one\n\n![](b.png)\n\nPara two"),
            "Para one\n\nPara two"
        );
    }

    #[test]
    fn keeps_ordinary_links() {
        assert_eq!(
            strip_image_references("see [docs](https://x.y)"),
            "see [docs](https://x.y)"
        );
    }

    #[test]
    fn pages_join_with_separator() {
        let text = combine_pages(["# Title\n![img](x.jpg)", "body"]);
        assert_eq!(text, "# Title\n\n---\n\nbody");
    }

    #[test]
    fn image_only_pages_are_skipped() {
        let text = combine_pages(["![img](x.jpg)", "body"]);
        assert_eq!(text, "body");
    }

    #[test]
    fn request_uses_image_url_document() {
        let body = build_request("mistral-ocr-latest", "data:image/jpeg;base64,QUJD");
        assert_eq!(body["document"]["type"], "image_url");
        assert_eq!(body["document"]["image_url"], "data:image/jpeg;base64,QUJD");
    }
}
