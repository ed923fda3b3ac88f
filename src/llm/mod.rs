//! Cloud engine domain — LLM and document-OCR backends.
//!
//! Engines:
//!   - Google Gemini (gemini.rs)              — region prompt, inline base64
//!   - OpenAI (openai.rs)                     — region prompt, image data URL
//!   - Gemini CLI (gemini_cli.rs)             — region prompt, subprocess
//!   - Mistral OCR (mistral.rs)               — page markdown, no regions
//!
//! Shared:
//!   - prompts.rs    — base instruction + region list
//!   - image_prep.rs — resize + JPEG encode
//!   - response.rs   — fence stripping, region JSON parsing, line fallback
//!   - http.rs       — JSON POST with backend error mapping

pub mod gemini;
pub mod gemini_cli;
pub(crate) mod http;
pub mod image_prep;
pub mod mistral;
pub mod openai;
pub mod prompts;
pub mod response;

pub use gemini::GeminiEngine;
pub use gemini_cli::GeminiCliEngine;
pub use mistral::MistralOcrEngine;
pub use openai::OpenAiEngine;

use crate::credentials::CredentialStore;
use crate::engine::EngineKind;
use crate::error::OcrError;
use crate::model::{OcrResult, TextBlock};
use crate::settings::SharedSettings;
use crate::usage::UsageLedger;
use response::{non_empty_lines, parse_regions, strip_code_fences, ParseStrategy};
use std::sync::Arc;
use std::time::Instant;

/// Collaborators every cloud engine needs.
#[derive(Clone)]
pub struct EngineContext {
    pub settings: SharedSettings,
    pub credentials: Arc<dyn CredentialStore>,
    pub usage: Arc<dyn UsageLedger>,
    pub client: reqwest::Client,
}

impl EngineContext {
    pub fn new(
        settings: SharedSettings,
        credentials: Arc<dyn CredentialStore>,
        usage: Arc<dyn UsageLedger>,
    ) -> Self {
        Self {
            settings,
            credentials,
            usage,
            client: reqwest::Client::new(),
        }
    }

    /// Record usage if the backend reported any.
    pub(crate) fn track_usage(&self, engine: EngineKind, amount: Option<u64>) {
        match amount {
            Some(n) if n > 0 => self.usage.increment(engine.display_name(), n),
            _ => log::debug!("[USAGE] {} reported no usage", engine),
        }
    }
}

/// Turn a model reply into a result keyed to the prior blocks.
///
/// When no block can be recovered the result carries the reply's
/// non-empty lines as plain text so the user still gets something.
pub(crate) fn region_result(
    engine: EngineKind,
    raw: &str,
    priors: &[TextBlock],
    start: Instant,
) -> Result<OcrResult, OcrError> {
    if raw.trim().is_empty() {
        return Err(OcrError::EmptyResponse(engine));
    }

    let parse = parse_regions(raw, priors);
    log::info!(
        "[LLM] {}: {} block(s) via {:?}",
        engine,
        parse.blocks.len(),
        parse.strategy
    );

    if parse.strategy == ParseStrategy::Empty {
        let degraded = non_empty_lines(&strip_code_fences(raw)).join("\n");
        return Ok(OcrResult::from_text(
            degraded,
            start.elapsed(),
            engine.display_name(),
        ));
    }

    Ok(OcrResult::from_blocks(
        parse.blocks,
        None,
        start.elapsed(),
        engine.display_name(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NormalizedRect;

    #[test]
    fn empty_reply_is_an_error() {
        let err = region_result(EngineKind::Gemini, "  \n", &[], Instant::now()).unwrap_err();
        assert!(matches!(err, OcrError::EmptyResponse(EngineKind::Gemini)));
    }

    #[test]
    fn unmappable_reply_keeps_degraded_text() {
        let result = region_result(EngineKind::OpenAi, "```\nline one\n\nline two\n```", &[], Instant::now())
            .unwrap();
        assert!(result.text_blocks().is_empty());
        assert_eq!(result.text(), "line one\nline two");
        assert_eq!(result.engine(), "OpenAI");
    }

    #[test]
    fn mapped_reply_builds_block_result() {
        let priors = vec![TextBlock::new("x", NormalizedRect::new(0.1, 0.2, 0.3, 0.05), 0.5)];
        let result = region_result(
            EngineKind::Gemini,
            r#"[{"region":1,"text":"Hello"}]"#,
            &priors,
            Instant::now(),
        )
        .unwrap();
        assert_eq!(result.text(), "Hello");
        assert_eq!(result.text_blocks()[0].bounding_box, priors[0].bounding_box);
        assert_eq!(result.confidence(), 1.0);
    }
}
