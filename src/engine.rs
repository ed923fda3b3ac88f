//! OCR engine trait — common interface for every recognition backend.
//!
//! Each backend implements `OcrEngine`. Engines that need the local
//! detector's boxes as positional priors say so through
//! `EngineKind::requires_priors`, and the manager routes them through the
//! two-stage hybrid path.

use crate::error::OcrError;
use crate::model::{OcrResult, TextBlock};
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// All known engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EngineKind {
    /// On-device text detection. Produces the priors for everything else.
    #[serde(rename = "vision")]
    LocalVision,
    /// Google Gemini over HTTP.
    #[serde(rename = "gemini")]
    Gemini,
    /// OpenAI chat completions over HTTP.
    #[serde(rename = "openai")]
    OpenAi,
    /// Gemini driven through its command-line client.
    #[serde(rename = "gemini-cli")]
    GeminiCli,
    /// Mistral's page-oriented OCR endpoint. Text only, no boxes.
    #[serde(rename = "mistral")]
    MistralOcr,
}

impl EngineKind {
    pub const ALL: [EngineKind; 5] = [
        EngineKind::LocalVision,
        EngineKind::Gemini,
        EngineKind::OpenAi,
        EngineKind::GeminiCli,
        EngineKind::MistralOcr,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            EngineKind::LocalVision => "vision",
            EngineKind::Gemini => "gemini",
            EngineKind::OpenAi => "openai",
            EngineKind::GeminiCli => "gemini-cli",
            EngineKind::MistralOcr => "mistral",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            EngineKind::LocalVision => "Local Vision",
            EngineKind::Gemini => "Gemini",
            EngineKind::OpenAi => "OpenAI",
            EngineKind::GeminiCli => "Gemini CLI",
            EngineKind::MistralOcr => "Mistral OCR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "vision" | "local" | "local-vision" => Some(EngineKind::LocalVision),
            "gemini" => Some(EngineKind::Gemini),
            "openai" => Some(EngineKind::OpenAi),
            "gemini-cli" => Some(EngineKind::GeminiCli),
            "mistral" | "mistral-ocr" => Some(EngineKind::MistralOcr),
            _ => None,
        }
    }

    /// Whether the engine needs local-vision blocks before it can run.
    pub fn requires_priors(&self) -> bool {
        matches!(
            self,
            EngineKind::Gemini | EngineKind::OpenAi | EngineKind::GeminiCli
        )
    }

    /// Environment variable holding the engine's API key, if it takes one.
    pub fn env_key(&self) -> Option<&'static str> {
        match self {
            EngineKind::Gemini => Some("GEMINI_API_KEY"),
            EngineKind::OpenAi => Some("OPENAI_API_KEY"),
            EngineKind::MistralOcr => Some("MISTRAL_API_KEY"),
            EngineKind::LocalVision | EngineKind::GeminiCli => None,
        }
    }

    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            EngineKind::LocalVision => None,
            EngineKind::Gemini => Some("gemini-2.0-flash"),
            EngineKind::OpenAi => Some("gpt-4o-mini"),
            EngineKind::GeminiCli => Some("gemini-2.5-flash"),
            EngineKind::MistralOcr => Some("mistral-ocr-latest"),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A pluggable OCR backend.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    fn name(&self) -> &str {
        self.kind().display_name()
    }

    /// Recognize text in an image on its own.
    ///
    /// Prior-dependent engines reject this with `OcrError::Unsupported`.
    async fn recognize(&self, image: &DynamicImage) -> Result<OcrResult, OcrError>;

    /// Recognize text keyed to already-detected regions.
    async fn recognize_with_priors(
        &self,
        _image: &DynamicImage,
        _priors: &[TextBlock],
    ) -> Result<OcrResult, OcrError> {
        Err(unsupported(self.kind(), "recognize_with_priors"))
    }
}

/// Capability misuse: logged loudly, returned as a hard error.
pub(crate) fn unsupported(engine: EngineKind, operation: &'static str) -> OcrError {
    log::error!("[OCR] {} called without required capability: {}", engine, operation);
    OcrError::Unsupported { engine, operation }
}
