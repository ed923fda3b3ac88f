//! OCR error taxonomy.
//!
//! Every engine call returns `Result<_, OcrError>`. The manager forwards
//! these unchanged, so the `Display` text is what the user ends up seeing.

use crate::engine::EngineKind;
use thiserror::Error;

/// Errors surfaced by engines, the manager and the collaborator modules.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("No OCR engine selected — check Settings")]
    NoEngineSelected,

    #[error("OCR engine '{0}' is not available — check Settings")]
    EngineNotRegistered(EngineKind),

    #[error("No API key configured for {0} — check Settings")]
    MissingCredential(EngineKind),

    #[error("Executable not found: {0} — check Settings")]
    MissingExecutable(String),

    // ── Input ────────────────────────────────────────────────────────
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    // ── Backend ──────────────────────────────────────────────────────
    #[error("{engine} failed{}: {body}", status_suffix(.status))]
    Backend {
        engine: EngineKind,
        status: Option<u16>,
        body: String,
    },

    #[error("{0} returned an empty response")]
    EmptyResponse(EngineKind),

    #[error("{engine} timed out after {seconds}s")]
    Timeout { engine: EngineKind, seconds: u64 },

    #[error("Text recognition failed: {0}")]
    Recognition(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    // ── Programming errors ───────────────────────────────────────────
    #[error("{engine} does not support {operation}")]
    Unsupported {
        engine: EngineKind,
        operation: &'static str,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {code}"),
        None => String::new(),
    }
}

impl OcrError {
    /// True for errors the user fixes in Settings rather than by retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            OcrError::NoEngineSelected
                | OcrError::EngineNotRegistered(_)
                | OcrError::MissingCredential(_)
                | OcrError::MissingExecutable(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, OcrError::Timeout { .. })
    }
}

impl From<image::ImageError> for OcrError {
    fn from(e: image::ImageError) -> Self {
        OcrError::InvalidImage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_message_includes_status_and_body() {
        let err = OcrError::Backend {
            engine: EngineKind::Gemini,
            status: Some(429),
            body: "quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "Gemini failed with status 429: quota exceeded");
    }

    #[test]
    fn backend_message_without_status() {
        let err = OcrError::Backend {
            engine: EngineKind::GeminiCli,
            status: None,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Gemini CLI failed: boom");
    }

    #[test]
    fn classification() {
        assert!(OcrError::NoEngineSelected.is_configuration());
        assert!(OcrError::MissingCredential(EngineKind::OpenAi).is_configuration());
        assert!(!OcrError::InvalidImage("x".into()).is_configuration());
        assert!(OcrError::Timeout {
            engine: EngineKind::GeminiCli,
            seconds: 60
        }
        .is_timeout());
    }

    #[test]
    fn keychain_failures_convert() {
        let err: OcrError = keyring::Error::NoEntry.into();
        assert!(matches!(err, OcrError::Keyring(_)));
        assert!(err.to_string().starts_with("Keychain error: "));
    }

    #[test]
    fn configuration_messages_point_at_settings() {
        assert!(OcrError::NoEngineSelected.to_string().contains("check Settings"));
        assert!(OcrError::MissingCredential(EngineKind::MistralOcr)
            .to_string()
            .contains("check Settings"));
    }
}
