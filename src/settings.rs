//! User settings — selected engine, models, prompt, image optimization.
//!
//! Stored as JSON in `~/.config/textsnap/settings.json`. Environment
//! variables override the file so a `.env.local` can pin an engine
//! during development:
//!   - `OCR_ENGINE`              — engine id ("vision", "gemini", ...)
//!   - `OCR_IMAGE_OPTIMIZATION`  — original | high | medium | low
//!   - `GEMINI_CLI_PATH`         — path to the gemini executable

use crate::engine::EngineKind;
use crate::error::OcrError;
use crate::llm::image_prep::ImageOptimization;
use crate::llm::prompts::DEFAULT_OCR_PROMPT;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

pub const DEFAULT_CLI_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OcrSettings {
    pub selected_engine: Option<EngineKind>,
    pub image_optimization: ImageOptimization,
    pub ocr_prompt: String,
    /// Per-engine model overrides. Engines fall back to their default model.
    pub models: HashMap<EngineKind, String>,
    pub gemini_cli_path: Option<PathBuf>,
    pub cli_timeout_secs: u64,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            selected_engine: Some(EngineKind::LocalVision),
            image_optimization: ImageOptimization::default(),
            ocr_prompt: DEFAULT_OCR_PROMPT.to_string(),
            models: HashMap::new(),
            gemini_cli_path: None,
            cli_timeout_secs: DEFAULT_CLI_TIMEOUT_SECS,
        }
    }
}

/// Directory where settings are stored.
fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("textsnap")
}

pub fn default_settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

impl OcrSettings {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Self {
        let mut settings = Self::load_from(&default_settings_path());
        settings.apply_env_overrides();
        settings
    }

    /// Load from a file. Returns defaults if missing or invalid.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("[SETTINGS] Ignoring invalid {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), OcrError> {
        self.save_to(&default_settings_path())
    }

    /// Persist settings, creating the directory if it doesn't exist.
    pub fn save_to(&self, path: &Path) -> Result<(), OcrError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("[SETTINGS] Saved settings to {}", path.display());
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(value) = var("OCR_ENGINE") {
            match EngineKind::parse(&value) {
                Some(kind) => {
                    log::info!("[SETTINGS] Engine override: {}", kind.id());
                    self.selected_engine = Some(kind);
                }
                None => log::warn!("[SETTINGS] Unknown OCR_ENGINE '{}' ignored", value),
            }
        }
        if let Some(value) = var("OCR_IMAGE_OPTIMIZATION") {
            match ImageOptimization::parse(&value) {
                Some(level) => self.image_optimization = level,
                None => log::warn!("[SETTINGS] Unknown OCR_IMAGE_OPTIMIZATION '{}' ignored", value),
            }
        }
        if let Some(value) = var("GEMINI_CLI_PATH").filter(|v| !v.trim().is_empty()) {
            self.gemini_cli_path = Some(PathBuf::from(value));
        }
    }

    /// Model for an engine: user override, else the engine default.
    pub fn model_for(&self, engine: EngineKind) -> Option<String> {
        self.models
            .get(&engine)
            .filter(|m| !m.trim().is_empty())
            .cloned()
            .or_else(|| engine.default_model().map(str::to_string))
    }

    /// Base prompt, falling back to the default if the user cleared it.
    pub fn prompt(&self) -> &str {
        if self.ocr_prompt.trim().is_empty() {
            DEFAULT_OCR_PROMPT
        } else {
            &self.ocr_prompt
        }
    }

    pub fn cli_timeout(&self) -> Duration {
        Duration::from_secs(self.cli_timeout_secs.max(1))
    }
}

/// Settings shared between the engines and whoever edits them.
///
/// Engines take a snapshot per call, so edits apply to the next OCR run.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings(Arc<RwLock<OcrSettings>>);

impl SharedSettings {
    pub fn new(settings: OcrSettings) -> Self {
        Self(Arc::new(RwLock::new(settings)))
    }

    pub fn snapshot(&self) -> OcrSettings {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut OcrSettings)) {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}
