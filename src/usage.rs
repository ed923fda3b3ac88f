//! Per-engine usage accounting.
//!
//! Cloud engines report token (or page) counts after each successful call.
//! Increments go through a mutex so concurrent OCR calls cannot lose
//! updates; totals are approximate by nature and nothing else reads them
//! on the OCR path.

use crate::error::OcrError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Write-only usage sink from the engines' point of view.
pub trait UsageLedger: Send + Sync {
    fn increment(&self, engine_name: &str, tokens: u64);
}

/// Ledger that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLedger;

impl UsageLedger for NoopLedger {
    fn increment(&self, _engine_name: &str, _tokens: u64) {}
}

/// In-memory running totals, optionally persisted as JSON.
#[derive(Debug, Default)]
pub struct UsageCounter {
    totals: Mutex<HashMap<String, u64>>,
}

/// Default location of the persisted totals.
pub fn default_usage_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("textsnap")
        .join("usage.json")
}

impl UsageCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self, engine_name: &str) -> u64 {
        self.lock().get(engine_name).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.lock().clone()
    }

    pub fn reset(&self, engine_name: &str) {
        self.lock().remove(engine_name);
    }

    /// Load persisted totals. Missing or invalid files start from zero.
    pub fn load_from(path: &Path) -> Self {
        let totals = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => HashMap::new(),
        };
        Self {
            totals: Mutex::new(totals),
        }
    }

    /// Persist totals, creating the parent directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), OcrError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, u64>> {
        self.totals.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UsageLedger for UsageCounter {
    fn increment(&self, engine_name: &str, tokens: u64) {
        let mut totals = self.lock();
        let total = totals.entry(engine_name.to_string()).or_insert(0);
        *total = total.saturating_add(tokens);
        log::info!("[USAGE] {} +{} (total {})", engine_name, tokens, *total);
    }
}
