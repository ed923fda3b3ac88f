//! OCR orchestrator — single entry point for every caller.
//!
//! Holds the engine registry and the active selection. Engines that need
//! prior regions get the hybrid path: Local Vision runs first for geometry,
//! then the selected engine fills in the text. Everything else is a single
//! call. No retries; engine errors pass through untouched.

use crate::credentials::CredentialStore;
use crate::engine::{EngineKind, OcrEngine};
use crate::error::OcrError;
use crate::llm::{EngineContext, GeminiCliEngine, GeminiEngine, MistralOcrEngine, OpenAiEngine};
use crate::model::OcrResult;
use crate::ocr::LocalVisionEngine;
use crate::settings::SharedSettings;
use crate::usage::UsageLedger;
use image::DynamicImage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct OcrManager {
    engines: HashMap<EngineKind, Arc<dyn OcrEngine>>,
    selected: Mutex<Option<EngineKind>>,
}

impl OcrManager {
    /// Empty registry, nothing selected.
    pub fn new() -> Self {
        Self {
            engines: HashMap::new(),
            selected: Mutex::new(None),
        }
    }

    /// Registry with every built-in engine, selection taken from settings.
    pub fn from_settings(
        settings: SharedSettings,
        credentials: Arc<dyn CredentialStore>,
        usage: Arc<dyn UsageLedger>,
    ) -> Self {
        let selected = settings.snapshot().selected_engine;
        let ctx = EngineContext::new(settings, credentials, usage);

        let mut manager = Self::new();
        manager.register(Arc::new(LocalVisionEngine::platform_default()));
        manager.register(Arc::new(GeminiEngine::new(ctx.clone())));
        manager.register(Arc::new(OpenAiEngine::new(ctx.clone())));
        manager.register(Arc::new(GeminiCliEngine::new(ctx.clone())));
        manager.register(Arc::new(MistralOcrEngine::new(ctx)));

        *manager.lock_selected() = selected;
        log::info!(
            "[MANAGER] {} engine(s) registered, active: {:?}",
            manager.engines.len(),
            selected.map(|k| k.id())
        );
        manager
    }

    /// Add or replace the engine for its kind.
    pub fn register(&mut self, engine: Arc<dyn OcrEngine>) {
        let kind = engine.kind();
        if self.engines.insert(kind, engine).is_some() {
            log::debug!("[MANAGER] Replaced engine: {}", kind);
        }
    }

    /// Registered engines in display order.
    pub fn available_engines(&self) -> Vec<EngineKind> {
        EngineKind::ALL
            .iter()
            .copied()
            .filter(|k| self.engines.contains_key(k))
            .collect()
    }

    pub fn active_engine(&self) -> Option<EngineKind> {
        *self.lock_selected()
    }

    /// Switch the engine used by subsequent `perform_ocr` calls.
    pub fn set_active_engine(&self, kind: EngineKind) -> Result<(), OcrError> {
        if !self.engines.contains_key(&kind) {
            return Err(OcrError::EngineNotRegistered(kind));
        }
        let previous = self.lock_selected().replace(kind);
        log::info!(
            "[MANAGER] Active engine: {:?} -> {}",
            previous.map(|k| k.id()),
            kind.id()
        );
        Ok(())
    }

    fn lock_selected(&self) -> std::sync::MutexGuard<'_, Option<EngineKind>> {
        self.selected.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn engine(&self, kind: EngineKind) -> Result<&Arc<dyn OcrEngine>, OcrError> {
        self.engines
            .get(&kind)
            .ok_or(OcrError::EngineNotRegistered(kind))
    }

    /// Run OCR with the active engine.
    pub async fn perform_ocr(&self, image: &DynamicImage) -> Result<OcrResult, OcrError> {
        let kind = self.active_engine().ok_or(OcrError::NoEngineSelected)?;
        let engine = self.engine(kind)?;

        if !kind.requires_priors() {
            log::info!("[MANAGER] Running {}", kind);
            return engine.recognize(image).await;
        }

        // Geometry first; the cloud call must not start before it completes.
        let local = self.engine(EngineKind::LocalVision)?;
        log::info!("[MANAGER] Hybrid: {} for regions, then {}", local.name(), kind);
        let priors = local.recognize(image).await?;
        log::info!(
            "[MANAGER] {} prior region(s) from {}",
            priors.text_blocks().len(),
            priors.engine()
        );

        engine
            .recognize_with_priors(image, priors.text_blocks())
            .await
    }
}

impl Default for OcrManager {
    fn default() -> Self {
        Self::new()
    }
}
