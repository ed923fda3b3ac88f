//! textsnap — screen-region OCR core.
//!
//! On-device text detection supplies the layout; cloud LLM engines can
//! re-read each detected region for better text. No UI lives here, only
//! the domains and the orchestrator callers drive.
//!
//! Domains:
//!   - ocr/        — Local Vision engine (Apple Vision / tesseract)
//!   - llm/        — Gemini, OpenAI, Gemini CLI, Mistral OCR
//!   - manager.rs  — engine registry, selection, hybrid routing
//!   - capture/, cache.rs, history.rs, export.rs, pipeline.rs — caller glue
//!   - settings.rs, credentials.rs, usage.rs — configuration and accounting

pub mod cache;
pub mod capture;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod export;
pub mod history;
pub mod llm;
pub mod manager;
pub mod model;
pub mod ocr;
pub mod pipeline;
pub mod settings;
pub mod usage;

pub use capture::{CapturedImage, SourceKind};
pub use engine::{EngineKind, OcrEngine};
pub use error::OcrError;
pub use manager::OcrManager;
pub use model::{NormalizedRect, OcrResult, TextBlock};
pub use settings::{OcrSettings, SharedSettings};

/// Load `.env.local` → `.env` and start logging.
///
/// Looks in the current directory first, then the crate directory, and
/// stops at the first file found. Safe to call more than once.
pub fn init() {
    let manifest_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    roots.push(manifest_dir.to_path_buf());

    'env_load: for root in &roots {
        for env_file in [".env.local", ".env"] {
            let path = root.join(env_file);
            if path.exists() {
                match dotenvy::from_path(&path) {
                    Ok(_) => eprintln!("[STARTUP] Loaded {}", path.display()),
                    Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
                }
                break 'env_load;
            }
        }
    }

    let _ = env_logger::try_init();
}

/// Warm up the local recognizer to avoid a cold start on the first capture.
pub fn warm_up() {
    let warm_start = std::time::Instant::now();
    #[cfg(target_os = "macos")]
    ocr::apple_vision::warm_up();
    log::info!(
        "[OCR] Warm-up complete in {}ms",
        warm_start.elapsed().as_millis()
    );
}
