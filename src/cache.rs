//! Per-page result cache keyed by image fingerprint.
//!
//! Callers check the cache before running OCR so re-opening the same page
//! does not hit a cloud engine twice. There is no single-flight: two
//! concurrent misses for one fingerprint both run OCR and the last insert
//! wins.

use crate::model::OcrResult;
use image::DynamicImage;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// SHA-256 hex over dimensions, page index and raw RGBA pixels.
pub fn image_fingerprint(image: &DynamicImage, page_index: Option<u32>) -> String {
    let rgba = image.to_rgba8();
    let mut hasher = Sha256::new();
    hasher.update(rgba.width().to_le_bytes());
    hasher.update(rgba.height().to_le_bytes());
    match page_index {
        Some(page) => {
            hasher.update([1u8]);
            hasher.update(page.to_le_bytes());
        }
        None => hasher.update([0u8]),
    }
    hasher.update(rgba.as_raw());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Default)]
pub struct ResultCache {
    entries: Mutex<HashMap<String, OcrResult>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, fingerprint: &str) -> Option<OcrResult> {
        let hit = self.entries.lock().await.get(fingerprint).cloned();
        if hit.is_some() {
            log::debug!("[CACHE] Hit {}", &fingerprint[..fingerprint.len().min(12)]);
        }
        hit
    }

    pub async fn insert(&self, fingerprint: impl Into<String>, result: OcrResult) {
        self.entries.lock().await.insert(fingerprint.into(), result);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drop everything, e.g. after switching engines.
    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        log::info!("[CACHE] Cleared {} entries", entries.len());
        entries.clear();
    }
}
