//! Capture-to-history pipeline.
//!
//! fingerprint → cache check → OCR → cache insert → persist.
//!
//! The orchestrator itself never de-duplicates; the cache check here is the
//! caller-side guard against re-running OCR for a page already seen. A cache
//! hit returns the stored result without writing a new history record.

use crate::cache::{image_fingerprint, ResultCache};
use crate::capture::CapturedImage;
use crate::error::OcrError;
use crate::history::{HistoryRecord, ResultSink};
use crate::manager::OcrManager;
use crate::model::OcrResult;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use uuid::Uuid;

/// OCR one capture, using the cache when possible.
pub async fn process_capture(
    manager: &OcrManager,
    cache: &ResultCache,
    sink: &dyn ResultSink,
    capture: &CapturedImage,
    file_group: Uuid,
) -> Result<OcrResult, OcrError> {
    let pipeline_start = Instant::now();

    let fingerprint = image_fingerprint(&capture.image, capture.page_index);
    if let Some(cached) = cache.get(&fingerprint).await {
        log::info!(
            "[PIPELINE] Cache hit for {} page {:?}",
            capture.source,
            capture.page_index
        );
        return Ok(cached);
    }

    let ocr_start = Instant::now();
    let result = manager.perform_ocr(&capture.image).await?;
    log::info!(
        "[PIPELINE] OCR via {}: {} chars in {}ms",
        result.engine(),
        result.text().chars().count(),
        ocr_start.elapsed().as_millis()
    );

    cache.insert(fingerprint.clone(), result.clone()).await;

    let record = HistoryRecord {
        result: result.clone(),
        source: capture.source,
        file_group,
        page_index: capture.page_index,
        original_path: capture.original_path.clone(),
        fingerprint,
        created_at: Utc::now(),
    };
    sink.store(&record).await?;

    log::info!(
        "[PIPELINE] Total: {}ms",
        pipeline_start.elapsed().as_millis()
    );
    Ok(result)
}

/// Outcome of a multi-page run.
#[derive(Debug)]
pub struct PageBatch {
    pub file_group: Uuid,
    /// One entry per input page, in input order.
    pub results: Vec<Result<OcrResult, OcrError>>,
}

/// OCR the pages of one import concurrently.
///
/// All pages share a fresh file group. A failing page does not stop the
/// others.
pub async fn process_pages(
    manager: Arc<OcrManager>,
    cache: Arc<ResultCache>,
    sink: Arc<dyn ResultSink>,
    pages: Vec<CapturedImage>,
) -> PageBatch {
    let file_group = Uuid::new_v4();
    let page_count = pages.len();
    log::info!(
        "[PIPELINE] Processing {} page(s), group {}",
        page_count,
        file_group
    );

    let mut tasks = JoinSet::new();
    for (index, page) in pages.into_iter().enumerate() {
        let manager = Arc::clone(&manager);
        let cache = Arc::clone(&cache);
        let sink = Arc::clone(&sink);
        tasks.spawn(async move {
            let result =
                process_capture(&manager, &cache, sink.as_ref(), &page, file_group).await;
            (index, result)
        });
    }

    let mut slots: Vec<Option<Result<OcrResult, OcrError>>> =
        (0..page_count).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => {
                if let Err(e) = &result {
                    log::error!("[PIPELINE] Page {} failed: {}", index, e);
                }
                slots[index] = Some(result);
            }
            Err(e) => log::error!("[PIPELINE] Page task failed: {}", e),
        }
    }

    let results = slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(OcrError::Recognition(
                    "page task ended without a result".to_string(),
                ))
            })
        })
        .collect();

    PageBatch {
        file_group,
        results,
    }
}
