//! Result history — where finished OCR results are persisted.
//!
//! The pipeline writes through `ResultSink` and never reads back. The
//! image itself stays out of the record; its fingerprint is kept instead.

use crate::capture::SourceKind;
use crate::error::OcrError;
use crate::model::OcrResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// One persisted OCR run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub result: OcrResult,
    pub source: SourceKind,
    /// Groups the pages of one import.
    pub file_group: Uuid,
    pub page_index: Option<u32>,
    pub original_path: Option<PathBuf>,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

/// Write-only persistence for finished results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn store(&self, record: &HistoryRecord) -> Result<(), OcrError>;
}

/// Default history file location.
pub fn default_history_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("textsnap")
        .join("history.jsonl")
}

/// Append-only JSON-lines history file.
pub struct JsonlHistory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in file order. Unparseable lines are skipped.
    pub async fn read_all(&self) -> Result<Vec<HistoryRecord>, OcrError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (lineno, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!(
                    "[HISTORY] Skipping line {} of {}: {}",
                    lineno + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl ResultSink for JsonlHistory {
    async fn store(&self, record: &HistoryRecord) -> Result<(), OcrError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        // One writer at a time so lines never interleave.
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        log::info!(
            "[HISTORY] Stored {} result ({} chars, group {}, page {:?})",
            record.source,
            record.result.text().chars().count(),
            record.file_group,
            record.page_index
        );
        Ok(())
    }
}

/// In-memory sink.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<HistoryRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<HistoryRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ResultSink for MemoryHistory {
    async fn store(&self, record: &HistoryRecord) -> Result<(), OcrError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}
