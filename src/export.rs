//! Export of OCR results as plain text, Markdown or JSON.

use crate::capture::SourceKind;
use crate::error::OcrError;
use crate::model::{OcrResult, TextBlock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Text,
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" | "txt" | "plain" => Some(Self::Text),
            "markdown" | "md" => Some(Self::Markdown),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

/// Describes where exported text came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub engine: String,
    pub confidence: f64,
    pub language: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub source: SourceKind,
    pub page_count: u32,
}

impl ExportMetadata {
    pub fn from_result(result: &OcrResult, source: SourceKind, page_count: u32) -> Self {
        Self {
            engine: result.engine().to_string(),
            confidence: result.confidence(),
            language: result.language().map(str::to_string),
            timestamp: Utc::now(),
            source,
            page_count,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocks: Option<&'a [TextBlock]>,
    confidence: f64,
    metadata: &'a ExportMetadata,
}

/// Render `text` (and, for JSON, per-block geometry) in `format`.
pub fn export(
    text: &str,
    blocks: Option<&[TextBlock]>,
    metadata: &ExportMetadata,
    format: ExportFormat,
) -> Result<String, OcrError> {
    match format {
        ExportFormat::Text => Ok(text.to_string()),
        ExportFormat::Markdown => Ok(markdown(text, metadata)),
        ExportFormat::Json => {
            let doc = JsonExport {
                text,
                blocks: blocks.filter(|b| !b.is_empty()),
                confidence: metadata.confidence,
                metadata,
            };
            Ok(serde_json::to_string_pretty(&doc)?)
        }
    }
}

fn markdown(text: &str, metadata: &ExportMetadata) -> String {
    let mut out = String::from("# OCR Result\n\n");
    out.push_str(&format!("- **Engine:** {}\n", metadata.engine));
    out.push_str(&format!(
        "- **Confidence:** {:.0}%\n",
        metadata.confidence * 100.0
    ));
    if let Some(language) = &metadata.language {
        out.push_str(&format!("- **Language:** {}\n", language));
    }
    out.push_str(&format!(
        "- **Date:** {}\n",
        metadata.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("- **Source:** {}\n", metadata.source));
    if metadata.page_count > 1 {
        out.push_str(&format!("- **Pages:** {}\n", metadata.page_count));
    }
    out.push_str("\n---\n\n");
    out.push_str(text.trim_end());
    out.push('\n');
    out
}

/// Render and write to `path`, creating parent directories.
pub fn write_export(
    path: &Path,
    text: &str,
    blocks: Option<&[TextBlock]>,
    metadata: &ExportMetadata,
    format: ExportFormat,
) -> Result<(), OcrError> {
    let rendered = export(text, blocks, metadata, format)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, rendered)?;
    log::info!("[EXPORT] Wrote {:?} export to {}", format, path.display());
    Ok(())
}
