//! OCR benchmark CLI for textsnap.
//!
//! Runs the OCR orchestrator over image files with any registered engine.
//! Cloud engines read their keys from the environment / keychain, exactly
//! like the library does.
//!
//! Usage:
//!   ocr-bench <image.png>                          Active engine from settings
//!   ocr-bench <image.png> --engine gemini          Pick an engine by id
//!   ocr-bench <image.png> --export markdown        Print the export instead of JSON
//!   ocr-bench --batch <directory> [--engine id]    All images in directory → CSV
//!   ocr-bench ... --warm                           Warm up the local recognizer first

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use textsnap_lib::capture::{load_image, SourceKind};
use textsnap_lib::credentials::SystemCredentialStore;
use textsnap_lib::export::{export, ExportFormat, ExportMetadata};
use textsnap_lib::usage::{default_usage_path, UsageCounter};
use textsnap_lib::{EngineKind, OcrManager, OcrResult, OcrSettings, SharedSettings};

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  ocr-bench <image.png> [--engine <id>] [--export text|markdown|json] [--warm]");
    eprintln!("  ocr-bench --batch <directory> [--engine <id>] [--warm]");
    eprintln!();
    let ids: Vec<&str> = EngineKind::ALL.iter().map(|k| k.id()).collect();
    eprintln!("Engines: {}", ids.join(", "));
    std::process::exit(1);
}

/// Value following `flag`, if present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[tokio::main]
async fn main() {
    textsnap_lib::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage();
    }

    if args.contains(&"--warm".to_string()) {
        textsnap_lib::warm_up();
    }

    let settings = SharedSettings::new(OcrSettings::load());
    let usage_path = default_usage_path();
    let counter = Arc::new(UsageCounter::load_from(&usage_path));
    let manager = OcrManager::from_settings(
        settings,
        Arc::new(SystemCredentialStore::new()),
        counter.clone(),
    );

    if let Some(id) = flag_value(&args, "--engine") {
        let Some(kind) = EngineKind::parse(id) else {
            eprintln!("Unknown engine: {}", id);
            usage();
        };
        if let Err(e) = manager.set_active_engine(kind) {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }

    let format = match flag_value(&args, "--export") {
        Some(name) => match ExportFormat::parse(name) {
            Some(format) => Some(format),
            None => {
                eprintln!("Unknown export format: {}", name);
                usage();
            }
        },
        None => None,
    };

    let ok = if args[1] == "--batch" {
        match args.get(2) {
            Some(dir) => run_batch(&manager, Path::new(dir)).await,
            None => usage(),
        }
    } else {
        run_single(&manager, Path::new(&args[1]), format).await
    };

    if let Err(e) = counter.save_to(&usage_path) {
        log::warn!("[USAGE] Could not save usage totals: {}", e);
    }
    if !ok {
        std::process::exit(1);
    }
}

async fn run_single(manager: &OcrManager, path: &Path, format: Option<ExportFormat>) -> bool {
    let image = match load_image(path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("{}", e);
            return false;
        }
    };

    let start = Instant::now();
    let result = match manager.perform_ocr(&image).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("OCR failed: {}", e);
            return false;
        }
    };
    let wall_ms = start.elapsed().as_micros() as f64 / 1000.0;

    if let Some(format) = format {
        let metadata = ExportMetadata::from_result(&result, SourceKind::Image, 1);
        match export(result.text(), Some(result.text_blocks()), &metadata, format) {
            Ok(rendered) => println!("{}", rendered),
            Err(e) => {
                eprintln!("Export failed: {}", e);
                return false;
            }
        }
        return true;
    }

    let summary = result_summary(&result, wall_ms);
    match serde_json::to_string_pretty(&summary) {
        Ok(rendered) => println!("{}", rendered),
        Err(e) => {
            eprintln!("Failed to render result: {}", e);
            return false;
        }
    }
    true
}

/// JSON summary of one run, with the text cut to a 200-char preview.
fn result_summary(result: &OcrResult, wall_ms: f64) -> serde_json::Value {
    let preview: String = result.text().chars().take(200).collect();
    let preview = if preview.len() < result.text().len() {
        format!("{}...", preview)
    } else {
        preview
    };
    serde_json::json!({
        "engine": result.engine(),
        "engineLatencyMs": result.processing_time().as_millis() as u64,
        "wallTimeMs": (wall_ms * 100.0).round() / 100.0,
        "confidence": result.confidence(),
        "language": result.language().unwrap_or(""),
        "blocks": result.text_blocks().len(),
        "charCount": result.text().chars().count(),
        "textPreview": preview,
    })
}

async fn run_batch(manager: &OcrManager, dir: &Path) -> bool {
    if !dir.is_dir() {
        eprintln!("Not a directory: {}", dir.display());
        return false;
    }

    let mut entries: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(read) => read
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| matches!(ext.to_lowercase().as_str(), "png" | "jpg" | "jpeg"))
                    .unwrap_or(false)
            })
            .collect(),
        Err(e) => {
            eprintln!("Failed to read {}: {}", dir.display(), e);
            return false;
        }
    };
    entries.sort();

    if entries.is_empty() {
        eprintln!("No image files found in {}", dir.display());
        return false;
    }

    println!("filename,engine,char_count,blocks,engine_ms,wall_ms,confidence,language,error");

    let mut latencies: Vec<f64> = Vec::new();
    let mut failures = 0usize;

    for image_path in &entries {
        let filename = image_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let start = Instant::now();
        let outcome = match load_image(image_path) {
            Ok(image) => manager.perform_ocr(&image).await,
            Err(e) => Err(e),
        };
        let wall_ms = start.elapsed().as_micros() as f64 / 1000.0;

        match outcome {
            Ok(result) => {
                println!(
                    "{},{},{},{},{},{:.2},{:.3},{},",
                    filename,
                    result.engine(),
                    result.text().chars().count(),
                    result.text_blocks().len(),
                    result.processing_time().as_millis(),
                    wall_ms,
                    result.confidence(),
                    result.language().unwrap_or("")
                );
                latencies.push(wall_ms);
            }
            Err(e) => {
                failures += 1;
                let message = e.to_string().replace([',', '\n'], " ");
                println!("{},,,,,{:.2},,,{}", filename, wall_ms, message);
            }
        }

        std::io::stdout().flush().ok();
    }

    // Print summary
    eprintln!("\n--- Benchmark Summary ---");
    eprintln!("  Images processed: {}", entries.len());
    eprintln!("  Failures: {}", failures);
    if !latencies.is_empty() {
        print_latency_summary(&mut latencies);
    }
    failures == 0
}

fn print_latency_summary(latencies: &mut [f64]) {
    latencies.sort_by(|a, b| a.total_cmp(b));
    let median = latencies[latencies.len() / 2];
    let p99_idx = ((latencies.len() as f64 * 0.99).ceil() as usize).min(latencies.len() - 1);
    let p99 = latencies[p99_idx];
    let avg: f64 = latencies.iter().sum::<f64>() / latencies.len() as f64;

    eprintln!("  Median: {:.1}ms", median);
    eprintln!("  Average: {:.1}ms", avg);
    eprintln!("  P99: {:.1}ms", p99);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn summary_survives_control_characters() {
        let text = "col1\tcol2\r\nline \"two\" \\ end\u{7}";
        let result = OcrResult::from_text(text, Duration::from_millis(12), "Mistral OCR");

        let rendered = serde_json::to_string_pretty(&result_summary(&result, 15.456)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(parsed["textPreview"], text);
        assert_eq!(parsed["engine"], "Mistral OCR");
        assert_eq!(parsed["engineLatencyMs"], 12);
        assert_eq!(parsed["wallTimeMs"], 15.46);
        assert_eq!(parsed["charCount"], text.chars().count());
    }

    #[test]
    fn long_text_is_previewed() {
        let text = "a".repeat(250);
        let result = OcrResult::from_text(&text, Duration::ZERO, "Gemini");
        let summary = result_summary(&result, 1.0);
        let preview = summary["textPreview"].as_str().unwrap();
        assert_eq!(preview.len(), 203);
        assert!(preview.ends_with("..."));
    }
}
