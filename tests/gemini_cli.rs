//! Gemini CLI engine against stand-in shell scripts.

#![cfg(unix)]

mod support;

use image::{DynamicImage, Rgb, RgbImage};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use support::{sample_image, EnglishIdentifier, FixedRecognizer};
use textsnap_lib::credentials::StaticCredentials;
use textsnap_lib::llm::gemini_cli::{run_with_timeout, GeminiCliEngine};
use textsnap_lib::llm::image_prep::prepare_for_upload;
use textsnap_lib::llm::EngineContext;
use textsnap_lib::ocr::LocalVisionEngine;
use textsnap_lib::usage::NoopLedger;
use textsnap_lib::{EngineKind, OcrError, OcrManager, OcrSettings, SharedSettings};

/// Shell snippet setting `$img` to the file named by the prompt's `@` line.
const IMAGE_FROM_PROMPT: &str = r#"for arg in "$@"; do last="$arg"; done
img=$(printf '%s\n' "$last" | tail -n 1 | sed 's/^@//')"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn manager(script: PathBuf, work_dir: &Path, timeout_secs: u64) -> OcrManager {
    let settings = SharedSettings::new(OcrSettings {
        gemini_cli_path: Some(script),
        cli_timeout_secs: timeout_secs,
        ..OcrSettings::default()
    });
    let ctx = EngineContext::new(
        settings,
        Arc::new(StaticCredentials::new()),
        Arc::new(NoopLedger),
    );
    let mut manager = OcrManager::new();
    manager.register(Arc::new(LocalVisionEngine::new(
        FixedRecognizer::two_regions(),
        Arc::new(EnglishIdentifier),
    )));
    manager.register(Arc::new(GeminiCliEngine::new(ctx).with_work_dir(work_dir)));
    manager.set_active_engine(EngineKind::GeminiCli).unwrap();
    manager
}

#[tokio::test]
async fn cli_output_maps_onto_local_regions() {
    let bin = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let script = write_script(
        bin.path(),
        "gemini",
        &format!(
            r#"printf '%s\n' "$@" > args.txt
{}
test -s "$img" || {{ echo "image missing" >&2; exit 3; }}
printf '%s' '[{{"region":1,"text":"Hello"}},{{"region":2,"text":"World"}}]'"#,
            IMAGE_FROM_PROMPT
        ),
    );

    let result = manager(script, work.path(), 10)
        .perform_ocr(&sample_image())
        .await
        .unwrap();

    assert_eq!(result.text(), "Hello\nWorld");
    assert_eq!(result.engine(), "Gemini CLI");
    assert_eq!(result.text_blocks().len(), 2);
    assert!((result.text_blocks()[0].bounding_box.y - 0.2).abs() < 1e-9);

    let args = std::fs::read_to_string(work.path().join("args.txt")).unwrap();
    assert!(args.starts_with("--model\ngemini-2.5-flash\n--prompt\n"));
    assert!(args.contains("Region 1: x=0.100, y=0.200, w=0.300, h=0.050"));
    let image_ref = args.trim_end().rsplit('\n').next().unwrap();
    assert!(image_ref.starts_with("@capture-") && image_ref.ends_with(".jpg"));
    assert!(!work.path().join(&image_ref[1..]).exists());
}

#[tokio::test]
async fn concurrent_calls_each_read_their_own_image() {
    let bin = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    // Both calls have written their image by the time either one reads.
    let script = write_script(
        bin.path(),
        "gemini",
        &format!(
            r#"{}
sleep 1
size=$(wc -c < "$img" | tr -d ' ')
printf '[{{"region":1,"text":"%s"}}]' "$size""#,
            IMAGE_FROM_PROMPT
        ),
    );
    let manager = manager(script, work.path(), 10);

    let small = sample_image();
    let mut noisy = RgbImage::new(400, 300);
    for (x, y, px) in noisy.enumerate_pixels_mut() {
        *px = Rgb([(x * 7 % 251) as u8, (y * 13 % 241) as u8, ((x ^ y) % 256) as u8]);
    }
    let large = DynamicImage::ImageRgb8(noisy);

    let level = OcrSettings::default().image_optimization;
    let small_len = prepare_for_upload(&small, level).unwrap().bytes.len();
    let large_len = prepare_for_upload(&large, level).unwrap().bytes.len();
    assert_ne!(small_len, large_len);

    let (a, b) = tokio::join!(manager.perform_ocr(&small), manager.perform_ocr(&large));

    assert_eq!(a.unwrap().text(), small_len.to_string());
    assert_eq!(b.unwrap().text(), large_len.to_string());
    let leftovers: Vec<_> = std::fs::read_dir(work.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".jpg"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn non_zero_exit_carries_stderr() {
    let bin = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let script = write_script(bin.path(), "gemini", "echo 'quota exceeded' >&2\nexit 2");

    let err = manager(script, work.path(), 10)
        .perform_ocr(&sample_image())
        .await
        .unwrap_err();

    match err {
        OcrError::Backend { engine, status, body } => {
            assert_eq!(engine, EngineKind::GeminiCli);
            assert_eq!(status, Some(2));
            assert_eq!(body, "quota exceeded");
        }
        other => panic!("expected backend error, got {:?}", other),
    }
}

#[tokio::test]
async fn empty_output_is_an_empty_response() {
    let bin = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let script = write_script(bin.path(), "gemini", "exit 0");

    let err = manager(script, work.path(), 10)
        .perform_ocr(&sample_image())
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::EmptyResponse(EngineKind::GeminiCli)));
}

#[tokio::test]
async fn slow_cli_times_out_without_partial_text() {
    let bin = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let script = write_script(
        bin.path(),
        "gemini",
        "printf '[{\"region\":1,\"text\":\"partial\"}'\nexec sleep 30",
    );

    let start = Instant::now();
    let err = manager(script, work.path(), 1)
        .perform_ocr(&sample_image())
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {:?}", err);
    assert!(matches!(err, OcrError::Timeout { engine: EngineKind::GeminiCli, seconds: 1 }));
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn missing_executable_is_a_configuration_error() {
    let work = tempfile::tempdir().unwrap();
    let err = manager(PathBuf::from("/nonexistent/gemini"), work.path(), 10)
        .perform_ocr(&sample_image())
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::MissingExecutable(_)));
    assert!(err.is_configuration());
}

#[tokio::test]
async fn both_pipes_drain_while_process_runs() {
    let bin = tempfile::tempdir().unwrap();
    // Larger than a pipe buffer on both streams.
    let script = write_script(
        bin.path(),
        "noisy",
        "head -c 300000 /dev/zero | tr '\\0' a\nhead -c 300000 /dev/zero | tr '\\0' b >&2",
    );

    let output = run_with_timeout(
        EngineKind::GeminiCli,
        &script,
        &[],
        bin.path(),
        Duration::from_secs(10),
    )
    .await
    .unwrap();

    assert!(output.status.success());
    assert_eq!(output.stdout.len(), 300_000);
    assert_eq!(output.stderr.len(), 300_000);
}
