//! Gemini region OCR through the `gemini` command-line client.
//!
//! Same prompt and parsing as the HTTP Gemini engine, but the request is a
//! child process: each call writes its image to its own file in a working
//! directory, and the prompt references it relatively
//! (`@capture-<uuid>.jpg`). The file is removed once the process ends.
//! stdout and stderr are drained concurrently while the process runs, the
//! whole exchange is raced against a hard timeout, and on expiry the child
//! is killed and any partial output dropped.

use super::image_prep::prepare_for_upload;
use super::prompts::build_region_prompt;
use super::{region_result, EngineContext};
use crate::engine::{unsupported, EngineKind, OcrEngine};
use crate::error::OcrError;
use crate::model::{OcrResult, TextBlock};
use async_trait::async_trait;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

/// Per-call image file name inside the working directory.
pub fn image_file_name() -> String {
    format!("capture-{}.jpg", Uuid::new_v4())
}

/// Default working directory for CLI runs.
pub fn default_work_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("textsnap")
        .join("gemini-cli")
}

pub struct GeminiCliEngine {
    ctx: EngineContext,
    work_dir: PathBuf,
}

/// Captured output of a finished CLI run.
#[derive(Debug)]
pub struct CliOutput {
    pub status: std::process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl GeminiCliEngine {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ctx,
            work_dir: default_work_dir(),
        }
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Executable from Settings, else `gemini` on PATH.
    fn resolve_executable(&self, configured: Option<&Path>) -> Result<PathBuf, OcrError> {
        if let Some(path) = configured {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            log::warn!("[LLM] Configured Gemini CLI path missing: {}", path.display());
            return Err(OcrError::MissingExecutable(path.display().to_string()));
        }
        which::which("gemini").map_err(|_| OcrError::MissingExecutable("gemini".to_string()))
    }
}

/// Command-line arguments for one OCR request.
pub fn build_args(model: &str, prompt: &str, image_file: &str) -> Vec<String> {
    vec![
        "--model".to_string(),
        model.to_string(),
        "--prompt".to_string(),
        format!("{}\n\n@{}", prompt, image_file),
    ]
}

async fn read_stream<R: AsyncRead + Unpin>(mut stream: R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Spawn `program`, drain both pipes while it runs and wait for exit,
/// killing it if `timeout` elapses first.
pub async fn run_with_timeout(
    engine: EngineKind,
    program: &Path,
    args: &[String],
    cwd: &Path,
    timeout: Duration,
) -> Result<CliOutput, OcrError> {
    let mut child = tokio::process::Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OcrError::MissingExecutable(program.display().to_string())
            } else {
                OcrError::Io(e)
            }
        })?;

    let stdout = child.stdout.take().ok_or_else(|| OcrError::Backend {
        engine,
        status: None,
        body: "no stdout pipe".to_string(),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| OcrError::Backend {
        engine,
        status: None,
        body: "no stderr pipe".to_string(),
    })?;

    let outcome = tokio::time::timeout(timeout, async {
        let (out, err, status) =
            tokio::join!(read_stream(stdout), read_stream(stderr), child.wait());
        Ok::<_, std::io::Error>((out?, err?, status?))
    })
    .await;

    match outcome {
        Ok(result) => {
            let (out, err, status) = result?;
            Ok(CliOutput {
                status,
                stdout: String::from_utf8_lossy(&out).into_owned(),
                stderr: String::from_utf8_lossy(&err).into_owned(),
            })
        }
        Err(_) => {
            log::error!(
                "[LLM] {} timed out after {}s, killing process",
                engine,
                timeout.as_secs()
            );
            if let Err(e) = child.kill().await {
                log::warn!("[LLM] Failed to kill {} process: {}", engine, e);
            }
            Err(OcrError::Timeout {
                engine,
                seconds: timeout.as_secs(),
            })
        }
    }
}

#[async_trait]
impl OcrEngine for GeminiCliEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::GeminiCli
    }

    async fn recognize(&self, _image: &DynamicImage) -> Result<OcrResult, OcrError> {
        Err(unsupported(self.kind(), "recognize without prior regions"))
    }

    async fn recognize_with_priors(
        &self,
        image: &DynamicImage,
        priors: &[TextBlock],
    ) -> Result<OcrResult, OcrError> {
        let settings = self.ctx.settings.snapshot();
        let program = self.resolve_executable(settings.gemini_cli_path.as_deref())?;
        let model = settings.model_for(EngineKind::GeminiCli).unwrap_or_default();

        let start = Instant::now();
        let encoded = prepare_for_upload(image, settings.image_optimization)?;
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let image_file = image_file_name();
        let image_path = self.work_dir.join(&image_file);
        tokio::fs::write(&image_path, &encoded.bytes).await?;

        let prompt = build_region_prompt(settings.prompt(), priors);
        let args = build_args(&model, &prompt, &image_file);

        log::info!("[LLM] Provider: gemini-cli ({})", program.display());
        log::info!("[LLM] Model: {}", model);
        log::info!("[LLM] Regions: {}", priors.len());

        let output = run_with_timeout(
            EngineKind::GeminiCli,
            &program,
            &args,
            &self.work_dir,
            settings.cli_timeout(),
        )
        .await;

        if let Err(e) = tokio::fs::remove_file(&image_path).await {
            log::warn!("[LLM] Could not remove {}: {}", image_path.display(), e);
        }
        let output = output?;

        log::info!(
            "[LLM] Gemini CLI exited {} in {}ms ({} bytes stdout)",
            output.status,
            start.elapsed().as_millis(),
            output.stdout.len()
        );

        if !output.status.success() {
            return Err(OcrError::Backend {
                engine: EngineKind::GeminiCli,
                status: output.status.code().and_then(|c| u16::try_from(c).ok()),
                body: output.stderr.trim().to_string(),
            });
        }

        // The CLI reports no token usage.
        self.ctx.track_usage(EngineKind::GeminiCli, None);

        region_result(EngineKind::GeminiCli, &output.stdout, priors, start)
    }
}
