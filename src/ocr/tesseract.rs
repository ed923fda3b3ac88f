//! Tesseract OCR recognizer (non-macOS).
//!
//! Runs the `tesseract` command-line tool in TSV mode and groups word rows
//! into lines. Boxes are converted to normalized bottom-left-origin
//! coordinates so the output matches what Apple Vision reports.
//!
//! tesseract aborts when any requested traineddata file is missing, so the
//! language hints are narrowed to what `tesseract --list-langs` reports.

use super::{DetectionRequest, Observation, TextRecognizer};
use crate::error::OcrError;
use crate::model::NormalizedRect;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tempfile::TempDir;

/// Tesseract-backed text detector.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    program: PathBuf,
    /// Installed traineddata codes; `None` inside when they could not be listed.
    installed: OnceLock<Option<Vec<String>>>,
}

impl TesseractRecognizer {
    pub fn new() -> Self {
        Self::with_program("tesseract")
    }

    /// Use a specific tesseract binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            installed: OnceLock::new(),
        }
    }

    /// Skip `--list-langs` and assume exactly these languages are installed.
    pub fn with_installed_languages(mut self, codes: Vec<String>) -> Self {
        self.installed = OnceLock::from(Some(codes));
        self
    }

    /// Installed languages, queried once per recognizer.
    fn installed_languages(&self) -> Option<&[String]> {
        self.installed
            .get_or_init(|| {
                let output = match Command::new(&self.program).arg("--list-langs").output() {
                    Ok(output) if output.status.success() => output,
                    Ok(output) => {
                        log::warn!(
                            "[OCR] tesseract --list-langs failed: {}",
                            String::from_utf8_lossy(&output.stderr).trim()
                        );
                        return None;
                    }
                    Err(e) => {
                        log::warn!("[OCR] Could not list tesseract languages: {}", e);
                        return None;
                    }
                };
                // Releases before 4.0 print the list on stderr.
                let mut codes = parse_list_langs(&String::from_utf8_lossy(&output.stdout));
                if codes.is_empty() {
                    codes = parse_list_langs(&String::from_utf8_lossy(&output.stderr));
                }
                log::info!("[OCR] tesseract languages installed: {}", codes.join(", "));
                Some(codes)
            })
            .as_deref()
    }

    fn run_tesseract(&self, image_path: &Path, languages: &str) -> Result<String, OcrError> {
        let output = Command::new(&self.program)
            .arg(image_path)
            .arg("stdout")
            .args(["-l", languages])
            .arg("tsv")
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(OcrError::Recognition(format!(
                    "tesseract failed: {}",
                    stderr.trim()
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                OcrError::MissingExecutable(self.program.display().to_string()),
            ),
            Err(e) => Err(OcrError::Io(e)),
        }
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Language codes from `tesseract --list-langs` output, skipping the
/// "List of available languages in ...:" header.
pub fn parse_list_langs(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.ends_with(':') && !l.contains(' '))
        .map(str::to_string)
        .collect()
}

/// Map BCP-47 hints to tesseract traineddata codes.
///
/// Unknown hints are dropped, and so are codes missing from `installed`
/// when that list is known. Falls back to `eng`, or to the first installed
/// script-neutral language when `eng` itself is absent.
pub fn tesseract_languages(hints: &[String], installed: Option<&[String]>) -> String {
    let is_installed =
        |code: &str| installed.map_or(true, |langs| langs.iter().any(|l| l == code));

    let mut codes: Vec<&str> = Vec::new();
    for hint in hints {
        let code = match hint.as_str() {
            "zh-Hans" => "chi_sim",
            "zh-Hant" => "chi_tra",
            other => match other.split(['-', '_']).next().unwrap_or_default() {
                "ko" => "kor",
                "en" => "eng",
                "ja" => "jpn",
                "zh" => "chi_sim",
                "fr" => "fra",
                "de" => "deu",
                "es" => "spa",
                "it" => "ita",
                "pt" => "por",
                "ru" => "rus",
                "uk" => "ukr",
                "vi" => "vie",
                _ => continue,
            },
        };
        if !codes.contains(&code) && is_installed(code) {
            codes.push(code);
        }
    }
    if !codes.is_empty() {
        return codes.join("+");
    }
    if is_installed("eng") {
        return "eng".to_string();
    }
    installed
        .and_then(|langs| langs.iter().find(|l| l.as_str() != "osd"))
        .cloned()
        .unwrap_or_else(|| "eng".to_string())
}

#[derive(Debug)]
struct LineAccumulator {
    key: (u32, u32, u32, u32),
    words: Vec<String>,
    confidences: Vec<f64>,
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl LineAccumulator {
    fn into_observation(self, width: u32, height: u32) -> Observation {
        let w = f64::from(width.max(1));
        let h = f64::from(height.max(1));
        let confidence = if self.confidences.is_empty() {
            0.0
        } else {
            self.confidences.iter().sum::<f64>() / self.confidences.len() as f64 / 100.0
        };
        Observation {
            text: self.words.join(" "),
            confidence: confidence.clamp(0.0, 1.0),
            bounding_box: NormalizedRect::new(
                f64::from(self.left) / w,
                1.0 - f64::from(self.bottom) / h,
                f64::from(self.right - self.left) / w,
                f64::from(self.bottom - self.top) / h,
            ),
        }
    }
}

/// Group TSV word rows (level 5) into line observations.
pub fn parse_tsv(tsv: &str, width: u32, height: u32) -> Vec<Observation> {
    let mut lines: Vec<LineAccumulator> = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let text = cols[11..].join("\t");
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let nums: Option<Vec<u32>> = cols[1..10].iter().map(|c| c.parse().ok()).collect();
        let Some(nums) = nums else {
            log::debug!("[OCR] Skipping malformed tesseract row: {}", row);
            continue;
        };
        let key = (nums[0], nums[1], nums[2], nums[3]);
        let (left, top, w, h) = (nums[5], nums[6], nums[7], nums[8]);
        let conf: f64 = cols[10].parse().unwrap_or(-1.0);

        if lines.last().map(|line| line.key) != Some(key) {
            lines.push(LineAccumulator {
                key,
                words: Vec::new(),
                confidences: Vec::new(),
                left,
                top,
                right: left + w,
                bottom: top + h,
            });
        }
        let Some(line) = lines.last_mut() else {
            continue;
        };
        line.words.push(text.to_string());
        if conf >= 0.0 {
            line.confidences.push(conf);
        }
        line.left = line.left.min(left);
        line.top = line.top.min(top);
        line.right = line.right.max(left + w);
        line.bottom = line.bottom.max(top + h);
    }

    lines
        .into_iter()
        .map(|line| line.into_observation(width, height))
        .collect()
}

impl TextRecognizer for TesseractRecognizer {
    fn detect(
        &self,
        image: &DynamicImage,
        request: &DetectionRequest,
    ) -> Result<Vec<Observation>, OcrError> {
        let temp_dir = TempDir::new()?;
        let image_path = temp_dir.path().join("capture.png");
        image.save_with_format(&image_path, image::ImageFormat::Png)?;

        let languages = tesseract_languages(&request.languages, self.installed_languages());
        log::debug!(
            "[OCR] tesseract {:?} pass, languages={}",
            request.level,
            languages
        );
        let tsv = self.run_tesseract(&image_path, &languages)?;

        let mut observations = parse_tsv(&tsv, image.width(), image.height());
        if let Some(max) = request.max_observations {
            observations.truncate(max);
        }
        Ok(observations)
    }
}
