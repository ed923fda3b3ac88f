//! Shared helpers for integration tests.
//!
//! `MockServer` answers exactly one HTTP request with a canned response and
//! hands the captured request back to the test.

#![allow(dead_code)]

use image::{DynamicImage, Rgb, RgbImage};
use std::sync::{Arc, Mutex};
use textsnap_lib::engine::{EngineKind, OcrEngine};
use textsnap_lib::error::OcrError;
use textsnap_lib::model::{NormalizedRect, OcrResult, TextBlock};
use textsnap_lib::ocr::{DetectionRequest, LanguageIdentifier, Observation, TextRecognizer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// What the mock server received.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// e.g. `POST /v1/ocr HTTP/1.1`
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

pub struct MockServer {
    pub base_url: String,
    request: oneshot::Receiver<CapturedRequest>,
}

impl MockServer {
    /// Serve one request, replying with `status` and a JSON `body`.
    pub async fn start(status: u16, body: impl Into<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response_body = body.into();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut buf = Vec::new();
            let mut chunk = [0u8; 8192];
            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = find(&buf, b"\r\n\r\n") {
                    break pos;
                }
            };

            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let mut lines = head.split("\r\n");
            let request_line = lines.next().unwrap_or_default().to_string();
            let headers: Vec<(String, String)> = lines
                .filter_map(|l| l.split_once(':'))
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .collect();
            let content_length: usize = headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.parse().ok())
                .unwrap_or(0);

            let mut body = buf[header_end + 4..].to_vec();
            while body.len() < content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                body.extend_from_slice(&chunk[..n]);
            }

            let reply = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason(status),
                response_body.len(),
                response_body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            let _ = tx.send(CapturedRequest {
                request_line,
                headers,
                body: String::from_utf8_lossy(&body).to_string(),
            });
        });

        Self {
            base_url: format!("http://{}", addr),
            request: rx,
        }
    }

    /// The request the server answered.
    pub async fn request(self) -> CapturedRequest {
        self.request.await.expect("mock server received no request")
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

/// A small image with some non-uniform pixels.
pub fn sample_image() -> DynamicImage {
    let mut img = RgbImage::new(120, 60);
    for x in 10..110 {
        img.put_pixel(x, 20, Rgb([0, 0, 0]));
        img.put_pixel(x, 40, Rgb([0, 0, 0]));
    }
    DynamicImage::ImageRgb8(img)
}

/// Recognizer returning fixed lines in bottom-left-origin coordinates.
pub struct FixedRecognizer {
    pub observations: Vec<Observation>,
    pub calls: Mutex<usize>,
}

impl FixedRecognizer {
    pub fn new(observations: Vec<Observation>) -> Arc<Self> {
        Arc::new(Self {
            observations,
            calls: Mutex::new(0),
        })
    }

    /// Two lines whose top-left boxes are (0.1, 0.2, 0.3, 0.05) and
    /// (0.1, 0.3, 0.3, 0.05).
    pub fn two_regions() -> Arc<Self> {
        Self::new(vec![
            Observation {
                text: "Helo".to_string(),
                confidence: 0.5,
                bounding_box: NormalizedRect::new(0.1, 0.75, 0.3, 0.05),
            },
            Observation {
                text: "Wrld".to_string(),
                confidence: 0.5,
                bounding_box: NormalizedRect::new(0.1, 0.65, 0.3, 0.05),
            },
        ])
    }
}

impl TextRecognizer for FixedRecognizer {
    fn detect(
        &self,
        _image: &DynamicImage,
        _request: &DetectionRequest,
    ) -> Result<Vec<Observation>, OcrError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.observations.clone())
    }
}

pub struct EnglishIdentifier;

impl LanguageIdentifier for EnglishIdentifier {
    fn dominant_language(&self, text: &str) -> Option<String> {
        (!text.trim().is_empty()).then(|| "en".to_string())
    }
}

/// Engine that always returns the same blocks.
pub struct CannedEngine {
    pub kind: EngineKind,
    pub blocks: Vec<TextBlock>,
}

#[async_trait::async_trait]
impl OcrEngine for CannedEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn recognize(&self, _image: &DynamicImage) -> Result<OcrResult, OcrError> {
        Ok(OcrResult::from_blocks(
            self.blocks.clone(),
            None,
            std::time::Duration::ZERO,
            self.kind.display_name(),
        ))
    }
}
