//! Shared HTTP plumbing for the cloud engines.

use crate::engine::EngineKind;
use crate::error::OcrError;
use std::time::Instant;

/// POST a JSON body and return the decoded JSON response.
///
/// Non-2xx responses become `OcrError::Backend` with the raw body attached.
/// Transport errors drop the request URL before they surface.
pub(crate) async fn post_json(
    engine: EngineKind,
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
) -> Result<serde_json::Value, OcrError> {
    let start = Instant::now();
    let response = request
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| {
            let e = e.without_url();
            log::error!("[LLM] {} request failed: {}", engine, e);
            OcrError::Http(e)
        })?;

    let status = response.status();
    log::info!(
        "[LLM] {} responded {} in {}ms",
        engine,
        status,
        start.elapsed().as_millis()
    );

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        log::error!("[LLM] {} API returned {}: {}", engine, status, body);
        return Err(OcrError::Backend {
            engine,
            status: Some(status.as_u16()),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| OcrError::Http(e.without_url()))
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
