//! Region response parsing — turns an LLM's reply into positioned blocks.
//!
//! The model is asked for a JSON array of `{"region": N, "text": "..."}`
//! objects, where N is the 1-based index of a prior block. Replies are
//! often fenced in markdown or slightly malformed, so this never fails:
//! it degrades to pairing non-empty lines with prior blocks by position.

use crate::model::TextBlock;
use serde::Deserialize;

/// One decoded element of the model's JSON reply.
#[derive(Debug, Clone, Deserialize)]
struct RegionText {
    region: i64,
    text: String,
}

/// How the blocks in a `RegionParse` were recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// Decoded the JSON region array.
    Structured,
    /// JSON was missing or unusable; lines zipped with priors by position.
    LineFallback,
    /// Nothing recoverable.
    Empty,
}

/// Output of `parse_regions`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionParse {
    pub blocks: Vec<TextBlock>,
    pub strategy: ParseStrategy,
}

/// Strip a markdown code fence that wraps the whole reply.
///
/// An opener is only removed at the very start (```` ```json ```` preferred)
/// and a closer only at the very end, so backticks inside the payload
/// survive.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut body = trimmed;
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if body.len() < trimmed.len() {
        if let Some(rest) = body.strip_suffix("```") {
            body = rest;
        }
    }
    body.trim().to_string()
}

/// Body of the first fenced block embedded in prose, e.g.
/// "Here you go:\n```json\n[...]\n```\nDone."
pub fn embedded_fence(raw: &str) -> Option<&str> {
    let (start, open_len) = match raw.find("```json") {
        Some(start) => (start, "```json".len()),
        None => (raw.find("```")?, 3),
    };
    let body = &raw[start + open_len..];
    let end = body.rfind("```")?;
    Some(body[..end].trim())
}

/// Non-empty, trimmed lines of a reply.
pub fn non_empty_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Map a raw model reply onto the prior blocks.
///
/// Mapped blocks keep the prior's box, take the model's text and get a
/// confidence of 1.0. Out-of-range region numbers are dropped.
pub fn parse_regions(raw: &str, priors: &[TextBlock]) -> RegionParse {
    let cleaned = strip_code_fences(raw);

    let mut decoded = serde_json::from_str::<Vec<RegionText>>(&cleaned);
    if decoded.is_err() {
        if let Some(inner) = embedded_fence(&cleaned) {
            if let Ok(regions) = serde_json::from_str::<Vec<RegionText>>(inner) {
                log::debug!("[PARSER] Decoded region array from a fence inside prose");
                decoded = Ok(regions);
            }
        }
    }

    match decoded {
        Ok(regions) => {
            let decoded = regions.len();
            let blocks: Vec<TextBlock> = regions
                .into_iter()
                .filter_map(|r| {
                    let index = usize::try_from(r.region.checked_sub(1)?).ok()?;
                    let prior = priors.get(index)?;
                    Some(TextBlock::new(r.text, prior.bounding_box, 1.0))
                })
                .collect();
            if decoded > blocks.len() {
                log::debug!(
                    "[PARSER] Dropped {} region(s) outside 1..={}",
                    decoded - blocks.len(),
                    priors.len()
                );
            }
            if !blocks.is_empty() {
                return RegionParse {
                    blocks,
                    strategy: ParseStrategy::Structured,
                };
            }
            log::warn!(
                "[PARSER] fallback: region array decoded ({} entries) but none mapped onto {} priors",
                decoded,
                priors.len()
            );
        }
        Err(e) => {
            log::warn!(
                "[PARSER] fallback: region array did not decode ({}) — raw: {}",
                e,
                preview(&cleaned)
            );
        }
    }

    let blocks: Vec<TextBlock> = non_empty_lines(&cleaned)
        .into_iter()
        .zip(priors)
        .map(|(line, prior)| TextBlock::new(line, prior.bounding_box, 1.0))
        .collect();

    let strategy = if blocks.is_empty() {
        ParseStrategy::Empty
    } else {
        ParseStrategy::LineFallback
    };
    log::info!(
        "[PARSER] Line fallback produced {} block(s) from {} priors",
        blocks.len(),
        priors.len()
    );
    RegionParse { blocks, strategy }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}
