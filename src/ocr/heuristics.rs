//! Language heuristics for local OCR.
//!
//! Maps a detected language to recognition hints, and identifies the
//! dominant language of a text sample by Unicode script when the platform
//! has no language recognizer of its own.

use super::LanguageIdentifier;

/// Hints used when the sample pass found nothing to identify.
/// Korean first, then the other commonly captured languages.
pub const FALLBACK_LANGUAGES: [&str; 13] = [
    "ko-KR", "en-US", "ja-JP", "zh-Hans", "zh-Hant", "fr-FR", "de-DE", "es-ES", "it-IT", "pt-BR",
    "ru-RU", "uk-UA", "vi-VT",
];

/// Ranked recognition hints for a detected language tag.
///
/// Unknown or unsupported languages fall back to English only.
pub fn recognition_languages(detected: Option<&str>) -> Vec<String> {
    let hints: &[&str] = match detected.map(primary_subtag).as_deref() {
        Some("ko") => &["ko-KR", "en-US"],
        Some("ja") => &["ja-JP", "en-US"],
        Some("zh") => match detected {
            Some(tag) if tag.contains("Hant") || tag.ends_with("TW") || tag.ends_with("HK") => {
                &["zh-Hant", "en-US"]
            }
            _ => &["zh-Hans", "en-US"],
        },
        Some("fr") => &["fr-FR", "en-US"],
        Some("de") => &["de-DE", "en-US"],
        Some("es") => &["es-ES", "en-US"],
        Some("it") => &["it-IT", "en-US"],
        Some("pt") => &["pt-BR", "en-US"],
        Some("ru") => &["ru-RU", "en-US"],
        Some("uk") => &["uk-UA", "en-US"],
        Some("vi") => &["vi-VT", "en-US"],
        _ => &["en-US"],
    };
    hints.iter().map(|s| s.to_string()).collect()
}

fn primary_subtag(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Identify the dominant language by counting characters per script.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptLanguageIdentifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Script {
    Hangul,
    Kana,
    Han,
    Cyrillic,
    Thai,
    Arabic,
    Hebrew,
    Greek,
    Latin,
}

fn script_of(c: char) -> Option<Script> {
    match c as u32 {
        0xAC00..=0xD7AF | 0x1100..=0x11FF | 0x3130..=0x318F => Some(Script::Hangul),
        0x3040..=0x30FF | 0x31F0..=0x31FF | 0xFF66..=0xFF9F => Some(Script::Kana),
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF => Some(Script::Han),
        0x0400..=0x04FF | 0x0500..=0x052F => Some(Script::Cyrillic),
        0x0E00..=0x0E7F => Some(Script::Thai),
        0x0600..=0x06FF | 0x0750..=0x077F => Some(Script::Arabic),
        0x0590..=0x05FF => Some(Script::Hebrew),
        0x0370..=0x03FF => Some(Script::Greek),
        _ if c.is_ascii_alphabetic() => Some(Script::Latin),
        0x00C0..=0x024F => Some(Script::Latin),
        _ => None,
    }
}

impl LanguageIdentifier for ScriptLanguageIdentifier {
    fn dominant_language(&self, text: &str) -> Option<String> {
        let mut counts: Vec<(Script, usize)> = Vec::new();
        for script in text.chars().filter_map(script_of) {
            match counts.iter_mut().find(|(s, _)| *s == script) {
                Some((_, n)) => *n += 1,
                None => counts.push((script, 1)),
            }
        }

        let count = |s: Script| {
            counts
                .iter()
                .find(|(x, _)| *x == s)
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };

        // Japanese text mixes kana with Han; any real amount of kana decides it.
        if count(Script::Kana) > 0 && count(Script::Kana) * 5 >= count(Script::Han) {
            return Some("ja".to_string());
        }

        let (script, _) = counts.into_iter().max_by_key(|(_, n)| *n)?;
        let tag = match script {
            Script::Hangul => "ko",
            Script::Kana => "ja",
            Script::Han => "zh-Hans",
            Script::Cyrillic => "ru",
            Script::Thai => "th",
            Script::Arabic => "ar",
            Script::Hebrew => "he",
            Script::Greek => "el",
            Script::Latin => "en",
        };
        Some(tag.to_string())
    }
}
