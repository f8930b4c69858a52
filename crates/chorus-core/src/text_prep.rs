//! Text preparation for TTS — validation, truncation, symbol clean-up and
//! chunking.
//!
//! Pure functions, no I/O. Lengths are counted in characters, never bytes, so
//! multi-byte input is never split inside a code point.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::ValidationError;

/// Longer input is cut to this many characters before synthesis.
pub const MAX_TEXT_CHARS: usize = 500;

// Compiled on first use.
static RE_HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static RE_DECIMAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d)\.(\d)").unwrap());
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Symbols read aloud as words.
const SPOKEN_SYMBOLS: &[(char, &str)] = &[
    ('&', " and "),
    ('@', " at "),
    ('$', " dollars "),
    ('%', " percent "),
    ('=', " equals "),
    ('+', " plus "),
];

/// Text that passed validation, ready to hand to an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedText {
    pub text: String,
    /// Whether the input was longer than the limit.
    pub truncated: bool,
}

/// Validate and truncate request text.
///
/// Rejects text that is empty after trimming. Anything longer than
/// `max_chars` characters is cut to its first `max_chars` characters; the
/// remainder is returned untouched (no trimming).
pub fn prepare_text(text: &str, max_chars: usize) -> Result<PreparedText, ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    let cut = truncate_chars(text, max_chars);
    Ok(PreparedText {
        truncated: cut.len() < text.len(),
        text: cut.to_string(),
    })
}

/// The first `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Make text read naturally when spoken.
///
/// Strips HTML tags, spells out common symbols, reads decimals as
/// "1 point 5" and collapses whitespace.
pub fn clean_text_for_speech(text: &str) -> String {
    let mut c = RE_HTML_TAG.replace_all(text, "").into_owned();

    for (symbol, word) in SPOKEN_SYMBOLS {
        if c.contains(*symbol) {
            c = c.replace(*symbol, word);
        }
    }

    // Run twice so "1.2.3" reads "1 point 2 point 3" (matches overlap on the
    // shared digit).
    for _ in 0..2 {
        c = RE_DECIMAL.replace_all(&c, "$1 point $2").into_owned();
    }

    c = RE_WHITESPACE.replace_all(&c, " ").into_owned();
    c.trim().to_string()
}

/// Split text into chunks of at most `max_chars` characters.
///
/// Prefers sentence boundaries (`. `), then word boundaries, then hard-splits.
/// Every non-blank piece of the input ends up in some chunk.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut result = Vec::new();
    let mut remaining = text;

    while remaining.chars().count() > max_chars {
        let window = truncate_chars(remaining, max_chars);
        let window_chars = window.chars().count();

        // Prefer sentence boundary (". ")
        let split_at = match window.rfind(". ") {
            Some(pos) if window[..pos].chars().count() >= window_chars / 2 => pos + 1,
            _ => word_boundary_or_hard(window, window_chars),
        };

        let chunk = remaining[..split_at].trim_end();
        if !chunk.is_empty() {
            result.push(chunk.to_string());
        }
        remaining = remaining[split_at..].trim_start();
    }

    if !remaining.is_empty() {
        result.push(remaining.to_string());
    }

    result
}

/// Byte offset of a word boundary in `window`, or its end for a hard split.
fn word_boundary_or_hard(window: &str, window_chars: usize) -> usize {
    if let Some(pos) = window.rfind(' ') {
        if window[..pos].chars().count() >= window_chars / 3 {
            return pos;
        }
    }
    window.len()
}
