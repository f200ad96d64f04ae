//! Text normalization for slide text layers and document summaries.
//!
//! Slide text keeps its line structure but loses runs of spaces, tabs and
//! blank lines. Summaries are flattened and cut down before they go into a
//! prompt.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Regex to collapse multiple whitespace characters into one.
static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}\u{200b}]+").unwrap());

/// Any whitespace run, including newlines.
static ANY_WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Characters a compressed summary may keep.
static SUMMARY_DISALLOWED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.,!?-]").unwrap());

/// Default character budget for a compressed summary.
pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 2000;

/// Text normalizer for slide text layers.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    /// Whether to preserve original line breaks.
    preserve_line_breaks: bool,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextNormalizer {
    /// Create a new text normalizer with default settings.
    pub fn new() -> Self {
        Self {
            preserve_line_breaks: true,
        }
    }

    /// Set whether to preserve original line breaks.
    pub fn with_preserve_line_breaks(mut self, preserve: bool) -> Self {
        self.preserve_line_breaks = preserve;
        self
    }

    /// Normalize a block of slide text.
    ///
    /// - Applies Unicode NFC composition
    /// - Collapses whitespace runs to single spaces
    /// - Drops empty lines and trims each line
    pub fn normalize(&self, text: &str) -> String {
        let composed: String = text.replace("\r\n", "\n").replace('\r', "\n").nfc().collect();

        if self.preserve_line_breaks {
            composed
                .lines()
                .map(|line| WHITESPACE_COLLAPSE_REGEX.replace_all(line, " ").trim().to_string())
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            ANY_WHITESPACE_REGEX
                .replace_all(&composed, " ")
                .trim()
                .to_string()
        }
    }

    /// Normalize several text frames and join them in order.
    pub fn normalize_frames<'a, I>(&self, frames: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let separator = if self.preserve_line_breaks { "\n" } else { " " };
        frames
            .into_iter()
            .map(|frame| self.normalize(frame))
            .filter(|frame| !frame.is_empty())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

/// Shrink a whole-document summary for use inside a prompt.
///
/// Collapses whitespace, strips characters other than word characters,
/// whitespace and `. , ! ? -`, then truncates to `max_chars` characters.
pub fn compress_summary(text: &str, max_chars: usize) -> String {
    let flattened = ANY_WHITESPACE_REGEX.replace_all(text, " ");
    let cleaned = SUMMARY_DISALLOWED_REGEX.replace_all(&flattened, "");
    cleaned.trim().chars().take(max_chars).collect::<String>().trim_end().to_string()
}
