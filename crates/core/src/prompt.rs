//! Prompt construction and response splitting for narration generation.
//!
//! The oracle is asked to open every slide's narration with a `[SLIDE n]`
//! line, where `n` is the deck-wide slide number. Responses are split on
//! that delimiter and nothing else.

use regex::Regex;
use std::fmt::Write;
use std::sync::LazyLock;

use crate::types::{Chunk, ChunkRole, SlideRecord};
use crate::window::ContinuityWindow;

/// `[SLIDE n]` delimiter, optionally bolded or written as `[SLIDE n of N]`.
static DELIMITER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:\*\*)?[ \t]*\[slide[ \t]+(\d+)(?:[ \t]+of[ \t]+\d+)?\](?:\*\*)?[ \t]*:?")
        .unwrap()
});

const ROLE_INTRO: &str = "You are an expert presentation script writer. \
The speaker presents a multi-slide deck alone, in a professional and natural spoken style.";

const TERMINAL_LANGUAGE_BAN: &str = "Do not wrap up the presentation: no closing remarks such as \
\"in conclusion\", \"that concludes\" or \"thank you\", and no words implying finality such as \
\"finally\" or \"lastly\".";

/// The delimiter line for a slide.
pub fn delimiter(index: usize) -> String {
    format!("[SLIDE {}]", index)
}

/// One narration segment cut out of an oracle response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Slide number named by the delimiter.
    pub number: Option<usize>,
    pub text: String,
}

/// Split a chunk response into segments.
///
/// Text before the first delimiter is dropped. A response without any
/// delimiter yields no segments, so it is caught as a count mismatch.
pub fn split_segments(response: &str) -> Vec<Segment> {
    let matches: Vec<_> = DELIMITER_REGEX.captures_iter(response).collect();
    let mut segments = Vec::with_capacity(matches.len());

    if let Some(first) = matches.first() {
        let preamble = response[..first.get(0).map_or(0, |m| m.start())].trim();
        if !preamble.is_empty() {
            log::debug!("dropping {} chars before first slide delimiter", preamble.len());
        }
    }

    for (i, caps) in matches.iter().enumerate() {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(response.len(), |m| m.start());
        let text = response[whole.end()..end].trim();
        if text.is_empty() {
            continue;
        }
        segments.push(Segment {
            number: caps.get(1).and_then(|n| n.as_str().parse().ok()),
            text: text.to_string(),
        });
    }

    segments
}

/// Read a single-slide response.
///
/// Undelimited text is one segment. A delimited response keeps every
/// segment, so a reply that narrates more slides than asked is counted as
/// such instead of being folded into one narration.
pub fn slide_segments(response: &str) -> Vec<Segment> {
    let segments = split_segments(response);
    if !segments.is_empty() {
        return segments;
    }
    let text = response.trim();
    if text.is_empty() {
        return Vec::new();
    }
    vec![Segment {
        number: None,
        text: text.to_string(),
    }]
}

/// Describe one slide's content for a prompt.
pub fn slide_block(slide: &SlideRecord, total: usize) -> String {
    let mut block = String::new();
    let _ = writeln!(block, "### Slide {} of {}", slide.index, total);
    let text = slide.text.trim();
    let _ = writeln!(block, "Text:\n{}", if text.is_empty() { "(no text)" } else { text });

    let descriptions = slide.image_descriptions();
    if !descriptions.is_empty() {
        block.push_str("Image descriptions:\n");
        for description in descriptions {
            let _ = writeln!(block, "- {}", description.trim());
        }
    }
    block
}

/// Deck-wide context shared by every generation prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    /// Compressed whole-document summary.
    pub summary: &'a str,
    /// Language the narration is written in, e.g. "Korean".
    pub language: &'a str,
    pub window: &'a ContinuityWindow,
}

fn context_section(prompt: &mut String, context: &PromptContext<'_>) {
    let _ = writeln!(prompt, "{}\n", ROLE_INTRO);
    let _ = writeln!(
        prompt,
        "Write all narration in {}, whatever the language of the slides.\n",
        context.language
    );
    let _ = writeln!(prompt, "Document summary (reference only):\n{}\n", context.summary);
    let _ = writeln!(
        prompt,
        "Narration already delivered (reference only, continue its flow):\n{}\n",
        context.window.render()
    );
}

/// Prompt asking for one narration segment per slide of `chunk`.
pub fn chunk_prompt(context: &PromptContext<'_>, chunk: &Chunk<'_>, total: usize) -> String {
    let mut prompt = String::new();
    context_section(&mut prompt, context);

    let _ = writeln!(
        prompt,
        "Slides to narrate now ({} of the {} slides in the deck):\n",
        chunk.len(),
        total
    );
    for slide in chunk.slides {
        let _ = writeln!(prompt, "{}", slide_block(slide, total));
    }

    let delimiters = chunk
        .slides
        .iter()
        .map(|s| delimiter(s.index))
        .collect::<Vec<_>>()
        .join(", ");

    prompt.push_str("Rules:\n");
    let _ = writeln!(
        prompt,
        "- Write exactly {} narration segments, one per slide, in slide order.",
        chunk.len()
    );
    let _ = writeln!(
        prompt,
        "- Start each segment with its delimiter alone on a line: {}.",
        delimiters
    );
    prompt.push_str(
        "- Build each segment mainly on that slide's own text; the summary and earlier narration are context only.\n",
    );
    if chunk.contains(1) {
        prompt.push_str("- Greet the audience in the segment for slide 1 only; no other segment may contain a greeting.\n");
    } else {
        prompt.push_str("- Do not greet the audience; the presentation is already under way.\n");
    }
    if chunk.role.allows_closing() {
        let _ = writeln!(
            prompt,
            "- This part ends the presentation. Closing remarks are allowed only in the segment for slide {}.",
            chunk.end_index
        );
    } else {
        let _ = writeln!(prompt, "- This part does not end the presentation. {}", TERMINAL_LANGUAGE_BAN);
    }
    prompt.push_str("- Never mention or anticipate content from a later slide.\n");
    prompt.push_str("- Output only the delimiters and the narration.\n");
    prompt
}

/// Prompt asking for the narration of a single slide.
pub fn slide_prompt(
    context: &PromptContext<'_>,
    slide: &SlideRecord,
    role: ChunkRole,
    total: usize,
) -> String {
    let mut prompt = String::new();
    context_section(&mut prompt, context);

    let _ = writeln!(prompt, "Slide to narrate now:\n\n{}", slide_block(slide, total));

    prompt.push_str("Rules:\n");
    prompt.push_str("- Explain this slide on your own, centred on its text, in 3 to 5 clear sentences.\n");
    if slide.index == 1 {
        prompt.push_str("- This is the first slide: open with a short greeting.\n");
    } else {
        prompt.push_str("- Do not greet the audience; the presentation is already under way.\n");
    }
    if role.allows_closing() {
        prompt.push_str("- This is the last slide: you may close the presentation.\n");
    } else {
        let _ = writeln!(prompt, "- {}", TERMINAL_LANGUAGE_BAN);
    }
    prompt.push_str("- Never mention or anticipate content from a later slide.\n");
    prompt.push_str("- Output only the narration, without a slide label.\n");
    prompt
}
