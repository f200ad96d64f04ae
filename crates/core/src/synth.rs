//! Narration script synthesis.
//!
//! Each unit of work (a chunk of slides, or a single slide in per-slide mode)
//! goes through the same steps: build a prompt from the slides and the
//! continuity window, call the oracle, validate the segment count, recover
//! from a mismatch if needed, and commit the accepted narration to the
//! window before the next unit starts.

use std::collections::{HashMap, HashSet};

use crate::config::{GenerationMode, MismatchPolicy, PipelineConfig, RetryPolicy};
use crate::normalize::compress_summary;
use crate::oracle::{call_with_retry, TextGenerationOracle};
use crate::planner::plan;
use crate::prompt::{self, PromptContext, Segment};
use crate::types::{Chunk, NarrationResult, PipelineWarning, SlideRecord, WarningKind};
use crate::window::ContinuityWindow;
use crate::Error;

/// Narration for a whole deck plus the problems met on the way.
#[derive(Debug, Clone, Default)]
pub struct SynthesisOutcome {
    /// One result per slide, in slide order.
    pub narrations: Vec<NarrationResult>,
    pub warnings: Vec<PipelineWarning>,
}

/// Result of checking a response against its unit.
#[derive(Debug)]
enum Validation {
    Accept(Vec<Segment>),
    Mismatch(Vec<Segment>, Error),
}

/// How a response is cut into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentFormat {
    Delimited,
    Whole,
}

/// Stateful script writer for one pipeline run.
pub struct ScriptSynthesizer<'a> {
    oracle: &'a dyn TextGenerationOracle,
    summary: String,
    language: String,
    window: ContinuityWindow,
    mode: GenerationMode,
    chunk_size: usize,
    mismatch_policy: MismatchPolicy,
    reissue_attempts: usize,
    retry: RetryPolicy,
}

impl<'a> ScriptSynthesizer<'a> {
    /// Create a synthesizer; the summary is compressed once here.
    pub fn new(oracle: &'a dyn TextGenerationOracle, summary: &str, config: &PipelineConfig) -> Self {
        Self {
            oracle,
            summary: compress_summary(summary, config.summary_max_chars),
            language: config.language.clone(),
            window: ContinuityWindow::new(config.window_size),
            mode: config.mode,
            chunk_size: config.chunk_size.max(1),
            mismatch_policy: config.mismatch_policy,
            reissue_attempts: config.reissue_attempts,
            retry: config.retry,
        }
    }

    pub fn window(&self) -> &ContinuityWindow {
        &self.window
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    fn prompt_context(&self) -> PromptContext<'_> {
        PromptContext {
            summary: &self.summary,
            language: &self.language,
            window: &self.window,
        }
    }

    /// Narrate every slide using the configured mode.
    pub fn synthesize(&mut self, slides: &[SlideRecord]) -> SynthesisOutcome {
        match self.mode {
            GenerationMode::Chunked => self.synthesize_chunked(slides),
            GenerationMode::PerSlide => self.synthesize_per_slide(slides),
        }
    }

    /// One oracle call per chunk of `chunk_size` slides.
    pub fn synthesize_chunked(&mut self, slides: &[SlideRecord]) -> SynthesisOutcome {
        let total = slides.len();
        let chunks = plan(slides, self.chunk_size);
        log::info!("narrating {} slides in {} chunks", total, chunks.len());

        let mut outcome = SynthesisOutcome::default();
        for chunk in &chunks {
            let prompt = prompt::chunk_prompt(&self.prompt_context(), chunk, total);
            self.run_unit(chunk, &prompt, SegmentFormat::Delimited, &mut outcome);
        }
        outcome
    }

    /// One oracle call per slide, sharing the same window.
    pub fn synthesize_per_slide(&mut self, slides: &[SlideRecord]) -> SynthesisOutcome {
        let total = slides.len();
        let units = plan(slides, 1);
        log::info!("narrating {} slides one at a time", total);

        let mut outcome = SynthesisOutcome::default();
        for unit in &units {
            let slide = &unit.slides[0];
            let prompt = prompt::slide_prompt(&self.prompt_context(), slide, unit.role, total);
            self.run_unit(unit, &prompt, SegmentFormat::Whole, &mut outcome);
        }
        outcome
    }

    /// Generate, validate, recover and commit one unit.
    fn run_unit(
        &mut self,
        unit: &Chunk<'_>,
        prompt: &str,
        format: SegmentFormat,
        outcome: &mut SynthesisOutcome,
    ) {
        let mut reissues_left = match self.mismatch_policy {
            MismatchPolicy::Pad => 0,
            MismatchPolicy::Reissue => self.reissue_attempts,
        };
        let mut last_segments: Option<Vec<Segment>> = None;

        let results = loop {
            log::debug!(
                "generating slides {}..={} ({:?})",
                unit.start_index,
                unit.end_index,
                unit.role
            );
            let response = call_with_retry(&self.retry, "narration generation", || {
                self.oracle.generate(prompt)
            });

            let response = match response {
                Ok(response) => response,
                Err(err) => {
                    outcome.warnings.push(PipelineWarning::from_error(
                        WarningKind::Generation,
                        Some(unit.start_index),
                        &err,
                    ));
                    break align(unit, last_segments.unwrap_or_default());
                }
            };

            match validate(unit, parse(&response, format)) {
                Validation::Accept(segments) => break align(unit, segments),
                Validation::Mismatch(segments, err) => {
                    outcome.warnings.push(PipelineWarning::from_error(
                        WarningKind::GenerationMismatch,
                        Some(unit.start_index),
                        &err,
                    ));
                    if reissues_left > 0 {
                        reissues_left -= 1;
                        log::info!("reissuing chunk {} after mismatch", unit.number);
                        last_segments = Some(segments);
                        continue;
                    }
                    break align(unit, segments);
                }
            }
        };

        self.window.extend(
            results
                .iter()
                .filter(|r| !r.recovered)
                .map(|r| r.text.clone()),
        );
        outcome.narrations.extend(results);
    }
}

fn parse(response: &str, format: SegmentFormat) -> Vec<Segment> {
    match format {
        SegmentFormat::Delimited => prompt::split_segments(response),
        SegmentFormat::Whole => prompt::slide_segments(response),
    }
}

fn validate(unit: &Chunk<'_>, segments: Vec<Segment>) -> Validation {
    if segments.len() == unit.len() {
        Validation::Accept(segments)
    } else {
        let err = Error::GenerationMismatch {
            chunk: unit.number,
            expected: unit.len(),
            actual: segments.len(),
        };
        Validation::Mismatch(segments, err)
    }
}

/// Attach segments to the slides of `unit`, padding any slide left over.
///
/// Segments go by their delimiter number when every number is distinct and
/// inside the unit; otherwise they are zipped onto the leading slides.
/// Surplus segments are dropped.
fn align(unit: &Chunk<'_>, segments: Vec<Segment>) -> Vec<NarrationResult> {
    let mut seen = HashSet::new();
    let numbered = !segments.is_empty()
        && segments.iter().all(|s| {
            s.number
                .is_some_and(|n| unit.contains(n) && seen.insert(n))
        });

    let mut by_slide: HashMap<usize, String> = HashMap::new();
    if numbered {
        for segment in segments {
            if let Some(n) = segment.number {
                by_slide.insert(n, segment.text);
            }
        }
    } else {
        if segments.len() > unit.len() {
            log::warn!(
                "chunk {}: dropping {} surplus segment(s)",
                unit.number,
                segments.len() - unit.len()
            );
        }
        for (slide, segment) in unit.slides.iter().zip(segments) {
            by_slide.insert(slide.index, segment.text);
        }
    }

    unit.slides
        .iter()
        .map(|slide| match by_slide.remove(&slide.index) {
            Some(text) => NarrationResult::new(slide.index, text),
            None => {
                log::warn!("slide {}: no narration returned, using placeholder", slide.index);
                placeholder(slide)
            }
        })
        .collect()
}

/// Stand-in narration: the slide's own text, read flat.
fn placeholder(slide: &SlideRecord) -> NarrationResult {
    let text = slide.text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        NarrationResult::placeholder(slide.index, format!("Slide {}.", slide.index))
    } else {
        NarrationResult::placeholder(slide.index, text)
    }
}
