//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::normalize::DEFAULT_SUMMARY_MAX_CHARS;
use crate::{Error, Result};

/// Narration language used unless configured otherwise.
pub const DEFAULT_LANGUAGE: &str = "Korean";

/// How narration is batched into oracle calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// One call per chunk of slides.
    #[default]
    Chunked,
    /// One call per slide.
    PerSlide,
}

/// What to do when a chunk comes back with the wrong number of segments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Keep what arrived and pad missing slides with a placeholder.
    #[default]
    Pad,
    /// Send the chunk again before padding.
    Reissue,
}

/// Bounded retry for oracle calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: usize,
    /// Base delay, doubled on every retry.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits; useful with in-process oracles.
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            backoff_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.saturating_sub(1).min(5) as u32;
        Duration::from_millis(self.backoff_ms.saturating_mul(1 << capped))
    }
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Slides per generation call in chunked mode.
    pub chunk_size: usize,
    /// Size of the emphasis set.
    pub top_k: usize,
    /// Narrations remembered across generation calls.
    pub window_size: usize,
    pub mode: GenerationMode,
    /// Page image ratio at or above which images are relevant without asking.
    pub area_threshold: f64,
    /// Character budget for the compressed summary.
    pub summary_max_chars: usize,
    pub mismatch_policy: MismatchPolicy,
    /// Extra calls allowed by [`MismatchPolicy::Reissue`].
    pub reissue_attempts: usize,
    /// Ask for descriptions of relevant images.
    pub describe_images: bool,
    /// Language the narration is written in. Keep it in step with the
    /// speech voice, which defaults to Korean.
    pub language: String,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5,
            top_k: 10,
            window_size: 2,
            mode: GenerationMode::Chunked,
            area_threshold: 0.5,
            summary_max_chars: DEFAULT_SUMMARY_MAX_CHARS,
            mismatch_policy: MismatchPolicy::Pad,
            reissue_attempts: 1,
            describe_images: true,
            language: DEFAULT_LANGUAGE.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of slides per chunk (at least 1).
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    pub fn with_mode(mut self, mode: GenerationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_mismatch_policy(mut self, policy: MismatchPolicy) -> Self {
        self.mismatch_policy = policy;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_describe_images(mut self, describe: bool) -> Self {
        self.describe_images = describe;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.language.trim().is_empty() {
            return Err(Error::InvalidConfig("language must not be empty".to_string()));
        }
        if !self.area_threshold.is_finite() || self.area_threshold < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "area_threshold must be a non-negative number, got {}",
                self.area_threshold
            )));
        }
        Ok(())
    }
}
