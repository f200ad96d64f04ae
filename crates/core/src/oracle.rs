//! Capability interfaces for the external models the pipeline calls.
//!
//! Every oracle is a blocking call. Implementations are expected to enforce
//! their own deadline and report it as [`OracleError::Timeout`]; the pipeline
//! wraps each call in [`call_with_retry`].

use serde::{Deserialize, Serialize};
use std::thread;

use crate::config::RetryPolicy;
use crate::{Error, OracleError, Result};

/// Label returned by the image classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageLabel {
    ChartOrGraph,
    Other,
}

impl ImageLabel {
    /// Parse a free-text classifier answer.
    pub fn parse(answer: &str) -> Option<Self> {
        let answer = answer
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '`')
            .to_lowercase();
        // "1. chart/graph" echoes the numbered option list
        let answer = answer.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ' ');
        match answer {
            "chart/graph" | "chart" | "graph" | "chart or graph" | "그래프/도표" => {
                Some(Self::ChartOrGraph)
            }
            "other" | "그외" => Some(Self::Other),
            _ => None,
        }
    }

    /// Wire name used in prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageLabel::ChartOrGraph => "chart/graph",
            ImageLabel::Other => "other",
        }
    }
}

/// Produces narration text from a prompt.
pub trait TextGenerationOracle: Send + Sync {
    fn generate(&self, prompt: &str) -> std::result::Result<String, OracleError>;
}

/// Decides whether an image is a chart or graph.
pub trait VisionClassifierOracle: Send + Sync {
    fn classify(&self, image: &[u8], mime_type: &str) -> std::result::Result<ImageLabel, OracleError>;
}

/// Context handed to an image describer.
#[derive(Debug, Clone, Copy)]
pub struct DescriptionContext<'a> {
    pub summary: &'a str,
    pub slide_text: &'a str,
    pub mime_type: &'a str,
}

/// Writes a spoken-style description of an image.
pub trait ImageDescriptionOracle: Send + Sync {
    fn describe(
        &self,
        image: &[u8],
        context: DescriptionContext<'_>,
    ) -> std::result::Result<String, OracleError>;
}

/// Maps text to a dense vector.
pub trait EmbeddingOracle: Send + Sync {
    fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, OracleError>;

    /// Embed several texts at once, one vector per text in input order.
    ///
    /// Defaults to one [`embed`](Self::embed) call per text.
    fn embed_many(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, OracleError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Renders speech markup to audio.
pub trait SpeechOracle: Send + Sync {
    fn synthesize(&self, markup: &str) -> std::result::Result<Vec<u8>, OracleError>;
}

/// Run `call` until it succeeds, fails permanently, or the policy runs out.
///
/// A run that ends on a timeout becomes [`Error::OracleTimeout`]; any other
/// final failure becomes [`Error::Oracle`].
pub fn call_with_retry<T, F>(policy: &RetryPolicy, what: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> std::result::Result<T, OracleError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                log::debug!(
                    "{} failed (attempt {}/{}): {}, retrying",
                    what,
                    attempt,
                    max_attempts,
                    err
                );
                let delay = policy.backoff(attempt);
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
            Err(OracleError::Timeout) => return Err(Error::OracleTimeout { attempts: attempt }),
            Err(err) => return Err(Error::Oracle(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_parse_labels() {
        assert_eq!(ImageLabel::parse("chart/graph"), Some(ImageLabel::ChartOrGraph));
        assert_eq!(ImageLabel::parse(" Chart/Graph.\n"), Some(ImageLabel::ChartOrGraph));
        assert_eq!(ImageLabel::parse("\"other\""), Some(ImageLabel::Other));
        assert_eq!(ImageLabel::parse("1. chart/graph"), Some(ImageLabel::ChartOrGraph));
        assert_eq!(ImageLabel::parse("a photo of a cat"), None);
    }

    #[test]
    fn test_retry_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = call_with_retry(&RetryPolicy::immediate(3), "test", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(OracleError::Unavailable("busy".into()))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_retry_exhausted_on_timeout() {
        let calls = Cell::new(0);
        let result: Result<()> = call_with_retry(&RetryPolicy::immediate(2), "test", || {
            calls.set(calls.get() + 1);
            Err(OracleError::Timeout)
        });
        assert!(matches!(result, Err(Error::OracleTimeout { attempts: 2 })));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_no_retry_on_rejection() {
        let calls = Cell::new(0);
        let result: Result<()> = call_with_retry(&RetryPolicy::immediate(5), "test", || {
            calls.set(calls.get() + 1);
            Err(OracleError::Rejected("bad key".into()))
        });
        assert!(matches!(result, Err(Error::Oracle(OracleError::Rejected(_)))));
        assert_eq!(calls.get(), 1);
    }
}
