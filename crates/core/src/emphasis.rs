//! Choosing which narration words get vocal emphasis.
//!
//! Every distinct word of the narration is embedded, scored by its best
//! cosine similarity to any user keyword, and the top `k` are kept.

use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::config::RetryPolicy;
use crate::oracle::{call_with_retry, EmbeddingOracle};
use crate::types::{PipelineWarning, WarningKind};
use crate::OracleError;

/// Word boundary used for candidate extraction.
static WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

/// Default number of emphasized words.
pub const DEFAULT_TOP_K: usize = 10;

/// Texts per batched embedding request.
pub const EMBEDDING_BATCH_SIZE: usize = 256;

/// An embedding, or the reason it could not be produced.
type Embedded = std::result::Result<Vec<f32>, String>;

/// Ranked set of distinct words to emphasize, best first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmphasisSet {
    words: Vec<String>,
}

impl EmphasisSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.words
    }
}

impl<S: Into<String>> FromIterator<S> for EmphasisSet {
    /// Collect distinct words, keeping first occurrences in order.
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut words: Vec<String> = Vec::new();
        for word in iter {
            let word = word.into();
            if !words.contains(&word) {
                words.push(word);
            }
        }
        Self { words }
    }
}

/// Distinct words of `text`, in lexicographic order.
pub fn candidate_words(text: &str) -> Vec<String> {
    WORD_REGEX
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Cosine similarity, or `None` for mismatched or zero-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some(dot / denom)
}

/// Emphasis words plus any embedding failures met while choosing them.
#[derive(Debug, Clone, Default)]
pub struct EmphasisSelection {
    pub set: EmphasisSet,
    pub warnings: Vec<PipelineWarning>,
}

/// Ranks narration vocabulary against user keywords.
pub struct EmphasisSelector<'a> {
    oracle: &'a dyn EmbeddingOracle,
    retry: RetryPolicy,
}

impl<'a> EmphasisSelector<'a> {
    pub fn new(oracle: &'a dyn EmbeddingOracle) -> Self {
        Self {
            oracle,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Embed `texts` in batches, keeping input order.
    fn embed_all(&self, texts: &[String]) -> Vec<Embedded> {
        texts
            .par_chunks(EMBEDDING_BATCH_SIZE)
            .flat_map_iter(|batch| self.embed_batch(batch))
            .collect()
    }

    /// One batched call; a failed batch falls back to one call per text so
    /// a single bad word cannot sink its neighbours.
    fn embed_batch(&self, batch: &[String]) -> Vec<Embedded> {
        let batched = call_with_retry(&self.retry, "batched embedding", || {
            let vectors = self.oracle.embed_many(batch)?;
            if vectors.len() == batch.len() {
                Ok(vectors)
            } else {
                Err(OracleError::InvalidResponse(format!(
                    "{} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )))
            }
        });

        match batched {
            Ok(vectors) => vectors.into_iter().map(Ok).collect(),
            Err(err) if batch.len() == 1 => vec![Err(err.to_string())],
            Err(err) => {
                log::debug!("batched embedding failed ({}), embedding one text at a time", err);
                batch
                    .par_iter()
                    .map(|text| {
                        call_with_retry(&self.retry, "embedding", || self.oracle.embed(text))
                            .map_err(|e| e.to_string())
                    })
                    .collect()
            }
        }
    }

    /// Pick at most `top_k` words of `text` closest to any of `keywords`.
    ///
    /// Ties keep lexicographic order. Words or keywords whose embedding
    /// fails are left out.
    pub fn select(&self, text: &str, keywords: &[String], top_k: usize) -> EmphasisSelection {
        let mut selection = EmphasisSelection::default();

        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        let candidates = candidate_words(text);
        if keywords.is_empty() || candidates.is_empty() || top_k == 0 {
            return selection;
        }

        let keyword_vectors: Vec<Vec<f32>> = self
            .embed_all(&keywords)
            .into_iter()
            .zip(&keywords)
            .filter_map(|(result, keyword)| match result {
                Ok(vector) => Some(vector),
                Err(err) => {
                    log::warn!("ignoring keyword '{}': {}", keyword, err);
                    selection.warnings.push(PipelineWarning::new(
                        WarningKind::Embedding,
                        None,
                        format!("keyword '{}': {}", keyword, err),
                    ));
                    None
                }
            })
            .collect();
        if keyword_vectors.is_empty() {
            return selection;
        }

        let mut failed = 0usize;
        let mut first_failure = None;
        let mut scored: Vec<(String, f64)> = Vec::with_capacity(candidates.len());
        for (word, result) in candidates.iter().zip(self.embed_all(&candidates)) {
            match result {
                Ok(vector) => {
                    let score = keyword_vectors
                        .iter()
                        .filter_map(|k| cosine_similarity(&vector, k))
                        .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))))
                        .unwrap_or(0.0);
                    scored.push((word.clone(), score));
                }
                Err(err) => {
                    failed += 1;
                    first_failure.get_or_insert_with(|| format!("'{}': {}", word, err));
                }
            }
        }
        if let Some(first) = first_failure {
            log::warn!("embedding failed for {} candidate word(s), first {}", failed, first);
            selection.warnings.push(PipelineWarning::new(
                WarningKind::Embedding,
                None,
                format!("embedding failed for {} candidate word(s), first {}", failed, first),
            ));
        }

        // stable: equal scores keep lexicographic order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        selection.set = scored.into_iter().take(top_k).map(|(word, _)| word).collect();
        log::debug!("emphasis words: {:?}", selection.set);
        selection
    }
}
