//! The end-to-end narration run.
//!
//! A [`NarrationPipeline`] borrows its oracles for the length of a run; it
//! holds no global state, and every call to [`NarrationPipeline::process`]
//! gets a fresh continuity window.

use std::collections::BTreeMap;

use crate::config::PipelineConfig;
use crate::describe::ImageDescriber;
use crate::emphasis::EmphasisSelector;
use crate::markup::MarkupCompiler;
use crate::normalize::compress_summary;
use crate::oracle::{
    EmbeddingOracle, ImageDescriptionOracle, SpeechOracle, TextGenerationOracle,
    VisionClassifierOracle,
};
use crate::relevance::RelevanceClassifier;
use crate::speech::{synthesize_markup, SpeechOutput};
use crate::synth::ScriptSynthesizer;
use crate::types::{Deck, NarrationOutput, NarrationRecord};
use crate::Result;

/// Turns raw deck bytes into slide records.
pub trait DeckDecomposer {
    /// Decompose a deck. Only an unopenable deck is an error; unreadable
    /// pages come back as empty slides with a warning.
    fn decompose(&self, document: &[u8]) -> Result<Deck>;
}

/// The oracles a run talks to.
#[derive(Clone, Copy)]
pub struct Oracles<'a> {
    pub generator: &'a dyn TextGenerationOracle,
    pub classifier: &'a dyn VisionClassifierOracle,
    /// Without a describer, relevant images are flagged but not described.
    pub describer: Option<&'a dyn ImageDescriptionOracle>,
    pub embedder: &'a dyn EmbeddingOracle,
}

/// Run-scoped narration pipeline.
pub struct NarrationPipeline<'a> {
    oracles: Oracles<'a>,
    config: PipelineConfig,
    compiler: MarkupCompiler,
}

impl<'a> NarrationPipeline<'a> {
    /// Create a pipeline, rejecting unusable configuration.
    pub fn new(oracles: Oracles<'a>, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            oracles,
            config,
            compiler: MarkupCompiler::new(),
        })
    }

    pub fn with_compiler(mut self, compiler: MarkupCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Decompose `document` and narrate it.
    pub fn process_document(
        &self,
        decomposer: &dyn DeckDecomposer,
        document: &[u8],
        summary: &str,
        keywords: &[String],
    ) -> Result<NarrationOutput> {
        let deck = decomposer.decompose(document)?;
        Ok(self.process(deck, summary, keywords))
    }

    /// Narrate a decomposed deck.
    ///
    /// Never fails: every problem after decomposition is contained and
    /// reported in `warnings`.
    pub fn process(&self, deck: Deck, summary: &str, keywords: &[String]) -> NarrationOutput {
        let Deck {
            mut slides,
            mut warnings,
        } = deck;
        let retry = self.config.retry;
        log::info!("processing deck with {} slides", slides.len());

        let classifier = RelevanceClassifier::new(self.oracles.classifier)
            .with_threshold(self.config.area_threshold)
            .with_retry(retry);
        warnings.extend(classifier.classify_all(&mut slides));

        if self.config.describe_images {
            if let Some(oracle) = self.oracles.describer {
                let summary = compress_summary(summary, self.config.summary_max_chars);
                let describer = ImageDescriber::new(oracle).with_retry(retry);
                warnings.extend(describer.describe_all(&mut slides, &summary));
            }
        }

        let mut synthesizer = ScriptSynthesizer::new(self.oracles.generator, summary, &self.config);
        let synthesis = synthesizer.synthesize(&slides);
        warnings.extend(synthesis.warnings);

        let full_script = synthesis
            .narrations
            .iter()
            .map(|n| n.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let selection = EmphasisSelector::new(self.oracles.embedder)
            .with_retry(retry)
            .select(&full_script, keywords, self.config.top_k);
        warnings.extend(selection.warnings);

        let mut markup = BTreeMap::new();
        let mut narrations = Vec::with_capacity(slides.len());
        for (slide, narration) in slides.iter().zip(synthesis.narrations) {
            markup.insert(slide.index, self.compiler.compile(&narration.text, &selection.set));
            narrations.push(NarrationRecord {
                page: slide.index,
                text: slide.text.clone(),
                narration: narration.text,
                recovered: narration.recovered,
            });
        }

        if !warnings.is_empty() {
            log::warn!("deck completed with {} warning(s)", warnings.len());
        }

        NarrationOutput {
            narrations,
            markup,
            emphasis: selection.set.into_vec(),
            warnings,
        }
    }

    /// Voice the markup of a finished run.
    pub fn synthesize_speech(&self, oracle: &dyn SpeechOracle, output: &NarrationOutput) -> SpeechOutput {
        synthesize_markup(oracle, &output.markup, &self.config.retry)
    }
}
