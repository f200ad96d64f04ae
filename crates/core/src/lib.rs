//! Core of the slide-to-narration pipeline: relevance decisions, chunked
//! script synthesis with a continuity window, emphasis ranking and SSML
//! compilation.

pub mod config;
pub mod describe;
pub mod emphasis;
pub mod error;
pub mod markup;
pub mod normalize;
pub mod oracle;
pub mod pipeline;
pub mod planner;
pub mod prompt;
pub mod relevance;
pub mod speech;
pub mod synth;
pub mod types;
pub mod window;

pub use config::{GenerationMode, MismatchPolicy, PipelineConfig, RetryPolicy};
pub use emphasis::{EmphasisSelector, EmphasisSet};
pub use error::{Error, OracleError, Result};
pub use markup::MarkupCompiler;
pub use normalize::TextNormalizer;
pub use oracle::{
    DescriptionContext, EmbeddingOracle, ImageDescriptionOracle, ImageLabel, SpeechOracle,
    TextGenerationOracle, VisionClassifierOracle,
};
pub use pipeline::{DeckDecomposer, NarrationPipeline, Oracles};
pub use relevance::RelevanceClassifier;
pub use synth::ScriptSynthesizer;
pub use types::{
    Chunk, ChunkRole, Deck, DeckFormat, ImageAsset, NarrationOutput, NarrationRecord,
    NarrationResult, PageSize, PipelineWarning, Rect, SlideRecord, SlideText, WarningKind,
};
pub use window::ContinuityWindow;
