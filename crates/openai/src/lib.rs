//! HTTP oracle clients for the narration pipeline.
//!
//! [`OpenAiClient`] talks to any OpenAI-compatible endpoint and serves text
//! generation, chart classification, image description and embeddings.
//! [`GoogleSpeech`] voices SSML through Google Cloud Text-to-Speech.
//!
//! Both use blocking requests with a per-request timeout; a timeout maps to
//! [`deck_core::OracleError::Timeout`] so the pipeline's retry policy
//! applies.

pub mod config;
pub mod error;
pub mod openai;
pub mod tts;

pub use config::{OpenAiConfig, SpeechConfig};
pub use error::ClientError;
pub use openai::OpenAiClient;
pub use tts::GoogleSpeech;
