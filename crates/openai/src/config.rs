//! Endpoint, model and credential settings for the HTTP oracles.

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const GOOGLE_TTS_API_KEY_ENV: &str = "GOOGLE_TTS_API_KEY";

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TTS_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1";

/// Settings for an OpenAI-compatible endpoint.
///
/// The API key is never read from or written to config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub vision_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            temperature: 0.3,
            max_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

impl OpenAiConfig {
    /// Take the API key, and the base URL if set, from the environment.
    pub fn apply_env(mut self) -> Self {
        if let Ok(key) = std::env::var(OPENAI_API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var(OPENAI_BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub(crate) fn require_key(&self) -> Result<&str, ClientError> {
        self.api_key
            .as_deref()
            .ok_or(ClientError::MissingCredential(OPENAI_API_KEY_ENV))
    }

    /// Join `path` onto the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Settings for Google Cloud Text-to-Speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub endpoint: String,
    pub language_code: String,
    pub voice_name: String,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_TTS_ENDPOINT.to_string(),
            language_code: "ko-KR".to_string(),
            voice_name: "ko-KR-Wavenet-A".to_string(),
            timeout_secs: 60,
        }
    }
}

impl SpeechConfig {
    /// Take the API key from the environment.
    pub fn apply_env(mut self) -> Self {
        if let Ok(key) = std::env::var(GOOGLE_TTS_API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub(crate) fn require_key(&self) -> Result<&str, ClientError> {
        self.api_key
            .as_deref()
            .ok_or(ClientError::MissingCredential(GOOGLE_TTS_API_KEY_ENV))
    }
}
