//! Google Cloud Text-to-Speech over its REST API.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use deck_core::{OracleError, SpeechOracle};
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;

use crate::config::SpeechConfig;
use crate::error::{map_status, map_transport, ClientError};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    ssml: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
}

/// Speech oracle returning LINEAR16 WAV audio.
pub struct GoogleSpeech {
    client: Client,
    config: SpeechConfig,
    api_key: String,
}

impl GoogleSpeech {
    pub fn new(config: SpeechConfig) -> Result<Self, ClientError> {
        let api_key = config.require_key()?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        log::debug!("TTS voice {} ({})", config.voice_name, config.language_code);
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn request<'a>(&'a self, ssml: &'a str) -> SynthesizeRequest<'a> {
        SynthesizeRequest {
            input: SynthesisInput { ssml },
            voice: VoiceSelection {
                language_code: &self.config.language_code,
                name: &self.config.voice_name,
            },
            audio_config: AudioConfig {
                audio_encoding: "LINEAR16",
            },
        }
    }
}

impl SpeechOracle for GoogleSpeech {
    fn synthesize(&self, markup: &str) -> Result<Vec<u8>, OracleError> {
        let url = format!("{}/text:synthesize", self.config.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request(markup))
            .send()
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(map_status(status, &text));
        }
        let reply: Value = response.json().map_err(map_transport)?;
        decode_audio(&reply)
    }
}

fn decode_audio(reply: &Value) -> Result<Vec<u8>, OracleError> {
    let content = reply["audioContent"]
        .as_str()
        .ok_or_else(|| OracleError::InvalidResponse("no audioContent in response".into()))?;
    STANDARD
        .decode(content)
        .map_err(|e| OracleError::InvalidResponse(format!("bad audioContent: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let speech = GoogleSpeech::new(SpeechConfig::default().with_api_key("k")).unwrap();
        let body = serde_json::to_value(speech.request("<speak>hi</speak>")).unwrap();

        assert_eq!(body["input"]["ssml"], "<speak>hi</speak>");
        assert_eq!(body["voice"]["languageCode"], "ko-KR");
        assert_eq!(body["voice"]["name"], "ko-KR-Wavenet-A");
        assert_eq!(body["audioConfig"]["audioEncoding"], "LINEAR16");
    }

    #[test]
    fn test_decode_audio() {
        assert_eq!(decode_audio(&json!({"audioContent": "UklGRg=="})).unwrap(), b"RIFF".to_vec());
        assert!(decode_audio(&json!({})).is_err());
        assert!(decode_audio(&json!({"audioContent": "***"})).is_err());
    }
}
