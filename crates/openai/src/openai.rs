//! OpenAI-compatible chat, vision and embedding client.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use deck_core::{
    DescriptionContext, EmbeddingOracle, ImageDescriptionOracle, ImageLabel, OracleError,
    TextGenerationOracle, VisionClassifierOracle,
};
use reqwest::blocking::Client;
use serde_json::{json, Value};

use crate::config::OpenAiConfig;
use crate::error::{map_status, map_transport, ClientError};

const NARRATOR_SYSTEM: &str = "You write spoken presentation scripts. Reply with the narration only.";

const CLASSIFIER_SYSTEM: &str = "You are an image classification agent.";

const CLASSIFIER_PROMPT: &str = "Classify the image as exactly one of:\n\
1. chart/graph\n\
2. other\n\
Reply with only the label.";

const DESCRIBER_SYSTEM: &str =
    "You describe presentation images for a narrator who cannot show them.";

/// Blocking client for an OpenAI-compatible API.
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
    api_key: String,
}

impl OpenAiClient {
    /// Build a client; fails when no API key is configured.
    pub fn new(config: OpenAiConfig) -> Result<Self, ClientError> {
        let api_key = config.require_key()?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        log::debug!(
            "OpenAI client for {} (chat {}, embeddings {})",
            config.base_url,
            config.chat_model,
            config.embedding_model
        );
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value, OracleError> {
        let response = self
            .client
            .post(self.config.endpoint(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(map_status(status, &text));
        }
        response.json::<Value>().map_err(map_transport)
    }

    fn chat(&self, model: &str, messages: Value) -> Result<String, OracleError> {
        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });
        let reply = self.post("chat/completions", &body)?;
        parse_chat_content(&reply)
    }
}

impl TextGenerationOracle for OpenAiClient {
    fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        self.chat(
            &self.config.chat_model,
            json!([
                {"role": "system", "content": NARRATOR_SYSTEM},
                {"role": "user", "content": prompt},
            ]),
        )
    }
}

impl VisionClassifierOracle for OpenAiClient {
    fn classify(&self, image: &[u8], mime_type: &str) -> Result<ImageLabel, OracleError> {
        let answer = self.chat(
            &self.config.vision_model,
            json!([
                {"role": "system", "content": CLASSIFIER_SYSTEM},
                {"role": "user", "content": [
                    {"type": "text", "text": CLASSIFIER_PROMPT},
                    {"type": "image_url", "image_url": {"url": data_url(image, mime_type)}},
                ]},
            ]),
        )?;
        ImageLabel::parse(&answer)
            .ok_or_else(|| OracleError::InvalidResponse(format!("unknown label {:?}", answer)))
    }
}

impl ImageDescriptionOracle for OpenAiClient {
    fn describe(&self, image: &[u8], context: DescriptionContext<'_>) -> Result<String, OracleError> {
        let description = self.chat(
            &self.config.vision_model,
            json!([
                {"role": "system", "content": DESCRIBER_SYSTEM},
                {"role": "user", "content": [
                    {"type": "text", "text": description_prompt(context)},
                    {"type": "image_url", "image_url": {"url": data_url(image, context.mime_type)}},
                ]},
            ]),
        )?;
        Ok(description.trim().to_string())
    }
}

impl EmbeddingOracle for OpenAiClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>, OracleError> {
        let body = json!({
            "model": self.config.embedding_model,
            "input": text,
        });
        let reply = self.post("embeddings", &body)?;
        parse_embedding(&reply)
    }

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OracleError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({
            "model": self.config.embedding_model,
            "input": texts,
        });
        let reply = self.post("embeddings", &body)?;
        parse_embeddings(&reply, texts.len())
    }
}

fn data_url(image: &[u8], mime_type: &str) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(image))
}

fn description_prompt(context: DescriptionContext<'_>) -> String {
    let slide_text = if context.slide_text.trim().is_empty() {
        "(no text)"
    } else {
        context.slide_text
    };
    format!(
        "Describe this image in two or three spoken sentences a presenter could read aloud. \
Focus on what the data shows, not on colors or layout.\n\n\
Document summary (reference only):\n{}\n\n\
Text on the same slide:\n{}",
        context.summary, slide_text
    )
}

/// First choice's message content from a chat completion.
fn parse_chat_content(reply: &Value) -> Result<String, OracleError> {
    reply["choices"]
        .get(0)
        .and_then(|choice| choice["message"]["content"].as_str())
        .map(str::to_string)
        .ok_or_else(|| OracleError::InvalidResponse("no message content in choices".into()))
}

/// First vector from an embeddings response.
fn parse_embedding(reply: &Value) -> Result<Vec<f32>, OracleError> {
    let item = reply["data"]
        .get(0)
        .ok_or_else(|| OracleError::InvalidResponse("no embedding in data".into()))?;
    parse_vector(item)
}

/// All vectors from a batched embeddings response, ordered by `index`.
fn parse_embeddings(reply: &Value, expected: usize) -> Result<Vec<Vec<f32>>, OracleError> {
    let items = reply["data"]
        .as_array()
        .ok_or_else(|| OracleError::InvalidResponse("no data in embeddings response".into()))?;

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (position, item) in items.iter().enumerate() {
        let index = item["index"].as_u64().map_or(position, |i| i as usize);
        let slot = slots.get_mut(index).ok_or_else(|| {
            OracleError::InvalidResponse(format!("embedding index {} out of range", index))
        })?;
        *slot = Some(parse_vector(item)?);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| OracleError::InvalidResponse(format!("no embedding for input {}", i)))
        })
        .collect()
}

fn parse_vector(item: &Value) -> Result<Vec<f32>, OracleError> {
    let values = item["embedding"]
        .as_array()
        .ok_or_else(|| OracleError::InvalidResponse("no embedding in data".into()))?;

    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| OracleError::InvalidResponse("non-numeric embedding value".into()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_content() {
        let reply = json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "[SLIDE 1]\nHello"}}]
        });
        assert_eq!(parse_chat_content(&reply).unwrap(), "[SLIDE 1]\nHello");

        let empty = json!({"choices": []});
        assert!(matches!(
            parse_chat_content(&empty),
            Err(OracleError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_embedding() {
        let reply = json!({"data": [{"index": 0, "embedding": [0.5, -1.0, 0.0]}]});
        assert_eq!(parse_embedding(&reply).unwrap(), vec![0.5, -1.0, 0.0]);

        let bad = json!({"data": [{"embedding": ["x"]}]});
        assert!(parse_embedding(&bad).is_err());
        assert!(parse_embedding(&json!({})).is_err());
    }

    #[test]
    fn test_parse_embeddings_orders_by_index() {
        let reply = json!({"data": [
            {"index": 1, "embedding": [0.0, 1.0]},
            {"index": 0, "embedding": [1.0, 0.0]},
        ]});
        assert_eq!(
            parse_embeddings(&reply, 2).unwrap(),
            vec![vec![1.0, 0.0], vec![0.0, 1.0]]
        );

        let short = json!({"data": [{"index": 0, "embedding": [1.0]}]});
        assert!(parse_embeddings(&short, 2).is_err());
        let stray = json!({"data": [{"index": 5, "embedding": [1.0]}]});
        assert!(parse_embeddings(&stray, 1).is_err());
    }

    #[test]
    fn test_data_url() {
        assert_eq!(data_url(b"abc", "image/png"), "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_description_prompt_marks_empty_slide() {
        let prompt = description_prompt(DescriptionContext {
            summary: "Quarterly review",
            slide_text: "  ",
            mime_type: "image/png",
        });
        assert!(prompt.contains("Quarterly review"));
        assert!(prompt.contains("(no text)"));
    }

    #[test]
    fn test_client_requires_key() {
        assert!(matches!(
            OpenAiClient::new(OpenAiConfig::default()),
            Err(ClientError::MissingCredential(_))
        ));
    }
}
