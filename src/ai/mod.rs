//! Text-generation collaborator: trait and chat-completions client.

pub mod enrich;
pub mod events;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::AiConfig;
use crate::error::{MailsenseError, Result};

/// The text-generation collaborator. Given a prompt, returns free-form text;
/// callers are responsible for best-effort recovery of any structure inside.
#[async_trait]
pub trait TextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatApiResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatApiResponseOrError {
    Response(ChatApiResponse),
    Error { error: ChatApiError },
}

/// Client for an OpenAI-style chat-completions endpoint.
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: String,
}

impl ChatClient {
    /// Build a client from config; the API key comes from the environment
    /// variable named in `[ai] api_key_env`.
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            MailsenseError::TextGen(format!(
                "environment variable '{}' not set (text-generation API key)",
                config.api_key_env
            ))
        })?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "temperature": self.temperature,
                "messages": [
                    {"role": "user", "content": prompt}
                ]
            }))
            .send()
            .await?;

        let value: serde_json::Value = resp.json().await?;
        let parsed: ChatApiResponseOrError = serde_json::from_value(value.clone())
            .map_err(|e| MailsenseError::TextGen(format!("unrecognized response ({e}): {value}")))?;

        match parsed {
            ChatApiResponseOrError::Error { error } => Err(MailsenseError::TextGen(format!(
                "chat API error: {}",
                error.message
            ))),
            ChatApiResponseOrError::Response(resp) => resp
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .ok_or_else(|| MailsenseError::TextGen("no choices in response".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let raw = r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}]}"#;
        let parsed: ChatApiResponseOrError = serde_json::from_str(raw).unwrap();
        match parsed {
            ChatApiResponseOrError::Response(r) => {
                assert_eq!(r.choices[0].message.content, "hi");
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn test_parse_chat_error() {
        let raw = r#"{"error": {"message": "Requests rate limit exceeded", "type": "rate_limit"}}"#;
        let parsed: ChatApiResponseOrError = serde_json::from_str(raw).unwrap();
        match parsed {
            ChatApiResponseOrError::Error { error } => {
                assert_eq!(error.message, "Requests rate limit exceeded");
            }
            _ => panic!("expected error"),
        }
    }
}
