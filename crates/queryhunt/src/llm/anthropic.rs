use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::{Value, json};

use super::sse::decode_text_stream;
use super::{GenerativeClient, GenerativeError, TextStream};
use crate::config::GeneratorConfig;
use crate::prompts::GAME_MASTER_PERSONA;

/// Messages API client. One user message per request; the persona rides in `system`.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    config: GeneratorConfig,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,

    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClient {
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerativeError> {
        if config.api_key.trim().is_empty() {
            return Err(GenerativeError::MissingCredentials(
                "api key is empty; pass --api-key or set QUERYHUNT_API_KEY".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("queryhunt/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| GenerativeError::Transport(error.to_string()))?;

        Ok(Self { http, config })
    }

    fn request_body(&self, prompt: &str, stream: bool) -> Value {
        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "system": GAME_MASTER_PERSONA,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "stream": stream,
        })
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, GenerativeError> {
        let response = self
            .http
            .post(self.config.messages_url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(body)
            .send()
            .await
            .map_err(|error| GenerativeError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status.as_u16(), response.text().await));
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerativeClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String, GenerativeError> {
        let response = self.send(&self.request_body(prompt, false)).await?;
        let payload = response
            .json::<MessagesResponse>()
            .await
            .map_err(|error| GenerativeError::Decode(error.to_string()))?;

        Ok(text_of(payload))
    }

    async fn stream_complete(&self, prompt: &str) -> Result<TextStream, GenerativeError> {
        let response = self.send(&self.request_body(prompt, true)).await?;
        let bytes = response
            .bytes_stream()
            .map_err(|error| GenerativeError::Transport(error.to_string()));

        Ok(decode_text_stream(Box::pin(bytes)))
    }
}

fn status_error<E: std::fmt::Display>(status: u16, body: Result<String, E>) -> GenerativeError {
    let body = body.unwrap_or_else(|error| format!("<error body unreadable: {error}>"));
    GenerativeError::Status { status, body }
}

fn text_of(payload: MessagesResponse) -> String {
    payload
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect()
}
