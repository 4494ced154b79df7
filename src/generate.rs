//! Chat completion.
//!
//! [`OpenAIChat`] sends the configured system prompt plus one user turn
//! to `POST {base_url}/chat/completions` and returns the first choice's
//! content. The [`ChatModel`] trait lets the HTTP layer run against a
//! stub in tests.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ChatConfig;
use crate::http::{build_client, send_with_retry, HttpFailure};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("chat request failed: {0}")]
    Request(String),
    #[error("chat API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid chat response: {0}")]
    InvalidResponse(String),
}

/// Produces an answer for a single prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

pub struct OpenAIChat {
    client: Client,
    api_key: String,
    config: ChatConfig,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIChat {
    pub fn new(config: &ChatConfig, api_key: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key: api_key.to_string(),
            config: config.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.config.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = send_with_retry(
            || {
                self.client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&body)
            },
            self.config.max_retries,
        )
        .await
        .map_err(|failure| match failure {
            HttpFailure::Request(msg) => GenerateError::Request(msg),
            HttpFailure::Status { status, body } => GenerateError::Api { status, body },
        })?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::InvalidResponse(e.to_string()))?;
        first_choice_content(parsed)
    }
}

/// An absent or empty completion is an error rather than an empty answer.
fn first_choice_content(response: ChatResponse) -> Result<String, GenerateError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| GenerateError::InvalidResponse("empty completion".to_string()))
}
