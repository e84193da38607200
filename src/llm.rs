// ===============================
// src/llm.rs
// ===============================
//
// Client chat-completions (Mistral / OpenAI-compatible):
// - POST {model, messages, temperature, max_tokens} dengan Bearer key
// - balasan: {choices: [{message: {content}}]}
// - non-2xx / choices kosong -> error (gateway yang memutuskan fallback)
//
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error};
use url::Url;

use crate::metrics::{UPSTREAM_ERRORS, UPSTREAM_LATENCY_MS};

pub const TEMPERATURE: f32 = 0.7;
pub const MAX_TOKENS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role { System, User, Assistant }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage { pub role: Role, pub content: String }

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self { Self { role: Role::System, content: content.into() } }
    pub fn user(content: impl Into<String>) -> Self { Self { role: Role::User, content: content.into() } }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice { message: ChoiceMessage }

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request to LLM endpoint failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("LLM endpoint timed out")]
    Timeout,
    #[error("LLM endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("LLM response is not valid JSON: {0}")]
    Decode(String),
    #[error("no choices in LLM response")]
    EmptyChoices,
}

impl UpstreamError {
    pub fn reason(&self) -> &'static str {
        match self {
            UpstreamError::Transport(_) => "transport",
            UpstreamError::Timeout => "timeout",
            UpstreamError::Status { .. } => "status",
            UpstreamError::Decode(_) => "decode",
            UpstreamError::EmptyChoices => "empty_choices",
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() { UpstreamError::Timeout } else { UpstreamError::Transport(e) }
    }
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(endpoint: Url, api_key: String, model: String, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UpstreamError::Transport)?;
        Ok(Self { http, endpoint, api_key, model })
    }

    /// One chat completion; returns the first choice's text.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, UpstreamError> {
        let started = Instant::now();
        let result = self.send(messages).await;
        UPSTREAM_LATENCY_MS.observe(started.elapsed().as_secs_f64() * 1_000.0);
        if let Err(e) = &result {
            UPSTREAM_ERRORS.with_label_values(&[e.reason()]).inc();
            error!(error = %e, endpoint = %self.endpoint, "LLM request failed");
        }
        result
    }

    async fn send(&self, messages: &[ChatMessage]) -> Result<String, UpstreamError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let rsp = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status: status.as_u16(), body });
        }

        let raw = rsp.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&raw).map_err(|e| UpstreamError::Decode(e.to_string()))?;
        let first = parsed.choices.into_iter().next().ok_or(UpstreamError::EmptyChoices)?;
        debug!(chars = first.message.content.len(), "LLM reply received");
        Ok(first.message.content)
    }
}
