//! Anthropic Messages API client.
//!
//! Two entry points: `complete` for one-shot prompts that return text,
//! and `converse` for the tool-calling agent loop.

use crate::error::DistillError;
use crate::paper::extract::retry_after;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Upper bound for a single wait between retries.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Configuration for the LLM client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: String,
    pub model_name: String,
    pub timeout_seconds: u64,
    pub retries: usize,
    /// Base delay for retry backoff; doubled on every attempt.
    pub retry_base_delay: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            model_name: "claude-sonnet-4-20250514".to_string(),
            timeout_seconds: 300,
            retries: 3,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

impl LlmConfig {
    /// Build from the model section of the configuration.
    pub fn from_model_config(model: &crate::config::ModelConfig) -> Result<Self> {
        let api_key = model
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(DistillError::MissingCredential("ANTHROPIC_API_KEY"))?;

        Ok(Self {
            api_url: model.api_url.clone(),
            api_key,
            model_name: model.name.clone(),
            timeout_seconds: model.timeout_seconds,
            retries: model.retries,
            ..Default::default()
        })
    }
}

/// Message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn blocks(role: Role, blocks: Vec<ContentBlock>) -> Self {
        Self {
            role,
            content: MessageContent::Blocks(blocks),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A content block of a request or response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Block types this client does not interpret (e.g. thinking).
    #[serde(other)]
    Unknown,
}

/// Tool definition for the Messages API.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Messages API request.
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
}

/// Messages API response.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl MessagesResponse {
    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool calls requested in this response, in order.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }

    pub fn is_end_turn(&self) -> bool {
        self.stop_reason.as_deref() == Some("end_turn")
    }
}

/// Client for the Messages API.
pub struct LlmClient {
    config: LlmConfig,
    http_client: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    /// Send a single user prompt and return the text of the reply.
    pub async fn complete(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        let messages = [Message::user(prompt)];
        let response = self.converse(system, &messages, &[], max_tokens).await?;
        Ok(response.text())
    }

    /// Send a full conversation (optionally with tools) and return the raw response.
    pub async fn converse(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        max_tokens: u32,
    ) -> Result<MessagesResponse> {
        let url = format!("{}/v1/messages", self.config.api_url.trim_end_matches('/'));
        let request = MessagesRequest {
            model: &self.config.model_name,
            max_tokens,
            system,
            messages,
            tools: (!tools.is_empty()).then_some(tools),
        };

        debug!(
            "Sending messages request with {} messages, {} tools",
            messages.len(),
            tools.len()
        );

        let mut attempt = 0;
        loop {
            let response = self
                .http_client
                .post(&url)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        anyhow::anyhow!("Request timed out after {}s", self.config.timeout_seconds)
                    } else if e.is_connect() {
                        anyhow::anyhow!("Cannot connect to the Messages API at {}", self.config.api_url)
                    } else {
                        anyhow::anyhow!("Failed to send request: {}", e)
                    }
                })?;

            let status = response.status();
            if status.is_success() {
                return response
                    .json::<MessagesResponse>()
                    .await
                    .context("Failed to parse Messages API response");
            }

            let server_delay = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            let retryable = status.as_u16() == 429 || status.as_u16() == 529 || status.is_server_error();
            if retryable && attempt < self.config.retries {
                let delay = server_delay
                    .map(|d| d.min(MAX_RETRY_DELAY))
                    .unwrap_or_else(|| backoff_delay(self.config.retry_base_delay, attempt));
                warn!(
                    "Messages API returned {}, retrying in {:?} ({}/{})",
                    status,
                    delay,
                    attempt + 1,
                    self.config.retries
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return Err(DistillError::Api {
                service: "Anthropic",
                status: status.as_u16(),
                body,
            }
            .into());
        }
    }
}

/// Exponential backoff, capped at `MAX_RETRY_DELAY`.
fn backoff_delay(base: Duration, attempt: usize) -> Duration {
    let exponent = u32::try_from(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(2u32.saturating_pow(exponent))
        .min(MAX_RETRY_DELAY)
}
