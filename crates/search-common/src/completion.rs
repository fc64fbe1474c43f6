/// OpenAI-compatible chat-completions client.
///
/// Together AI and Perplexity both expose `POST {base}/chat/completions` with bearer auth and
/// the OpenAI request/response shape, so one client serves both; the provider is just a base
/// URL, a key and a label used in errors. Calls are not retried: a non-2xx answer is returned
/// to the caller as `CommonError::Upstream` with a bounded copy of the body.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{upstream_error, CommonError};

pub const TOGETHER_DEFAULT_BASE_URL: &str = "https://api.together.xyz/v1";
pub const PERPLEXITY_DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";

#[derive(Clone, Debug)]
pub struct CompletionConfig {
    /// Label used in logs and errors ("together", "perplexity").
    pub provider: &'static str,
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub max_error_body_bytes: usize,
}

impl CompletionConfig {
    pub fn new(provider: &'static str, base_url: &str, api_key: &str) -> Self {
        Self {
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(60),
            max_error_body_bytes: 8 * 1024,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_error_body_bytes(mut self, max: usize) -> Self {
        self.max_error_body_bytes = max;
        self
    }
}

#[derive(Clone)]
pub struct CompletionClient {
    config: CompletionConfig,
    http: reqwest::Client,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CommonError> {
        let http = reqwest::Client::builder()
            .user_agent("search-gateway/completion")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn provider(&self) -> &'static str {
        self.config.provider
    }

    pub async fn chat_completions(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, CommonError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .json(request)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(
                upstream_error(self.config.provider, resp, self.config.max_error_body_bytes).await,
            );
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Run a completion and return `choices[0].message.content`.
    pub async fn complete_text(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<String, CommonError> {
        let response = self.chat_completions(request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(CommonError::MissingField {
                provider: self.config.provider,
                field: "choices[0].message.content",
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChoice {
    pub index: Option<u32>,
    pub message: ChatCompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}
