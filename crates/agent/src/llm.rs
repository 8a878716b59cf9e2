//! Chat completion client for the OpenAI-compatible DeepSeek API.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use storefront_core::config::LlmConfig;

const COMPLETIONS_PATH: &str = "/chat/completions";
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("chat backend is not configured")]
    NotConfigured,
    #[error("chat request failed: {0}")]
    Transport(String),
    #[error("chat backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode chat response: {0}")]
    Decode(String),
    #[error("chat response had no choices")]
    EmptyResponse,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Returns the assistant text of the first choice.
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Bearer-authenticated client with a request timeout and bounded retries on
/// transport failures and transient statuses.
#[derive(Clone, Debug)]
pub struct DeepSeekChatClient {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl DeepSeekChatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Transport(format!("failed to build HTTP client: {error}")))?;

        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.expose_secret().trim().is_empty());

        Ok(Self {
            client,
            api_key,
            endpoint: completions_endpoint(&config.base_url),
            model: config.model.clone(),
            max_attempts: config.max_attempts.max(1),
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send_once(
        &self,
        api_key: &SecretString,
        request: &CompletionRequest<'_>,
    ) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let body: CompletionResponse =
            response.json().await.map_err(|error| LlmError::Decode(error.to_string()))?;
        let choice = body.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;
        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }
}

#[async_trait]
impl ChatClient for DeepSeekChatClient {
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<String, LlmError> {
        let api_key = self.api_key.as_ref().ok_or(LlmError::NotConfigured)?;
        let request =
            CompletionRequest { model: &self.model, messages, temperature, stream: false };

        let mut attempt = 1;
        loop {
            match self.send_once(api_key, &request).await {
                Ok(content) => {
                    debug!(attempt, model = %self.model, "chat completion received");
                    return Ok(content);
                }
                Err(error) if attempt < self.max_attempts && is_retryable(&error) => {
                    warn!(attempt, error = %error, "chat completion failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn completions_endpoint(base_url: &str) -> String {
    format!("{}{COMPLETIONS_PATH}", base_url.trim_end_matches('/'))
}

fn is_retryable(error: &LlmError) -> bool {
    match error {
        LlmError::Transport(_) => true,
        LlmError::Status { status, .. } => *status == 429 || *status >= 500,
        LlmError::NotConfigured | LlmError::Decode(_) | LlmError::EmptyResponse => false,
    }
}
