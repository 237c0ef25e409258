//! OpenAI-compatible inference client.
//!
//! Sends non-streaming chat completion requests and retries transient
//! failures with exponential backoff. The retry policy is immutable config
//! and each call counts its own attempts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::config::{ModelConfig, RetryConfig, ToolboxConfig};
use super::errors::InferenceError;
use super::types::{parse_completion_body, CallOptions, ChatCompletionRequest, ChatMessage};

// ─── Model Call Capability ───────────────────────────────────────────────────

/// The one capability the planning pipeline needs from a model: prompt in,
/// completion text out.
///
/// Every failure is an `InferenceError`; the pipeline treats them all alike.
#[async_trait]
pub trait ModelCall: Send + Sync {
    async fn call(&self, prompt: &str, options: CallOptions) -> Result<String, InferenceError>;
}

#[async_trait]
impl<T: ModelCall + ?Sized> ModelCall for std::sync::Arc<T> {
    async fn call(&self, prompt: &str, options: CallOptions) -> Result<String, InferenceError> {
        (**self).call(prompt, options).await
    }
}

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for a chat-completions endpoint.
pub struct InferenceClient {
    http: HttpClient,
    model: ModelConfig,
    retry: RetryConfig,
}

impl InferenceClient {
    /// Create a client. Does NOT check connectivity; that happens on the
    /// first request.
    pub fn new(model: ModelConfig, retry: RetryConfig) -> Result<Self, InferenceError> {
        let http = HttpClient::builder()
            .connect_timeout(Duration::from_secs(retry.connect_timeout_secs))
            .timeout(Duration::from_secs(retry.request_timeout_secs))
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: model.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, model, retry })
    }

    pub fn from_config(config: &ToolboxConfig) -> Result<Self, InferenceError> {
        Self::new(config.model.clone(), config.retry.clone())
    }

    /// The base URL of the model endpoint.
    pub fn base_url(&self) -> &str {
        &self.model.base_url
    }

    pub fn model_name(&self) -> &str {
        &self.model.model_name
    }

    // ─── Chat Completion ─────────────────────────────────────────────────

    /// Send a chat completion request, retrying transient failures.
    ///
    /// Makes at most `max_retries + 1` attempts. Non-retriable errors are
    /// returned immediately; retriable ones that survive every attempt come
    /// back wrapped in `RetriesExhausted`.
    pub async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        options: CallOptions,
    ) -> Result<String, InferenceError> {
        let body = self.build_request(messages, options);
        let max_attempts = self.retry.max_retries.saturating_add(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.try_request(&body).await {
                Ok(text) => {
                    tracing::debug!(attempt, chars = text.len(), "model call succeeded");
                    return Ok(text);
                }
                Err(e) if e.is_retriable() && attempt < max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "model call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retriable() && attempt > 1 => {
                    return Err(InferenceError::RetriesExhausted {
                        attempts: attempt,
                        last_error: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn build_request(&self, messages: Vec<ChatMessage>, options: CallOptions) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.model_name.clone(),
            messages,
            temperature: options.temperature.unwrap_or(self.model.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.model.max_tokens),
            stream: false,
        }
    }

    /// Attempt a single request.
    async fn try_request(&self, body: &ChatCompletionRequest) -> Result<String, InferenceError> {
        let url = format!("{}/chat/completions", self.model.base_url.trim_end_matches('/'));

        tracing::info!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            max_tokens = body.max_tokens,
            "=== LLM REQUEST ==="
        );

        let mut request = self.http.post(&url).json(body);
        if let Some(key) = &self.model.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: self.retry.request_timeout_secs,
                }
            } else {
                InferenceError::ConnectionFailed {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body_text = response.text().await.map_err(|e| InferenceError::MalformedResponse {
            reason: format!("failed to read response body: {e}"),
        })?;

        parse_completion_body(&body_text)
    }
}

#[async_trait]
impl ModelCall for InferenceClient {
    async fn call(&self, prompt: &str, options: CallOptions) -> Result<String, InferenceError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.model.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(prompt));
        self.chat_completion(messages, options).await
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
