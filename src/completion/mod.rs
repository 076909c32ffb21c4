//! Completion service client abstraction and HTTP adapter.
//!
//! The analysis pipeline talks to the completion service exclusively through the
//! [`CompletionClient`] trait. The HTTP adapter speaks the chat-completions wire format,
//! owns the request timeout, and retries transient failures with exponential backoff.
//! Structural validation stops at "a non-empty message body came back"; interpreting the
//! text is the pipeline's job.

use crate::config::get_config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum CompletionClientError {
    /// Service was unreachable, timed out, or returned a server error.
    #[error("Completion service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Service rejected the request due to rate limiting.
    #[error("Completion service rate limited the request: {0}")]
    RateLimited(String),
    /// Service answered successfully but the expected message content was absent.
    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),
}

/// Parameters for a single completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Prompt assembled by the analysis pipeline.
    pub prompt: String,
    /// Model identifier understood by the service.
    pub model: String,
    /// Sampling temperature for this call.
    pub temperature: f32,
}

/// Interface implemented by completion service adapters.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send one prompt and return the generated text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionClientError>;
}

/// Build a completion client from the loaded configuration.
pub fn get_completion_client() -> Box<dyn CompletionClient + Send + Sync> {
    let config = get_config();
    Box::new(ChatCompletionsClient::new(
        config.completion_api_url.clone(),
        config.completion_api_key.clone(),
        Duration::from_secs(config.completion_timeout_secs),
        config.completion_max_retries,
    ))
}

/// Chat-completions HTTP adapter with timeout and bounded retry.
pub struct ChatCompletionsClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl ChatCompletionsClient {
    /// Construct a new adapter for the given endpoint.
    ///
    /// `timeout` bounds every attempt; an attempt that exceeds it surfaces as
    /// [`CompletionClientError::ServiceUnavailable`] rather than hanging the caller.
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        let http = Client::builder()
            .user_agent("skillscope/completion")
            .timeout(timeout)
            .build()
            .expect("Failed to construct reqwest::Client for completions");
        Self {
            http,
            base_url,
            api_key,
            max_retries,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }

    async fn send_once(
        &self,
        request: &CompletionRequest,
    ) -> Result<String, CompletionClientError> {
        let body = ChatRequestBody {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
        };

        let mut builder = self.http.post(self.endpoint()).json(&body);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|error| {
            CompletionClientError::ServiceUnavailable(format!(
                "failed to reach completion service at {}: {error}",
                self.base_url
            ))
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionClientError::RateLimited(format!(
                "completion service returned 429: {body}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionClientError::ServiceUnavailable(format!(
                "completion service returned {status}: {body}"
            )));
        }

        let body: ChatResponseBody = response.json().await.map_err(|error| {
            CompletionClientError::MalformedResponse(format!(
                "failed to decode completion response: {error}"
            ))
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        let content = content.trim();
        if content.is_empty() {
            return Err(CompletionClientError::MalformedResponse(
                "completion message content was empty".into(),
            ));
        }

        Ok(content.to_string())
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionsClient {
    /// Retries apply only to [`CompletionClientError::ServiceUnavailable`]; a malformed or
    /// rate-limited response repeats deterministically and is surfaced immediately.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionClientError> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(&request).await {
                Ok(text) => return Ok(text),
                Err(error @ CompletionClientError::ServiceUnavailable(_))
                    if attempt < self.max_retries =>
                {
                    let delay = Duration::from_secs(2u64.pow(attempt));
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_secs = delay.as_secs(),
                        error = %error,
                        "Completion attempt failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
