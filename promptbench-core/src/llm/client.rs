//! OpenAI-compatible chat-completions client.

use super::request::CompletionRequest;
use super::CompletionClient;
use crate::config::LlmConfig;
use crate::error::LlmError;
use async_trait::async_trait;
use serde_json::Value;

/// HTTP client for `{base_url}/chat/completions`
///
/// One instance is built per run and shared behind an `Arc`; the underlying
/// `reqwest::Client` pools connections.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    config: LlmConfig,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_key", &"[REDACTED]")
            .field("config", &self.config)
            .finish()
    }
}

impl OpenAiClient {
    /// Build a client with the request timeout taken from `config`.
    pub fn new(api_key: impl Into<String>, config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::InvalidRequest("API key is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            config,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.config.timeout.as_millis() as u64)
        } else {
            LlmError::Http(e.to_string())
        }
    }
}

/// JSON body for a chat-completions request.
pub(crate) fn build_body(request: &CompletionRequest) -> Value {
    let mut body = serde_json::json!({
        "model": request.model,
        "temperature": request.temperature,
        "messages": request.messages,
    });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = Value::from(max_tokens);
    }
    body
}

/// Extract `choices[0].message.content` from a response body.
pub(crate) fn parse_response(body: &str) -> Result<String, LlmError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| LlmError::ResponseProcessing(format!("invalid JSON: {}", e)))?;

    json["choices"]
        .as_array()
        .and_then(|choices| choices.first())
        .and_then(|choice| choice["message"]["content"].as_str())
        .map(str::to_string)
        .ok_or(LlmError::NoContent)
}

/// Map a non-success status to the matching error variant.
pub(crate) fn status_error(status: u16, body: String) -> LlmError {
    if status == 429 {
        LlmError::RateLimit(body)
    } else {
        LlmError::Api { status, body }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        if request.messages.is_empty() {
            return Err(LlmError::InvalidRequest(
                "request has no messages".to_string(),
            ));
        }

        let url = self.endpoint();
        log::debug!("POST {} (model: {})", url, request.model);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&build_body(request))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), text));
        }

        parse_response(&text)
    }
}
