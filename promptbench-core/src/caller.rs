//! Model caller: one chat request with bounded retries.

use crate::config::LlmConfig;
use crate::error::{CallError, LlmError};
use crate::llm::{CompletionClient, CompletionRequest};
use crate::retry::{retry_with_policy, RetryPolicy, Sleeper, TokioSleeper};
use std::sync::Arc;

/// Trimmed model answer and the number of endpoint calls it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub attempts: u32,
}

/// Sends single-turn requests to a [`CompletionClient`], retrying every
/// failure with a fixed delay.
///
/// A failed call never panics; once the policy is used up the last failure
/// comes back as a [`CallError`].
#[derive(Clone)]
pub struct ModelCaller {
    client: Arc<dyn CompletionClient>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    max_tokens: Option<u32>,
}

impl std::fmt::Debug for ModelCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCaller")
            .field("policy", &self.policy)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl ModelCaller {
    /// Create a caller that waits on the tokio timer.
    pub fn new(client: Arc<dyn CompletionClient>, policy: RetryPolicy) -> Self {
        Self {
            client,
            sleeper: Arc::new(TokioSleeper),
            policy,
            max_tokens: None,
        }
    }

    /// Create a caller whose retry policy and token cap come from `config`.
    pub fn from_config(client: Arc<dyn CompletionClient>, config: &LlmConfig) -> Self {
        Self::new(
            client,
            RetryPolicy::new(config.max_retries, config.retry_delay),
        )
        .with_max_tokens(config.max_tokens)
    }

    /// Replace the sleeper used between attempts.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sleeper shared with anything else that paces the run.
    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        Arc::clone(&self.sleeper)
    }

    /// Send `combined_text` as one user message and return the trimmed answer.
    pub async fn call(
        &self,
        model_id: &str,
        combined_text: &str,
        temperature: f32,
    ) -> Result<String, CallError> {
        self.call_counted(model_id, combined_text, temperature)
            .await
            .map(|answer| answer.text)
    }

    /// Like [`call`](Self::call), but also reports how many attempts it took.
    pub async fn call_counted(
        &self,
        model_id: &str,
        combined_text: &str,
        temperature: f32,
    ) -> Result<Answer, CallError> {
        let request = CompletionRequest::single_turn(model_id, combined_text, temperature)
            .with_max_tokens(self.max_tokens);
        self.call_request(&request).await
    }

    /// Send an arbitrary request under the same retry policy.
    pub async fn call_request(&self, request: &CompletionRequest) -> Result<Answer, CallError> {
        let client = &self.client;

        let outcome = retry_with_policy(
            &self.policy,
            self.sleeper.as_ref(),
            |attempt, max_attempts, e: &LlmError| {
                if attempt < max_attempts {
                    let side = if e.is_server_side() { "endpoint" } else { "request" };
                    log::warn!(
                        "Model call to {} failed (attempt {}/{}, {} side): {}, retrying in {:?}",
                        request.model,
                        attempt,
                        max_attempts,
                        side,
                        e,
                        self.policy.delay
                    );
                } else {
                    log::error!(
                        "Model call to {} failed (attempt {}/{}): {}, giving up",
                        request.model,
                        attempt,
                        max_attempts,
                        e
                    );
                }
            },
            |attempt| {
                let response = client.complete(request);
                async move { response.await.map(|text| (text, attempt)) }
            },
        )
        .await;

        match outcome {
            Ok((text, attempts)) => {
                log::info!(
                    "Model call to {} succeeded (attempt {}/{})",
                    request.model,
                    attempts,
                    self.policy.max_attempts()
                );
                Ok(Answer {
                    text: text.trim().to_string(),
                    attempts,
                })
            }
            Err(exhausted) => Err(CallError::new(exhausted.attempts, exhausted.last_error)),
        }
    }
}
