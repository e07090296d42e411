use std::time::Duration;

/// Model used when the caller does not pick one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Chat models offered by the competition setup.
///
/// Any other model identifier accepted by the endpoint works too; this list
/// only feeds CLI help and the `--list-models` output.
pub const KNOWN_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o", "gpt-4-turbo", "gpt-3.5-turbo"];

/// Base URL of the OpenAI chat-completions API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for the completion endpoint and the retry policy around it.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LlmConfig {
    /// Endpoint model identifier
    ///
    /// Default: `gpt-4o-mini`
    pub model: String,

    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    pub base_url: String,

    /// Timeout for individual HTTP requests
    ///
    /// Default: 60 seconds
    pub timeout: Duration,

    /// Temperature for generation (0.0 - 1.0)
    ///
    /// Default: 0.0, so repeated runs of the same prompt are comparable.
    pub temperature: f32,

    /// Optional cap on generated tokens. `None` leaves it to the endpoint.
    pub max_tokens: Option<u32>,

    /// Number of *additional* attempts after a failed call
    ///
    /// Default: 3
    pub max_retries: u32,

    /// Fixed wait between attempts
    ///
    /// Default: 2 seconds
    pub retry_delay: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            temperature: 0.0,
            max_tokens: None,
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl LlmConfig {
    /// Set the endpoint model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the base URL of the OpenAI-compatible API.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the timeout for individual HTTP requests.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the temperature for generation (0.0 - 1.0).
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap the number of generated tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the number of additional attempts after a failed call.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the fixed wait between attempts.
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Total number of endpoint calls a single request may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Check ranges that the endpoint would otherwise reject at request time.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model must not be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(format!(
                "temperature ({}) must be between 0.0 and 1.0",
                self.temperature
            ));
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}
