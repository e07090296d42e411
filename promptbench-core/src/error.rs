use thiserror::Error;

/// Errors returned by a single completion request
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LlmError {
    /// Transport-level failure (connection refused, DNS, TLS, ...)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Endpoint answered with a non-success status
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Request timed out
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Response body could not be decoded
    #[error("Failed to process response: {0}")]
    ResponseProcessing(String),

    /// No content in response
    #[error("No content in response")]
    NoContent,

    /// Other LLM error
    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Whether the endpoint itself pushed back (rate limit or 5xx).
    ///
    /// The model caller retries every failure regardless; this only labels
    /// the failed attempt in its log line.
    pub fn is_server_side(&self) -> bool {
        match self {
            LlmError::RateLimit(_) => true,
            LlmError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A model call that failed on every attempt.
///
/// Carries the last underlying failure. The evaluation loop turns this into an
/// error-marked item result instead of aborting the run.
#[derive(Debug, Error)]
#[error("Model call failed after {attempts} attempt(s): {source}")]
pub struct CallError {
    /// Number of endpoint calls made, including the first
    pub attempts: u32,

    /// Failure of the final attempt
    #[source]
    pub source: LlmError,
}

impl CallError {
    pub fn new(attempts: u32, source: LlmError) -> Self {
        Self { attempts, source }
    }
}
