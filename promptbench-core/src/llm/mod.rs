//! Chat-completion endpoint seam.
//!
//! The evaluation core only ever talks to a [`CompletionClient`]. Production
//! runs use [`OpenAiClient`]; tests inject a scripted client from
//! [`crate::mock_llm`].
//!
//! # Example
//!
//! ```no_run
//! use promptbench_core::{CompletionClient, CompletionRequest, LlmConfig, OpenAiClient};
//!
//! # async fn example() -> Result<(), promptbench_core::LlmError> {
//! let client = OpenAiClient::new("sk-...", LlmConfig::default())?;
//! let request = CompletionRequest::single_turn("gpt-4o-mini", "Name a genre.", 0.0);
//! let text = client.complete(&request).await?;
//! println!("{}", text);
//! # Ok(())
//! # }
//! ```

mod client;
mod request;

pub use client::OpenAiClient;
pub use request::{ChatMessage, CompletionRequest, Role};

use crate::error::LlmError;
use async_trait::async_trait;

/// Anything that can turn a chat request into response text.
///
/// Implementations make exactly one endpoint call per `complete`; retrying is
/// the job of [`crate::ModelCaller`].
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}
