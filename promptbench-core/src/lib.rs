//! # Promptbench Core
//!
//! Model-calling layer for prompt evaluation runs.
//!
//! ## Architecture
//!
//! - **Injected endpoint**: everything talks to an `Arc<dyn CompletionClient>`;
//!   [`OpenAiClient`] is the production implementation
//! - **Explicit retry**: [`retry_with_policy`] applies a fixed-delay
//!   [`RetryPolicy`] and waits through a [`Sleeper`], so tests never sleep
//! - **Contained failures**: [`ModelCaller::call`] returns [`CallError`]
//!   once retries are exhausted and never panics
//!
//! ## Example
//!
//! ```no_run
//! use promptbench_core::{LlmConfig, ModelCaller, OpenAiClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LlmConfig::default();
//! let client = OpenAiClient::new("sk-...", config.clone())?;
//! let caller = ModelCaller::from_config(Arc::new(client), &config);
//!
//! let genre = caller
//!     .call(&config.model, "lyrics...\n\nReturn only the genre.", config.temperature)
//!     .await?;
//! println!("{}", genre);
//! # Ok(())
//! # }
//! ```

pub mod caller;
pub mod config;
pub mod error;
pub mod llm;
pub mod mock_llm;
pub mod retry;

pub use caller::{Answer, ModelCaller};
pub use config::{LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL, KNOWN_MODELS};
pub use error::{CallError, LlmError};
pub use llm::{ChatMessage, CompletionClient, CompletionRequest, OpenAiClient, Role};
pub use retry::{retry_with_policy, RetryExhausted, RetryPolicy, Sleeper, TokioSleeper};
