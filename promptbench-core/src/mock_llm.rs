//! Test doubles for the completion endpoint and the retry timer
//!
//! - [`MockCompletionClient`] answers from a script or a closure and records
//!   every request it sees
//! - [`RecordingSleeper`] records requested waits and returns immediately
//!
//! # Example
//!
//! ```
//! use promptbench_core::mock_llm::{MockCompletionClient, RecordingSleeper};
//! use promptbench_core::{LlmError, ModelCaller, RetryPolicy};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let client = MockCompletionClient::new(vec![
//!     Err(LlmError::Timeout(100)),
//!     Ok("Rock".to_string()),
//! ]);
//! let sleeper = RecordingSleeper::new();
//! let caller = ModelCaller::new(Arc::new(client.clone()), RetryPolicy::default())
//!     .with_sleeper(Arc::new(sleeper.clone()));
//!
//! assert_eq!(caller.call("gpt-4o-mini", "lyrics", 0.0).await.unwrap(), "Rock");
//! assert_eq!(client.call_count(), 2);
//! assert_eq!(sleeper.recorded(), vec![Duration::from_secs(2)]);
//! # }
//! ```

use crate::error::LlmError;
use crate::llm::{CompletionClient, CompletionRequest};
use crate::retry::Sleeper;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type Responder = dyn Fn(&CompletionRequest, usize) -> Result<String, LlmError> + Send + Sync;

enum Behavior {
    Script(Mutex<VecDeque<Result<String, LlmError>>>),
    Func(Box<Responder>),
}

struct Inner {
    behavior: Behavior,
    requests: Mutex<Vec<CompletionRequest>>,
}

/// Scripted [`CompletionClient`]
///
/// Clones share the same script and request log, so a test can keep one
/// handle for assertions after moving another into an `Arc<dyn CompletionClient>`.
#[derive(Clone)]
pub struct MockCompletionClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MockCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCompletionClient")
            .field("call_count", &self.call_count())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Mock client lock poisoned - recovering");
            poisoned.into_inner()
        }
    }
}

impl MockCompletionClient {
    /// Answer with `responses` in order.
    ///
    /// Once the script runs out every further call fails with
    /// [`LlmError::Other`].
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self::with_behavior(Behavior::Script(Mutex::new(responses.into())))
    }

    /// Answer every call with `text`.
    pub fn always(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::from_fn(move |_, _| Ok(text.clone()))
    }

    /// Fail every call with a fresh error from `make_error`.
    pub fn always_failing<F>(make_error: F) -> Self
    where
        F: Fn() -> LlmError + Send + Sync + 'static,
    {
        Self::from_fn(move |_, _| Err(make_error()))
    }

    /// Answer with a closure of the request and the 0-based call number.
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest, usize) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self::with_behavior(Behavior::Func(Box::new(responder)))
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            inner: Arc::new(Inner {
                behavior,
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Number of `complete` calls made so far
    pub fn call_count(&self) -> usize {
        lock(&self.inner.requests).len()
    }

    /// Every request received, in call order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.inner.requests).clone()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let call_number = {
            let mut requests = lock(&self.inner.requests);
            requests.push(request.clone());
            requests.len() - 1
        };

        match &self.inner.behavior {
            Behavior::Script(script) => lock(script).pop_front().unwrap_or_else(|| {
                Err(LlmError::Other(format!(
                    "mock script exhausted at call {}",
                    call_number + 1
                )))
            }),
            Behavior::Func(responder) => responder(request, call_number),
        }
    }
}

/// [`Sleeper`] that records each requested duration and returns at once
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    recorded: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requested durations, in order
    pub fn recorded(&self) -> Vec<Duration> {
        lock(&self.recorded).clone()
    }

    /// Sum of all requested durations
    pub fn total(&self) -> Duration {
        self.recorded().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.recorded).push(duration);
    }
}
