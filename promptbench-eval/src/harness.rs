//! Evaluation harness for batch execution.
//!
//! The [`EvalHarness`] runs one prompt against every item of a dataset,
//! strictly one item at a time, and aggregates the outcome into an
//! [`EvaluationReport`].

use crate::dataset::{Dataset, DatasetError, DatasetItem};
use crate::matcher::MatchMethod;
use crate::results::{EvaluationReport, ItemResult};
use promptbench_core::{
    CompletionClient, LlmConfig, ModelCaller, RetryPolicy, Sleeper, DEFAULT_MODEL,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that can occur during evaluation.
///
/// Per-item model failures are not errors; they become `"ERROR"` results.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EvalError {
    /// Failed to load dataset
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

/// Progress events emitted during evaluation.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum EvalProgress {
    /// Evaluation starting.
    Started {
        /// Total number of items to evaluate.
        total: usize,
    },
    /// An item finished (answered or failed).
    ItemCompleted {
        /// 0-based dataset position.
        index: usize,
        /// Total number of items.
        total: usize,
        /// Ground-truth label.
        expected: String,
        /// Model answer, or `"ERROR"`.
        predicted: String,
        /// Whether the answer matched.
        correct: bool,
        /// Whether the model call gave up.
        error: bool,
    },
}

/// Configuration for the evaluation harness.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct EvalConfig {
    /// Endpoint model identifier (default: `gpt-4o-mini`)
    pub model: String,

    /// Sampling temperature (default: 0.0)
    pub temperature: f32,

    /// Label matching policy (default: `contains`)
    pub match_method: MatchMethod,

    /// Additional attempts after a failed model call (default: 3).
    ///
    /// `max_retries = 2` means each item gets up to 3 endpoint calls.
    pub max_retries: u32,

    /// Fixed wait between attempts (default: 2 s)
    pub retry_delay: Duration,

    /// Wait after every item, answered or not (default: 1 s)
    pub inter_item_delay: Duration,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            match_method: MatchMethod::default(),
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            inter_item_delay: Duration::from_secs(1),
        }
    }
}

impl EvalConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take model, temperature and retry settings from an [`LlmConfig`].
    pub fn from_llm_config(llm: &LlmConfig) -> Self {
        Self::default()
            .with_model(llm.model.clone())
            .with_temperature(llm.temperature)
            .with_max_retries(llm.max_retries)
            .with_retry_delay(llm.retry_delay)
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_match_method(mut self, match_method: MatchMethod) -> Self {
        self.match_method = match_method;
        self
    }

    /// Set the maximum retry count.
    ///
    /// This is the number of *additional* attempts after the initial try.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    #[must_use]
    pub fn with_inter_item_delay(mut self, inter_item_delay: Duration) -> Self {
        self.inter_item_delay = inter_item_delay;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay)
    }
}

/// Evaluation harness for scoring a prompt.
///
/// # Example
///
/// ```no_run
/// use promptbench_core::{LlmConfig, ModelCaller, OpenAiClient};
/// use promptbench_eval::{EvalConfig, EvalHarness, JsonFileDataset};
/// use std::path::PathBuf;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let llm = LlmConfig::default();
/// let client = OpenAiClient::new("sk-...", llm.clone())?;
/// let harness = EvalHarness::new(
///     ModelCaller::from_config(Arc::new(client), &llm),
///     EvalConfig::from_llm_config(&llm),
/// );
///
/// let dataset = JsonFileDataset::new(PathBuf::from("songs.json"));
/// let report = harness
///     .evaluate_dataset(&dataset, None, "Return only the genre.")
///     .await?;
///
/// println!("{}/{}", report.correct_count, report.total_count);
/// # Ok(())
/// # }
/// ```
pub struct EvalHarness {
    caller: ModelCaller,
    sleeper: Arc<dyn Sleeper>,
    config: EvalConfig,
}

impl EvalHarness {
    /// Create a harness; the caller's retry policy is replaced by the one in
    /// `config`, and its sleeper also paces the inter-item delay.
    pub fn new(caller: ModelCaller, config: EvalConfig) -> Self {
        let caller = caller.with_policy(config.retry_policy());
        let sleeper = caller.sleeper();
        Self {
            caller,
            sleeper,
            config,
        }
    }

    /// Create a harness around a completion client with the tokio timer.
    pub fn from_client(client: Arc<dyn CompletionClient>, config: EvalConfig) -> Self {
        Self::new(ModelCaller::new(client, config.retry_policy()), config)
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Load `dataset` and evaluate `prompt` against it.
    ///
    /// Load failures are returned before any model call is made.
    pub async fn evaluate_dataset<D>(
        &self,
        dataset: &D,
        sample_size: Option<usize>,
        prompt: &str,
    ) -> Result<EvaluationReport, EvalError>
    where
        D: Dataset,
    {
        let items = dataset.load(sample_size).await?;
        log::info!("Loaded {} items from dataset '{}'", items.len(), dataset.name());
        Ok(self.evaluate(&items, prompt).await)
    }

    /// Evaluate `prompt` against `items`.
    pub async fn evaluate(&self, items: &[DatasetItem], prompt: &str) -> EvaluationReport {
        self.evaluate_with_progress(items, prompt, |_| {}).await
    }

    /// Evaluate `prompt` against `items`, reporting each finished item.
    ///
    /// Items are processed one at a time in dataset order. A model call that
    /// gives up yields an `"ERROR"` result and the run continues.
    pub async fn evaluate_with_progress<F>(
        &self,
        items: &[DatasetItem],
        prompt: &str,
        mut on_progress: F,
    ) -> EvaluationReport
    where
        F: FnMut(EvalProgress),
    {
        let start_time = Instant::now();
        let total = items.len();

        log::info!(
            "Evaluating {} items with model {} (match: {})",
            total,
            self.config.model,
            self.config.match_method
        );
        if !self.config.match_method.is_recognized() {
            log::warn!(
                "Unknown match method '{}' (expected contains, exact or fuzzy): no prediction will count as correct",
                self.config.match_method
            );
        }

        on_progress(EvalProgress::Started { total });

        let mut results = Vec::with_capacity(total);
        let mut correct_count = 0;

        for (index, item) in items.iter().enumerate() {
            let result = self.evaluate_item(index, item, prompt).await;
            if result.is_correct {
                correct_count += 1;
            }

            log::debug!(
                "Song {}/{}: {} Expected: {}, Predicted: {}",
                index + 1,
                total,
                if result.is_correct { "✓" } else { "✗" },
                result.expected_label,
                result.predicted_label
            );

            on_progress(EvalProgress::ItemCompleted {
                index,
                total,
                expected: result.expected_label.clone(),
                predicted: result.predicted_label.clone(),
                correct: result.is_correct,
                error: result.is_error(),
            });

            results.push(result);
            self.sleeper.sleep(self.config.inter_item_delay).await;
        }

        log::info!("Evaluation complete: {}/{} correct", correct_count, total);

        EvaluationReport::from_results(
            prompt.to_string(),
            self.config.model.clone(),
            self.config.match_method.clone(),
            results,
            start_time.elapsed(),
        )
    }

    async fn evaluate_item(&self, index: usize, item: &DatasetItem, prompt: &str) -> ItemResult {
        let combined_text = combine(&item.text, prompt);

        match self
            .caller
            .call_counted(&self.config.model, &combined_text, self.config.temperature)
            .await
        {
            Ok(answer) => {
                let is_correct = self
                    .config
                    .match_method
                    .matches(&item.expected_label, &answer.text);
                ItemResult::answered(index, item, answer.text, is_correct, answer.attempts)
            }
            Err(e) => {
                log::error!("Item {} failed: {}", index + 1, e);
                ItemResult::failed(index, item, e.source.to_string(), e.attempts)
            }
        }
    }
}

/// The text sent to the model for one item.
pub fn combine(text: &str, prompt: &str) -> String {
    format!("{}\n\n{}", text, prompt)
}
