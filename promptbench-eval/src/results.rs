//! Evaluation results and report types.
//!
//! Designed for JSON serialization and programmatic consumption.

use crate::dataset::DatasetItem;
use crate::matcher::MatchMethod;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Predicted label recorded when the model could not be reached.
pub const ERROR_LABEL: &str = "ERROR";

/// Outcome for one dataset item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    /// 0-based position in the dataset
    pub index: usize,

    /// The text that was classified
    pub original_text: String,

    /// Ground-truth label
    pub expected_label: String,

    /// Trimmed model answer, or [`ERROR_LABEL`]
    pub predicted_label: String,

    /// Whether the answer matched under the run's match method
    pub is_correct: bool,

    /// Endpoint calls made for this item
    pub attempts: u32,

    /// Final failure message when the model call gave up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemResult {
    /// Result for an item whose model call returned an answer.
    pub fn answered(
        index: usize,
        item: &DatasetItem,
        predicted: String,
        is_correct: bool,
        attempts: u32,
    ) -> Self {
        Self {
            index,
            original_text: item.text.clone(),
            expected_label: item.expected_label.clone(),
            predicted_label: predicted,
            is_correct,
            attempts,
            error: None,
        }
    }

    /// Result for an item whose model call exhausted its retries.
    pub fn failed(index: usize, item: &DatasetItem, error: String, attempts: u32) -> Self {
        Self {
            index,
            original_text: item.text.clone(),
            expected_label: item.expected_label.clone(),
            predicted_label: ERROR_LABEL.to_string(),
            is_correct: false,
            attempts,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregated outcome of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// The prompt appended to every item
    pub prompt: String,

    /// Endpoint model identifier
    pub model_id: String,

    /// Matching policy used for every item
    pub match_method: MatchMethod,

    /// Number of items judged correct
    pub correct_count: usize,

    /// Number of items evaluated
    pub total_count: usize,

    /// Items whose model call gave up
    pub error_count: usize,

    /// `100 * correct / total`, or 0 for an empty run
    pub score_percent: f64,

    /// Per-item results in dataset order
    pub items: Vec<ItemResult>,

    /// Wall clock of the whole run
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

impl EvaluationReport {
    /// Build a report, deriving every count from `items`.
    pub fn from_results(
        prompt: String,
        model_id: String,
        match_method: MatchMethod,
        items: Vec<ItemResult>,
        total_duration: Duration,
    ) -> Self {
        let total_count = items.len();
        let correct_count = items.iter().filter(|r| r.is_correct).count();
        let error_count = items.iter().filter(|r| r.is_error()).count();

        Self {
            prompt,
            model_id,
            match_method,
            correct_count,
            total_count,
            error_count,
            score_percent: score_percent(correct_count, total_count),
            items,
            total_duration,
        }
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

/// Percentage of correct items; 0 when nothing was evaluated.
pub fn score_percent(correct: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64 * 100.0
    }
}

/// Serde helper for Duration (as seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
