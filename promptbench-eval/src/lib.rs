//! # Promptbench Eval
//!
//! Scores a natural-language prompt by how well it steers a model to label a
//! dataset, e.g. naming the genre of song lyrics.
//!
//! ## Overview
//!
//! - **Datasets**: load `{text, expected_label}` records from JSON or JSON Lines
//! - **Matcher**: `exact`, `contains` or `fuzzy` comparison of answer and label
//! - **Harness**: sequential per-item model calls with bounded retries
//! - **Report**: framed score, per-item details, text transcript and JSON
//!
//! ## Architecture
//!
//! ```text
//! promptbench-core (completion client, retry, model caller)
//!     ↓
//! promptbench-eval (datasets, matcher, harness, report)  ← this crate
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use promptbench_core::{LlmConfig, ModelCaller, OpenAiClient};
//! use promptbench_eval::{print_report, EvalConfig, EvalHarness, JsonFileDataset, MatchMethod};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let llm = LlmConfig::default();
//! let client = OpenAiClient::new("sk-...", llm.clone())?;
//! let harness = EvalHarness::new(
//!     ModelCaller::from_config(Arc::new(client), &llm),
//!     EvalConfig::from_llm_config(&llm).with_match_method(MatchMethod::Fuzzy),
//! );
//!
//! let dataset = JsonFileDataset::new(PathBuf::from("songs.json"));
//! let report = harness
//!     .evaluate_dataset(&dataset, None, "Reply with the music genre only.")
//!     .await?;
//!
//! print_report(&report, true);
//! report.write_json(std::path::Path::new("results.json"))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dataset;
pub mod harness;
pub mod matcher;
pub mod report;
pub mod results;

// Re-export public API
pub use config::{ConfigError, ConfigLoader, EvalToml, LlmToml, PromptbenchConfig};
pub use dataset::{
    parse_json, parse_jsonl, Dataset, DatasetError, DatasetItem, InMemoryDataset, JsonFileDataset,
};
pub use harness::{combine, EvalConfig, EvalError, EvalHarness, EvalProgress};
pub use matcher::{matches, similarity, MatchMethod, FUZZY_THRESHOLD};
pub use report::{
    print_report, render_details, render_score, render_summary, render_transcript,
    write_transcript,
};
pub use results::{score_percent, EvaluationReport, ItemResult, ERROR_LABEL};
