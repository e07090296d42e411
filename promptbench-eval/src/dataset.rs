//! Dataset loading for evaluation.
//!
//! Provides the [`Dataset`] trait, a loader for JSON / JSON Lines files and an
//! in-memory dataset.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors that can occur when loading datasets.
///
/// Any of these is fatal: no item of the dataset is evaluated.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DatasetError {
    /// Failed to read dataset file
    #[error("Failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse dataset
    #[error("Failed to parse dataset{}: {message}", line_suffix(.line))]
    Parse {
        /// 1-based line for JSON Lines input
        line: Option<usize>,
        message: String,
    },

    /// A record lacks a required field or has it set to null
    #[error("Record {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    /// A record sets one field under more than one of its accepted names
    #[error("Record {index} sets '{field}' more than once (keys: {})", .keys.join(", "))]
    AmbiguousField {
        index: usize,
        field: &'static str,
        keys: Vec<String>,
    },

    /// File extension is neither `.json` nor `.jsonl`
    #[error("Unsupported dataset format: {0} (expected .json or .jsonl)")]
    UnsupportedFormat(String),
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" (line {})", l)).unwrap_or_default()
}

/// A text sample and the label the model should produce for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetItem {
    /// The sample shown to the model (song lyrics)
    pub text: String,
    /// The ground-truth label (genre)
    pub expected_label: String,
}

impl DatasetItem {
    pub fn new(text: impl Into<String>, expected_label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expected_label: expected_label.into(),
        }
    }
}

/// Trait for evaluation datasets.
pub trait Dataset: Send + Sync {
    /// The name of this dataset (used in reports).
    fn name(&self) -> &str;

    /// Load items from the dataset.
    ///
    /// If `sample_size` is specified, return at most that many items, taken
    /// from the front.
    fn load(
        &self,
        sample_size: Option<usize>,
    ) -> impl std::future::Future<Output = Result<Vec<DatasetItem>, DatasetError>> + Send;
}

/// Accepted keys for the sample text, canonical name first. The last one is
/// the spreadsheet column name.
const TEXT_KEYS: &[&str] = &["text", "lyrics", "Lyrics (4-8 lines, 50-100 words)"];

/// Accepted keys for the ground-truth label, canonical name first.
const LABEL_KEYS: &[&str] = &["expected_label", "label", "genre", "Genre"];

/// Turn one on-disk record into an item.
///
/// Each field may appear under any of its accepted keys, but only once; a
/// null value counts as absent.
fn record_to_item(
    record: &Map<String, Value>,
    index: usize,
    line: Option<usize>,
) -> Result<DatasetItem, DatasetError> {
    Ok(DatasetItem {
        text: required_field(record, index, line, "text", TEXT_KEYS)?,
        expected_label: required_field(record, index, line, "expected_label", LABEL_KEYS)?,
    })
}

fn required_field(
    record: &Map<String, Value>,
    index: usize,
    line: Option<usize>,
    field: &'static str,
    keys: &[&str],
) -> Result<String, DatasetError> {
    let present: Vec<(&str, &Value)> = keys
        .iter()
        .filter_map(|key| record.get(*key).map(|value| (*key, value)))
        .filter(|(_, value)| !value.is_null())
        .collect();

    match present.as_slice() {
        [] => Err(DatasetError::MissingField { index, field }),
        [(_, Value::String(value))] => Ok(value.clone()),
        [(key, _)] => Err(DatasetError::Parse {
            line,
            message: format!("record {}: '{}' must be a string", index, key),
        }),
        _ => Err(DatasetError::AmbiguousField {
            index,
            field,
            keys: present.iter().map(|(key, _)| key.to_string()).collect(),
        }),
    }
}

/// Parse a JSON array of records.
pub fn parse_json(content: &str) -> Result<Vec<DatasetItem>, DatasetError> {
    let records: Vec<Map<String, Value>> =
        serde_json::from_str(content).map_err(|e| DatasetError::Parse {
            line: None,
            message: e.to_string(),
        })?;

    records
        .iter()
        .enumerate()
        .map(|(index, record)| record_to_item(record, index, None))
        .collect()
}

/// Parse one JSON record per line. Blank lines are skipped.
pub fn parse_jsonl(content: &str) -> Result<Vec<DatasetItem>, DatasetError> {
    let mut items = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: Map<String, Value> =
            serde_json::from_str(line).map_err(|e| DatasetError::Parse {
                line: Some(line_num + 1),
                message: e.to_string(),
            })?;
        items.push(record_to_item(&record, items.len(), Some(line_num + 1))?);
    }

    Ok(items)
}

/// Dataset backed by a `.json` or `.jsonl` file.
///
/// # Example
///
/// ```no_run
/// use promptbench_eval::{Dataset, JsonFileDataset};
/// use std::path::PathBuf;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let dataset = JsonFileDataset::new(PathBuf::from("songs.jsonl"));
/// let items = dataset.load(Some(10)).await?;
/// println!("Loaded {} songs", items.len());
/// # Ok(())
/// # }
/// ```
pub struct JsonFileDataset {
    path: PathBuf,
    name: String,
}

impl JsonFileDataset {
    /// Create a dataset from a file; the name is the file stem.
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("dataset")
            .to_string();

        Self { path, name }
    }

    /// Create a dataset with a custom name.
    pub fn with_name(path: PathBuf, name: String) -> Self {
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Dataset for JsonFileDataset {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, sample_size: Option<usize>) -> Result<Vec<DatasetItem>, DatasetError> {
        let extension = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let parse: fn(&str) -> Result<Vec<DatasetItem>, DatasetError> = match extension.as_str() {
            "json" => parse_json,
            "jsonl" => parse_jsonl,
            _ => {
                return Err(DatasetError::UnsupportedFormat(
                    self.path.display().to_string(),
                ))
            }
        };

        let content = fs::read_to_string(&self.path).await?;
        let mut items = parse(&content)?;

        if let Some(size) = sample_size {
            items.truncate(size);
        }

        log::debug!("Loaded {} items from {}", items.len(), self.path.display());
        Ok(items)
    }
}

/// Dataset that hands out a fixed list of items.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    name: String,
    items: Vec<DatasetItem>,
}

impl InMemoryDataset {
    pub fn new(name: impl Into<String>, items: Vec<DatasetItem>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }
}

impl Dataset for InMemoryDataset {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, sample_size: Option<usize>) -> Result<Vec<DatasetItem>, DatasetError> {
        let take = sample_size.unwrap_or(self.items.len());
        Ok(self.items.iter().take(take).cloned().collect())
    }
}
