//! Batch files and batch reports.
//!
//! Input is a JSON array of shorts, or an object with a `shorts` array.
//! Items stay as raw JSON until the pipeline validates them, so one bad item
//! never prevents the rest of the file from loading.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::BatchError;
use crate::pipeline::types::{Decision, ModerationResult};

/// An input item that produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    /// Position in the input.
    pub index: usize,
    /// Present when the item carried a string `short_id`.
    pub short_id: Option<String>,
    pub reason: String,
}

/// Outcome of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub processing_timestamp: DateTime<Utc>,
    pub total_processed: usize,
    /// Results in input order, skipped items omitted.
    pub results: Vec<ModerationResult>,
    /// Result count per decision. Every decision has an entry.
    pub summary_stats: BTreeMap<Decision, usize>,
    #[serde(default)]
    pub skipped: Vec<SkippedItem>,
}

impl BatchReport {
    pub fn new(results: Vec<ModerationResult>, skipped: Vec<SkippedItem>) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            processing_timestamp: Utc::now(),
            total_processed: results.len(),
            summary_stats: summarize(&results),
            results,
            skipped,
        }
    }

    /// Number of input items, processed or skipped.
    pub fn total_items(&self) -> usize {
        self.total_processed + self.skipped.len()
    }
}

/// Count results per decision, with zero entries for unused decisions.
pub fn summarize(results: &[ModerationResult]) -> BTreeMap<Decision, usize> {
    let mut stats: BTreeMap<Decision, usize> = Decision::ALL.into_iter().map(|d| (d, 0)).collect();
    for result in results {
        *stats.entry(result.overall_decision).or_default() += 1;
    }
    stats
}

/// Split a batch document into raw items.
pub fn parse_batch(raw: &str) -> Result<Vec<Value>, BatchError> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("shorts") {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(BatchError::UnsupportedShape(
                "\"shorts\" must be an array".into(),
            )),
            None => Err(BatchError::UnsupportedShape(
                "object without a \"shorts\" array".into(),
            )),
        },
        other => Err(BatchError::UnsupportedShape(format!(
            "expected an array or object, found {}",
            json_kind(&other)
        ))),
    }
}

/// Read and split a batch file.
pub async fn load_batch(path: &Path) -> Result<Vec<Value>, BatchError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| io_error(path, e))?;
    parse_batch(&raw)
}

/// Read a file holding a single short.
pub async fn load_short(path: &Path) -> Result<Value, BatchError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| io_error(path, e))?;
    match serde_json::from_str::<Value>(&raw)? {
        item @ Value::Object(_) => Ok(item),
        other => Err(BatchError::UnsupportedShape(format!(
            "expected one short as an object, found {}",
            json_kind(&other)
        ))),
    }
}

/// Write results as a pretty-printed JSON array.
pub async fn write_results(path: &Path, results: &[ModerationResult]) -> Result<(), BatchError> {
    write_json(path, results).await
}

/// Write the full batch report.
pub async fn write_report(path: &Path, report: &BatchReport) -> Result<(), BatchError> {
    write_json(path, report).await
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), BatchError> {
    let json = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: std::io::Error) -> BatchError {
    BatchError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
