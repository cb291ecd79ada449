//! Review queue filtering over exported results.

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use crate::error::BatchError;
use crate::pipeline::types::{Decision, EscalationPriority, ModerationResult};

/// Default number of results shown.
pub const DEFAULT_REVIEW_LIMIT: usize = 20;

/// Default confidence floor.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

/// Selects results worth a human look.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultFilter {
    pub decisions: BTreeSet<Decision>,
    pub priorities: BTreeSet<EscalationPriority>,
    pub min_confidence: f64,
    /// `None` shows everything that matches.
    pub limit: Option<usize>,
}

impl Default for ResultFilter {
    fn default() -> Self {
        Self {
            decisions: BTreeSet::from([Decision::Remove, Decision::EscalateToHuman]),
            priorities: BTreeSet::from([EscalationPriority::P0, EscalationPriority::P1]),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            limit: Some(DEFAULT_REVIEW_LIMIT),
        }
    }
}

impl ResultFilter {
    pub fn matches(&self, result: &ModerationResult) -> bool {
        self.decisions.contains(&result.overall_decision)
            && self.priorities.contains(&result.escalation_priority)
            && result.confidence_score >= self.min_confidence
    }

    /// Matching results in input order, up to the limit.
    pub fn apply<'a>(&self, results: &'a [ModerationResult]) -> Vec<&'a ModerationResult> {
        results
            .iter()
            .filter(|r| self.matches(r))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Parse exported results: an array, or an object with a `results` array.
///
/// Entries that do not parse as results are skipped with a warning.
pub fn parse_results(raw: &str) -> Result<Vec<ModerationResult>, BatchError> {
    let items = match serde_json::from_str::<Value>(raw)? {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(BatchError::UnsupportedShape(
                    "object without a \"results\" array".into(),
                ));
            }
        },
        _ => {
            return Err(BatchError::UnsupportedShape(
                "expected an array of results".into(),
            ));
        }
    };

    let mut results = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<ModerationResult>(item) {
            Ok(result) => results.push(result),
            Err(e) => warn!(index, error = %e, "Skipping unreadable result"),
        }
    }
    Ok(results)
}

/// Load results exported by a batch run.
pub async fn load_results(path: &Path) -> Result<Vec<ModerationResult>, BatchError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| BatchError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
    parse_results(&raw)
}
