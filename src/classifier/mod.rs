//! External zero-shot classification capability.
//!
//! The pipeline only depends on the `ZeroShotClassifier` trait. The HTTP
//! adapter talks to a hosted NLI model; tests plug in deterministic stubs.

pub mod http;

pub use http::HttpZeroShotClassifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;

/// Probability that a text entails one hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisScore {
    /// The hypothesis sentence, exactly as it was sent.
    pub label: String,
    /// Independent (multi-label) probability in [0, 1].
    pub score: f64,
}

impl HypothesisScore {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Scores a text against a set of natural-language hypotheses.
///
/// Implementations return one entry per hypothesis, in any order. Callers
/// re-map results by label, never by position. Implementations enforce their
/// own call timeout and report expiry as an error.
#[async_trait]
pub trait ZeroShotClassifier: Send + Sync {
    /// Model identifier (for logging).
    fn model_name(&self) -> &str;

    /// Score `text` against each hypothesis independently.
    async fn classify(
        &self,
        text: &str,
        hypotheses: &[&str],
    ) -> Result<Vec<HypothesisScore>, ClassifierError>;
}
