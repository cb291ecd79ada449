//! Error types for the moderation pipeline.

use std::time::Duration;

/// Top-level error type for whole-pipeline operations.
///
/// Classifier failures never appear here; the scorer absorbs them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),
}

/// Configuration-related errors. All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Guardrail pattern in group {group} failed to compile: {source}")]
    InvalidPattern {
        group: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to build classifier client: {0}")]
    Client(String),
}

/// Per-item input validation errors.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("short_id must not be empty")]
    EmptyShortId,

    #[error("Duration must be between 1 and 3600 seconds, got {value}")]
    DurationOutOfRange { value: i64 },

    #[error("Duplicate short_id {0} in batch")]
    DuplicateShortId(String),

    #[error("Malformed item: {0}")]
    Malformed(String),
}

/// Failures of the external classification capability.
///
/// None of these reach callers of the pipeline: the scorer logs them and
/// falls back to neutral scores.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("No classifier configured")]
    Unavailable,

    #[error("Classifier {model} request failed: {reason}")]
    RequestFailed { model: String, reason: String },

    #[error("Classifier {model} timed out after {timeout:?}")]
    Timeout { model: String, timeout: Duration },

    #[error("Invalid response from {model}: {reason}")]
    InvalidResponse { model: String, reason: String },

    #[error("Classifier returned unknown hypothesis label: {label}")]
    UnknownLabel { label: String },

    #[error("Classifier output is missing category {category}")]
    MissingCategory { category: String },

    #[error("Classifier score {score} for {category} is outside [0, 1]")]
    ScoreOutOfRange { category: String, score: f64 },
}

/// Batch file errors. Per-item problems are reported as skips, not as these.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported batch shape: {0}")]
    UnsupportedShape(String),
}

/// A wire name that does not correspond to any variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Result type alias for the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
