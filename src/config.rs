//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::pipeline::scorer::ScoringOptions;

/// Default zero-shot model.
pub const DEFAULT_MODEL: &str = "facebook/bart-large-mnli";

/// Moderator configuration.
#[derive(Debug, Clone)]
pub struct ModeratorConfig {
    /// Zero-shot inference endpoint. Unset means degraded (neutral) scoring.
    pub classifier_url: Option<String>,
    /// Bearer token for the inference endpoint.
    pub classifier_token: Option<SecretString>,
    /// Model name, for logging and reporting.
    pub model: String,
    /// Per-request timeout for classifier calls.
    pub classifier_timeout: Duration,
    /// Batch workers, and the number of classifier calls allowed in flight.
    pub max_concurrency: usize,
    pub scoring: ScoringOptions,
    /// Directory for rolling log files.
    pub log_dir: Option<PathBuf>,
}

impl Default for ModeratorConfig {
    fn default() -> Self {
        Self {
            classifier_url: None,
            classifier_token: None,
            model: DEFAULT_MODEL.to_string(),
            classifier_timeout: Duration::from_secs(30),
            max_concurrency: 4,
            scoring: ScoringOptions::default(),
            log_dir: None,
        }
    }
}

impl ModeratorConfig {
    /// Read configuration from `MODERATOR_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Unset or blank values take their defaults; values that are present but
    /// unparseable are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let timeout_secs: u64 = parse_var(&get, "MODERATOR_CLASSIFIER_TIMEOUT_SECS")?
            .unwrap_or(defaults.classifier_timeout.as_secs());
        if timeout_secs == 0 {
            return Err(invalid("MODERATOR_CLASSIFIER_TIMEOUT_SECS", "must be at least 1"));
        }

        let max_concurrency: usize =
            parse_var(&get, "MODERATOR_MAX_CONCURRENCY")?.unwrap_or(defaults.max_concurrency);
        if max_concurrency == 0 {
            return Err(invalid("MODERATOR_MAX_CONCURRENCY", "must be at least 1"));
        }

        let scoring = ScoringOptions {
            keyword_evidence: parse_flag(&get, "MODERATOR_KEYWORD_EVIDENCE")?,
            safe_context_dampening: parse_flag(&get, "MODERATOR_SAFE_CONTEXT_DAMPENING")?,
        };

        Ok(Self {
            classifier_url: get("MODERATOR_CLASSIFIER_URL"),
            classifier_token: get("MODERATOR_CLASSIFIER_TOKEN").map(SecretString::from),
            model: get("MODERATOR_MODEL").unwrap_or(defaults.model),
            classifier_timeout: Duration::from_secs(timeout_secs),
            max_concurrency,
            scoring,
            log_dir: get("MODERATOR_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| invalid(key, format!("{raw:?}: {e}")))
        })
        .transpose()
}

fn parse_flag<G>(get: &G, key: &str) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(invalid(key, format!("{other:?} is not a boolean"))),
    }
}
