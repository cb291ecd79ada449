//! HTTP zero-shot classifier backed by a hosted NLI inference endpoint.
//!
//! Speaks the Hugging Face Inference API zero-shot shape:
//! request `{"inputs", "parameters": {"candidate_labels", "multi_label"}}`,
//! response `{"labels": [...], "scores": [...]}`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::{HypothesisScore, ZeroShotClassifier};
use crate::error::{ClassifierError, ConfigError};

#[derive(Debug, Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a str,
    parameters: ZeroShotParameters<'a>,
}

#[derive(Debug, Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [&'a str],
    multi_label: bool,
}

#[derive(Debug, Deserialize)]
struct ZeroShotResponse {
    labels: Vec<String>,
    scores: Vec<f64>,
}

/// Zero-shot classifier backed by an HTTP inference endpoint.
pub struct HttpZeroShotClassifier {
    endpoint: String,
    model: String,
    token: Option<SecretString>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpZeroShotClassifier {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            model: model.into(),
            token,
            timeout,
            client,
        })
    }

    fn request_failed(&self, e: reqwest::Error) -> ClassifierError {
        if e.is_timeout() {
            ClassifierError::Timeout {
                model: self.model.clone(),
                timeout: self.timeout,
            }
        } else {
            ClassifierError::RequestFailed {
                model: self.model.clone(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ZeroShotClassifier for HttpZeroShotClassifier {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn classify(
        &self,
        text: &str,
        hypotheses: &[&str],
    ) -> Result<Vec<HypothesisScore>, ClassifierError> {
        let body = ZeroShotRequest {
            inputs: text,
            parameters: ZeroShotParameters {
                candidate_labels: hypotheses,
                multi_label: true,
            },
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let resp = request.send().await.map_err(|e| self.request_failed(e))?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(ClassifierError::RequestFailed {
                model: self.model.clone(),
                reason: format!("HTTP {status}: {}", truncate(&detail, 200)),
            });
        }

        let parsed: ZeroShotResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                self.request_failed(e)
            } else {
                ClassifierError::InvalidResponse {
                    model: self.model.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        debug!(model = %self.model, labels = parsed.labels.len(), "Zero-shot response received");
        pair_labels(&self.model, parsed)
    }
}

fn pair_labels(model: &str, response: ZeroShotResponse) -> Result<Vec<HypothesisScore>, ClassifierError> {
    if response.labels.len() != response.scores.len() {
        return Err(ClassifierError::InvalidResponse {
            model: model.to_string(),
            reason: format!(
                "{} labels but {} scores",
                response.labels.len(),
                response.scores.len()
            ),
        });
    }

    Ok(response
        .labels
        .into_iter()
        .zip(response.scores)
        .map(|(label, score)| HypothesisScore { label, score })
        .collect())
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
