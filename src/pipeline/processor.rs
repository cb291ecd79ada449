//! Moderation pipeline: runs one short through every stage.
//!
//! Flow:
//! 1. Normalizer → context string
//! 2. Guardrails (fast, no classifier) → may short-circuit scoring
//! 3. Category scorer → classifier scores, keyword boost
//! 4. Risk aggregation → bins + primary violation
//! 5. Decision policy → decision, action, priority
//! 6. Result assembly

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::classifier::{HttpZeroShotClassifier, ZeroShotClassifier};
use crate::config::ModeratorConfig;
use crate::Result;
use crate::error::InputError;
use crate::pipeline::assembler::assemble;
use crate::pipeline::batch::{BatchReport, SkippedItem, load_short};
use crate::pipeline::guardrails::{GuardrailMatcher, GuardrailOutcome};
use crate::pipeline::normalize::normalize_short;
use crate::pipeline::policy::decide;
use crate::pipeline::risk::RiskAggregate;
use crate::pipeline::scorer::CategoryScorer;
use crate::pipeline::types::{ModerationResult, ShortInput};

/// The moderation pipeline.
///
/// Built once and shared; every component is read-only after construction,
/// so `process` can run concurrently from many tasks.
pub struct ModerationPipeline {
    guardrails: GuardrailMatcher,
    scorer: CategoryScorer,
    max_concurrency: usize,
}

impl ModerationPipeline {
    pub fn new(guardrails: GuardrailMatcher, scorer: CategoryScorer, max_concurrency: usize) -> Self {
        Self {
            guardrails,
            scorer,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Build the pipeline from configuration.
    ///
    /// Without a classifier URL the pipeline still runs, scoring every
    /// non-guardrail item at the neutral fallback.
    pub fn from_config(config: &ModeratorConfig) -> Result<Self> {
        let classifier: Option<Arc<dyn ZeroShotClassifier>> = match &config.classifier_url {
            Some(url) => {
                info!(model = %config.model, endpoint = %url, "Using HTTP zero-shot classifier");
                Some(Arc::new(HttpZeroShotClassifier::new(
                    url.clone(),
                    config.model.clone(),
                    config.classifier_token.clone(),
                    config.classifier_timeout,
                )?))
            }
            None => {
                warn!("MODERATOR_CLASSIFIER_URL not set, classifier scores fall back to neutral");
                None
            }
        };

        let scorer = CategoryScorer::new(classifier, config.max_concurrency, config.scoring);
        Ok(Self::new(
            GuardrailMatcher::new()?,
            scorer,
            config.max_concurrency,
        ))
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Moderate one short.
    ///
    /// Only invalid input is an error; classifier trouble degrades scoring.
    pub async fn process(&self, input: ShortInput) -> Result<ModerationResult, InputError> {
        let input = input.validate()?;
        info!(
            short_id = %input.short_id,
            channel = %input.channel_name,
            "Moderating short"
        );

        let normalized = normalize_short(&input);

        let guardrail = self.guardrails.check(&normalized.context);
        if let GuardrailOutcome::Fired { group, category, .. } = &guardrail {
            debug!(
                short_id = %input.short_id,
                group = group.name(),
                category = %category,
                "Guardrail matched, skipping classifier"
            );
        }

        let scored = self.scorer.score(&normalized.context, &guardrail).await;
        let aggregate = RiskAggregate::from_scores(&scored.scores);
        let outcome = decide(&aggregate);
        let result = assemble(&input.short_id, &scored, &aggregate, &outcome);

        info!(
            short_id = %result.short_id,
            decision = %result.overall_decision,
            priority = %result.escalation_priority,
            primary = %result.primary_violation,
            confidence = result.confidence_score,
            rule = outcome.rule,
            source = ?scored.source,
            "Moderation complete"
        );
        Ok(result)
    }

    /// Validate a raw JSON item, then moderate it.
    pub async fn process_value(&self, value: Value) -> Result<ModerationResult, InputError> {
        let input = ShortInput::from_value(value)?;
        self.process(input).await
    }

    /// Load one short from a JSON file and moderate it.
    pub async fn process_file(&self, path: &Path) -> Result<ModerationResult> {
        let value = load_short(path).await?;
        debug!(path = %path.display(), "Loaded short");
        Ok(self.process_value(value).await?)
    }

    /// Moderate a batch of raw items.
    ///
    /// Items run with bounded concurrency and come back in input order.
    /// Invalid items are skipped and reported; they never affect siblings.
    /// So is any item whose `short_id` already appeared earlier in the batch.
    pub async fn process_batch(&self, items: Vec<Value>) -> BatchReport {
        let count = items.len();
        info!(count, max_concurrency = self.max_concurrency, "Processing batch");

        // Later items reusing an earlier short_id are skipped.
        let mut seen = HashSet::new();
        let items: Vec<_> = items
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                let short_id = value
                    .get("short_id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let duplicate = short_id.as_ref().is_some_and(|id| !seen.insert(id.clone()));
                (index, short_id, duplicate, value)
            })
            .collect();

        let outcomes: Vec<_> = stream::iter(items)
            .map(|(index, short_id, duplicate, value)| async move {
                let outcome = match (&short_id, duplicate) {
                    (Some(id), true) => Err(InputError::DuplicateShortId(id.clone())),
                    _ => self.process_value(value).await,
                };
                (index, short_id, outcome)
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut results = Vec::with_capacity(count);
        let mut skipped = Vec::new();
        for (index, short_id, outcome) in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(
                        index,
                        short_id = short_id.as_deref().unwrap_or("<unknown>"),
                        error = %e,
                        "Skipping invalid item in batch"
                    );
                    skipped.push(SkippedItem {
                        index,
                        short_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let report = BatchReport::new(results, skipped);
        info!(
            batch_id = %report.batch_id,
            processed = report.total_processed,
            skipped = report.skipped.len(),
            total = count,
            "Batch processing complete"
        );
        report
    }
}
