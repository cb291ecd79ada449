//! Result assembly.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::pipeline::policy::{PolicyOutcome, reviewer_notes};
use crate::pipeline::risk::RiskAggregate;
use crate::pipeline::scorer::ScoreOutcome;
use crate::pipeline::types::{Category, CategoryScore, ModerationResult};

/// Build the final result from the stage outputs.
///
/// Every category gets an entry. Evidence comes from the scorer unchanged:
/// a guardrail hit only ever attaches evidence to its own category.
pub fn assemble(
    short_id: &str,
    scored: &ScoreOutcome,
    aggregate: &RiskAggregate,
    outcome: &PolicyOutcome,
) -> ModerationResult {
    let categories: BTreeMap<Category, CategoryScore> = scored
        .scores
        .iter()
        .map(|(category, score)| {
            let entry = CategoryScore {
                risk_level: aggregate.bins.get(category),
                score,
                evidence: scored.evidence.get(&category).cloned().unwrap_or_default(),
            };
            (category, entry)
        })
        .collect();

    ModerationResult {
        short_id: short_id.to_string(),
        overall_decision: outcome.decision,
        confidence_score: scored.scores.max(),
        primary_violation: aggregate.primary,
        categories,
        action_recommendation: outcome.action,
        escalation_priority: outcome.priority,
        notes_for_human_reviewer: reviewer_notes(
            outcome.decision,
            aggregate.primary,
            aggregate.primary_score,
        ),
        processing_timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::policy::decide;
    use crate::pipeline::scorer::ScoreSource;
    use crate::pipeline::types::{Decision, RiskLevel, ScoreVector};

    fn build(scored: ScoreOutcome) -> ModerationResult {
        let aggregate = RiskAggregate::from_scores(&scored.scores);
        let outcome = decide(&aggregate);
        assemble("s1", &scored, &aggregate, &outcome)
    }

    #[test]
    fn guardrail_evidence_only_on_primary() {
        let result = build(ScoreOutcome {
            scores: ScoreVector::saturated(Category::HateSpeech),
            evidence: BTreeMap::from([(Category::HateSpeech, vec!["kike".to_string()])]),
            source: ScoreSource::Guardrail,
        });

        assert_eq!(result.categories.len(), Category::COUNT);
        assert_eq!(result.primary_violation, Category::HateSpeech);
        assert_eq!(result.confidence_score, 1.0);
        assert_eq!(result.overall_decision, Decision::Remove);
        for (category, entry) in &result.categories {
            if *category == Category::HateSpeech {
                assert_eq!(entry.evidence, vec!["kike".to_string()]);
                assert_eq!(entry.risk_level, RiskLevel::High);
            } else {
                assert!(entry.evidence.is_empty());
                assert_eq!(entry.score, 0.0);
            }
        }
    }

    #[test]
    fn confidence_is_max_score() {
        let scores = ScoreVector::from_pairs([
            (Category::Harassment, 0.31),
            (Category::MisinfoHighHarm, 0.47),
        ]);
        let result = build(ScoreOutcome {
            scores,
            evidence: BTreeMap::new(),
            source: ScoreSource::Classifier,
        });
        assert_eq!(result.confidence_score, 0.47);
        assert_eq!(result.primary_violation, Category::MisinfoHighHarm);
        assert_eq!(
            result.notes_for_human_reviewer,
            "Content passes all checks. No violations detected."
        );
    }
}
