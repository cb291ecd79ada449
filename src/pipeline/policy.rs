//! Decision policy as an ordered rule table over aggregated risk signals.
//!
//! Rules are evaluated top to bottom and the first match wins. The order is
//! part of the policy: a critical HIGH (rule 1) must escalate at P0 even when
//! it would also qualify for removal (rule 2).

use crate::pipeline::risk::{MEDIUM_RISK_THRESHOLD, RiskAggregate};
use crate::pipeline::types::{
    Action, CRITICAL_CATEGORIES, Category, Decision, EscalationPriority, REMOVABLE_CATEGORIES,
    RiskLevel,
};

/// Primary score above which removable categories are removed.
const REMOVE_THRESHOLD: f64 = 0.90;

/// Open interval of primary scores treated as ambiguous.
const AMBIGUOUS_RANGE: (f64, f64) = (0.5, 0.7);

/// Escalation notes switch from "borderline" to "policy sensitivity" here.
const BORDERLINE_NOTE_CEILING: f64 = 0.7;

/// Outcome of the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyOutcome {
    pub decision: Decision,
    pub action: Action,
    pub priority: EscalationPriority,
    /// Name of the rule that matched.
    pub rule: &'static str,
}

/// A single policy rule.
struct PolicyRule {
    name: &'static str,
    applies: fn(&RiskAggregate) -> bool,
    decision: Decision,
    action: Action,
    priority: EscalationPriority,
}

impl PolicyRule {
    fn outcome(&self) -> PolicyOutcome {
        PolicyOutcome {
            decision: self.decision,
            action: self.action,
            priority: self.priority,
            rule: self.name,
        }
    }
}

fn critical_high(agg: &RiskAggregate) -> bool {
    CRITICAL_CATEGORIES
        .iter()
        .any(|c| agg.bins.get(*c) == RiskLevel::High)
}

fn confident_removal(agg: &RiskAggregate) -> bool {
    agg.primary_score > REMOVE_THRESHOLD && REMOVABLE_CATEGORIES.contains(&agg.primary)
}

fn multiple_medium(agg: &RiskAggregate) -> bool {
    agg.bins.count(RiskLevel::Medium) >= 2
}

fn mature_content(agg: &RiskAggregate) -> bool {
    agg.bins.get(Category::SexualExplicit) == RiskLevel::Medium
        && agg.primary_score > MEDIUM_RISK_THRESHOLD
}

fn ambiguous_confidence(agg: &RiskAggregate) -> bool {
    AMBIGUOUS_RANGE.0 < agg.primary_score && agg.primary_score < AMBIGUOUS_RANGE.1
}

/// The rule table, in evaluation order.
const RULES: [PolicyRule; 5] = [
    PolicyRule {
        name: "critical_category_high",
        applies: critical_high,
        decision: Decision::EscalateToHuman,
        action: Action::EscalateForHumanReview,
        priority: EscalationPriority::P0,
    },
    PolicyRule {
        name: "confident_removal",
        applies: confident_removal,
        decision: Decision::Remove,
        action: Action::BlockAndReport,
        priority: EscalationPriority::P1,
    },
    PolicyRule {
        name: "multiple_medium_risks",
        applies: multiple_medium,
        decision: Decision::EscalateToHuman,
        action: Action::HoldForReview,
        priority: EscalationPriority::P2,
    },
    PolicyRule {
        name: "mature_content",
        applies: mature_content,
        decision: Decision::AgeRestrict,
        action: Action::AddAgeRestriction,
        priority: EscalationPriority::P3,
    },
    PolicyRule {
        name: "ambiguous_confidence",
        applies: ambiguous_confidence,
        decision: Decision::EscalateToHuman,
        action: Action::HoldForHumanReview,
        priority: EscalationPriority::P3,
    },
];

const DEFAULT_OUTCOME: PolicyOutcome = PolicyOutcome {
    decision: Decision::Approved,
    action: Action::ApproveContent,
    priority: EscalationPriority::P3,
    rule: "default_approve",
};

/// Run the rule table.
pub fn decide(agg: &RiskAggregate) -> PolicyOutcome {
    RULES
        .iter()
        .find(|rule| (rule.applies)(agg))
        .map(PolicyRule::outcome)
        .unwrap_or(DEFAULT_OUTCOME)
}

/// Templated notes for the human reviewer.
pub fn reviewer_notes(decision: Decision, primary: Category, primary_score: f64) -> String {
    let pct = percent(primary_score);
    match decision {
        Decision::Remove => format!(
            "High confidence {primary} detected ({pct}). Immediate removal recommended."
        ),
        Decision::AgeRestrict => format!(
            "Mature content detected ({primary}, {pct}). Age restriction recommended."
        ),
        Decision::EscalateToHuman if primary_score < BORDERLINE_NOTE_CEILING => format!(
            "Borderline confidence ({pct}). {primary} suspected. Requires human judgment."
        ),
        Decision::EscalateToHuman => format!(
            "High confidence {primary}. Escalated due to policy sensitivity. Manual review needed."
        ),
        Decision::NeedMoreContext => Decision::NeedMoreContext.description().to_string(),
        Decision::Approved => "Content passes all checks. No violations detected.".to_string(),
    }
}

/// 0.934 -> "93.4%"
fn percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::ScoreVector;

    fn aggregate(pairs: &[(Category, f64)]) -> RiskAggregate {
        RiskAggregate::from_scores(&ScoreVector::from_pairs(pairs.iter().copied()))
    }

    #[test]
    fn critical_high_escalates_p0() {
        let outcome = decide(&aggregate(&[(Category::SelfHarm, 1.0)]));
        assert_eq!(outcome.decision, Decision::EscalateToHuman);
        assert_eq!(outcome.action, Action::EscalateForHumanReview);
        assert_eq!(outcome.priority, EscalationPriority::P0);
        assert_eq!(outcome.rule, "critical_category_high");
    }

    #[test]
    fn critical_beats_removal() {
        // VIOLENCE_INCITEMENT at 0.95 satisfies rules 1 and 2.
        let outcome = decide(&aggregate(&[(Category::ViolenceIncitement, 0.95)]));
        assert_eq!(outcome.decision, Decision::EscalateToHuman);
        assert_eq!(outcome.priority, EscalationPriority::P0);
    }

    #[test]
    fn high_confidence_scam_removed() {
        let outcome = decide(&aggregate(&[(Category::ScamSpam, 0.95)]));
        assert_eq!(outcome.decision, Decision::Remove);
        assert_eq!(outcome.action, Action::BlockAndReport);
        assert_eq!(outcome.priority, EscalationPriority::P1);
    }

    #[test]
    fn high_harassment_is_not_removable() {
        // 0.95 HARASSMENT: not critical, not removable, one HIGH, zero MEDIUM.
        let outcome = decide(&aggregate(&[(Category::Harassment, 0.95)]));
        assert_eq!(outcome.decision, Decision::Approved);
    }

    #[test]
    fn removal_requires_strictly_above_ninety() {
        let outcome = decide(&aggregate(&[(Category::HateSpeech, 0.90)]));
        assert_ne!(outcome.decision, Decision::Remove);
    }

    #[test]
    fn two_mediums_hold_for_review() {
        let outcome = decide(&aggregate(&[
            (Category::Harassment, 0.7),
            (Category::MisinfoHighHarm, 0.65),
        ]));
        assert_eq!(outcome.decision, Decision::EscalateToHuman);
        assert_eq!(outcome.action, Action::HoldForReview);
        assert_eq!(outcome.priority, EscalationPriority::P2);
    }

    #[test]
    fn medium_sexual_content_age_restricted() {
        let outcome = decide(&aggregate(&[(Category::SexualExplicit, 0.75)]));
        assert_eq!(outcome.decision, Decision::AgeRestrict);
        assert_eq!(outcome.action, Action::AddAgeRestriction);
        assert_eq!(outcome.priority, EscalationPriority::P3);
    }

    #[test]
    fn ambiguous_scores_held() {
        let outcome = decide(&RiskAggregate::from_scores(&ScoreVector::uniform(0.55)));
        assert_eq!(outcome.decision, Decision::EscalateToHuman);
        assert_eq!(outcome.action, Action::HoldForHumanReview);
        assert_eq!(outcome.priority, EscalationPriority::P3);
    }

    #[test]
    fn ambiguous_range_is_open() {
        for score in [0.5, 0.7] {
            let outcome = decide(&aggregate(&[(Category::Harassment, score)]));
            assert_eq!(outcome.decision, Decision::Approved, "score {score}");
        }
    }

    #[test]
    fn low_scores_approved() {
        let outcome = decide(&RiskAggregate::from_scores(&ScoreVector::uniform(0.3)));
        assert_eq!(outcome, DEFAULT_OUTCOME);
    }

    #[test]
    fn notes_follow_templates() {
        assert_eq!(
            reviewer_notes(Decision::Remove, Category::ScamSpam, 0.934),
            "High confidence SCAM_SPAM detected (93.4%). Immediate removal recommended."
        );
        assert_eq!(
            reviewer_notes(Decision::AgeRestrict, Category::SexualExplicit, 0.75),
            "Mature content detected (SEXUAL_EXPLICIT, 75.0%). Age restriction recommended."
        );
        assert_eq!(
            reviewer_notes(Decision::EscalateToHuman, Category::HateSpeech, 0.55),
            "Borderline confidence (55.0%). HATE_SPEECH suspected. Requires human judgment."
        );
        assert_eq!(
            reviewer_notes(Decision::EscalateToHuman, Category::SelfHarm, 1.0),
            "High confidence SELF_HARM. Escalated due to policy sensitivity. Manual review needed."
        );
        assert_eq!(
            reviewer_notes(Decision::Approved, Category::HateSpeech, 0.1),
            "Content passes all checks. No violations detected."
        );
    }
}
