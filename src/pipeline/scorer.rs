//! Category scoring.
//!
//! A fired guardrail fixes the scores outright. Otherwise the truncated
//! context goes to the zero-shot classifier, results are re-mapped by
//! hypothesis, and a small keyword boost is applied on top. Any classifier
//! problem degrades to neutral scores rather than failing the item.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::classifier::{HypothesisScore, ZeroShotClassifier};
use crate::error::ClassifierError;
use crate::pipeline::guardrails::GuardrailOutcome;
use crate::pipeline::types::{Category, ScoreVector};

/// Characters of context the classifier sees.
pub const MAX_CLASSIFIER_INPUT_CHARS: usize = 512;

/// Score for every category when the classifier cannot be used.
pub const NEUTRAL_FALLBACK_SCORE: f64 = 0.5;

/// Boost per matched keyword.
pub const BOOST_PER_MATCH: f64 = 0.05;

/// Cap on the total keyword boost for one category.
pub const MAX_BOOST: f64 = 0.15;

/// Multiplier applied to classifier scores in gaming/news/education contexts.
pub const SAFE_CONTEXT_MULTIPLIER: f64 = 0.6;

/// Opt-in scoring behaviour. Everything is off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoringOptions {
    /// Report matched boost keywords and soft indicator phrases as evidence.
    pub keyword_evidence: bool,
    /// Dampen classifier scores when the context looks like gaming, news or
    /// educational material.
    pub safe_context_dampening: bool,
}

/// Where a score vector came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    Guardrail,
    Classifier,
    Fallback,
}

/// Scores plus any evidence collected while producing them.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub scores: ScoreVector,
    pub evidence: BTreeMap<Category, Vec<String>>,
    pub source: ScoreSource,
}

/// Produces a score vector for one context.
///
/// Classifier calls are gated by a semaphore so that concurrent pipeline
/// invocations never exceed the configured number of in-flight requests.
pub struct CategoryScorer {
    classifier: Option<Arc<dyn ZeroShotClassifier>>,
    permits: Arc<Semaphore>,
    options: ScoringOptions,
}

impl CategoryScorer {
    pub fn new(
        classifier: Option<Arc<dyn ZeroShotClassifier>>,
        max_concurrent_calls: usize,
        options: ScoringOptions,
    ) -> Self {
        Self {
            classifier,
            permits: Arc::new(Semaphore::new(max_concurrent_calls.max(1))),
            options,
        }
    }

    /// Score a context. Never fails.
    pub async fn score(&self, context: &str, guardrail: &GuardrailOutcome) -> ScoreOutcome {
        if let GuardrailOutcome::Fired {
            category, evidence, ..
        } = guardrail
        {
            return ScoreOutcome {
                scores: ScoreVector::saturated(*category),
                evidence: BTreeMap::from([(*category, vec![evidence.clone()])]),
                source: ScoreSource::Guardrail,
            };
        }

        let lowered = context.to_lowercase();

        let (mut scores, source) = match self.classify(context).await {
            Ok(scores) => (scores, ScoreSource::Classifier),
            Err(ClassifierError::Unavailable) => {
                debug!("No classifier configured, using neutral scores");
                (ScoreVector::uniform(NEUTRAL_FALLBACK_SCORE), ScoreSource::Fallback)
            }
            Err(e) => {
                warn!(error = %e, "Classifier failed, using neutral scores");
                (ScoreVector::uniform(NEUTRAL_FALLBACK_SCORE), ScoreSource::Fallback)
            }
        };

        if self.options.safe_context_dampening && source == ScoreSource::Classifier {
            let multiplier = safe_context_multiplier(&lowered);
            if multiplier < 1.0 {
                debug!(multiplier, "Safe context detected, dampening scores");
                for category in Category::ALL {
                    scores.set(category, scores.get(category) * multiplier);
                }
            }
        }

        apply_keyword_boost(&mut scores, &lowered);

        let evidence = if self.options.keyword_evidence {
            keyword_evidence(&lowered)
        } else {
            BTreeMap::new()
        };

        ScoreOutcome {
            scores,
            evidence,
            source,
        }
    }

    async fn classify(&self, context: &str) -> Result<ScoreVector, ClassifierError> {
        let classifier = self
            .classifier
            .as_ref()
            .ok_or(ClassifierError::Unavailable)?;
        let text = truncate_for_classifier(context);
        let hypotheses = Category::hypotheses();

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ClassifierError::Unavailable)?;
        let raw = classifier.classify(text, &hypotheses).await?;

        map_hypothesis_scores(classifier.model_name(), &raw)
    }
}

/// First `MAX_CLASSIFIER_INPUT_CHARS` characters of `text`.
pub fn truncate_for_classifier(text: &str) -> &str {
    match text.char_indices().nth(MAX_CLASSIFIER_INPUT_CHARS) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// Re-map classifier output onto categories by hypothesis text.
///
/// Exactly one in-range score per category is required.
pub fn map_hypothesis_scores(
    model: &str,
    raw: &[HypothesisScore],
) -> Result<ScoreVector, ClassifierError> {
    if raw.len() != Category::COUNT {
        return Err(ClassifierError::InvalidResponse {
            model: model.to_string(),
            reason: format!("expected {} scores, got {}", Category::COUNT, raw.len()),
        });
    }

    let mut seen = [false; Category::COUNT];
    let mut scores = ScoreVector::uniform(0.0);
    for entry in raw {
        let category =
            Category::from_hypothesis(&entry.label).ok_or_else(|| ClassifierError::UnknownLabel {
                label: entry.label.clone(),
            })?;
        // NaN fails the range check too.
        if !(0.0..=1.0).contains(&entry.score) {
            return Err(ClassifierError::ScoreOutOfRange {
                category: category.to_string(),
                score: entry.score,
            });
        }
        scores.set(category, entry.score);
        seen[category.index()] = true;
    }

    if let Some(missing) = Category::ALL.into_iter().find(|c| !seen[c.index()]) {
        return Err(ClassifierError::MissingCategory {
            category: missing.to_string(),
        });
    }

    Ok(scores)
}

/// Keywords that nudge a category's score upward.
pub fn boost_keywords(category: Category) -> &'static [&'static str] {
    match category {
        Category::HateSpeech => &["slur", "racial", "ethnic", "racist", "discrimination"],
        Category::Harassment => &["bully", "attack", "harassment", "threaten", "doxx"],
        Category::ViolenceIncitement => &["kill", "hurt", "violence", "attack", "bomb"],
        Category::SexualExplicit => &["sexual", "nude", "pornography", "xxx", "explicit"],
        Category::SelfHarm => &["suicide", "cut", "self-harm", "eat disorder", "die"],
        Category::ScamSpam => &["scam", "fraud", "phishing", "free money", "click here"],
        Category::MisinfoHighHarm => &["fake", "hoax", "false", "misinformation", "conspiracy"],
    }
}

/// Softer indicator phrases. Only ever surfaced as evidence.
fn soft_indicators(category: Category) -> &'static [&'static str] {
    match category {
        Category::ScamSpam => &[
            "free money",
            "double your",
            "guaranteed returns",
            "click here now",
            "limited time",
            "act fast",
            "before it's too late",
            "dm for details",
            "deposit to activate",
            "sign up bonus",
            "crypto giveaway",
            "blockchain",
        ],
        Category::MisinfoHighHarm => &[
            "cure for cancer",
            "vaccine causes autism",
            "miracle cure",
            "fda approved (false)",
            "clinically proven (without evidence)",
            "doctors hate",
            "big pharma conspiracy",
            "election rigged",
            "votes are fake",
            "ballot stuffing",
            "dominion fraud",
            "stop the steal",
            "votes were switched",
        ],
        Category::Harassment => &[
            "@everyone",
            "@all",
            "cancel this person",
            "they deserve it",
            "go after",
            "target",
            "doxx",
            "personal address",
        ],
        _ => &[],
    }
}

/// Markers of gaming, news and educational content.
const SAFE_CONTEXT_MARKERS: [&str; 13] = [
    "minecraft",
    "roblox",
    "fortnite",
    "gamer",
    "stream",
    "breaking",
    "report",
    "investigation",
    "journalist",
    "tutorial",
    "how to",
    "explanation",
    "educational",
];

fn keyword_hits(category: Category, lowered: &str) -> Vec<&'static str> {
    boost_keywords(category)
        .iter()
        .copied()
        .filter(|kw| lowered.contains(kw))
        .collect()
}

/// Add `min(MAX_BOOST, hits * BOOST_PER_MATCH)` to each category, capped at 1.0.
///
/// `lowered` must already be lowercase.
pub fn apply_keyword_boost(scores: &mut ScoreVector, lowered: &str) {
    for category in Category::ALL {
        let hits = keyword_hits(category, lowered).len();
        if hits == 0 {
            continue;
        }
        let boost = (hits as f64 * BOOST_PER_MATCH).min(MAX_BOOST);
        scores.set(category, (scores.get(category) + boost).min(1.0));
    }
}

/// Matched boost keywords and soft indicators, per category.
///
/// Categories with nothing matched are left out.
pub fn keyword_evidence(lowered: &str) -> BTreeMap<Category, Vec<String>> {
    let mut evidence = BTreeMap::new();
    for category in Category::ALL {
        let mut matched: Vec<String> = keyword_hits(category, lowered)
            .into_iter()
            .map(str::to_string)
            .collect();
        for phrase in soft_indicators(category) {
            if lowered.contains(phrase) && !matched.iter().any(|m| m == phrase) {
                matched.push(phrase.to_string());
            }
        }
        if !matched.is_empty() {
            evidence.insert(category, matched);
        }
    }
    evidence
}

/// `SAFE_CONTEXT_MULTIPLIER` if any safe marker occurs, else 1.0.
pub fn safe_context_multiplier(lowered: &str) -> f64 {
    if SAFE_CONTEXT_MARKERS.iter().any(|m| lowered.contains(m)) {
        SAFE_CONTEXT_MULTIPLIER
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::guardrails::GuardrailGroup;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns fixed per-category scores, in reverse order.
    struct FixedClassifier {
        scores: ScoreVector,
        calls: AtomicUsize,
    }

    impl FixedClassifier {
        fn new(scores: ScoreVector) -> Self {
            Self {
                scores,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ZeroShotClassifier for FixedClassifier {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn classify(
            &self,
            _text: &str,
            hypotheses: &[&str],
        ) -> Result<Vec<HypothesisScore>, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(hypotheses
                .iter()
                .rev()
                .map(|h| {
                    let category = Category::from_hypothesis(h).unwrap();
                    HypothesisScore::new(*h, self.scores.get(category))
                })
                .collect())
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl ZeroShotClassifier for FailingClassifier {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn classify(
            &self,
            _text: &str,
            _hypotheses: &[&str],
        ) -> Result<Vec<HypothesisScore>, ClassifierError> {
            Err(ClassifierError::RequestFailed {
                model: "failing".into(),
                reason: "connection refused".into(),
            })
        }
    }

    /// Records the text it was given and the peak number of concurrent calls.
    struct RecordingClassifier {
        seen_len: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RecordingClassifier {
        fn new() -> Self {
            Self {
                seen_len: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ZeroShotClassifier for RecordingClassifier {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn classify(
            &self,
            text: &str,
            hypotheses: &[&str],
        ) -> Result<Vec<HypothesisScore>, ClassifierError> {
            self.seen_len.store(text.chars().count(), Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(hypotheses
                .iter()
                .map(|h| HypothesisScore::new(*h, 0.1))
                .collect())
        }
    }

    fn full_response(score: f64) -> Vec<HypothesisScore> {
        Category::hypotheses()
            .iter()
            .map(|h| HypothesisScore::new(*h, score))
            .collect()
    }

    fn fired(group: GuardrailGroup, evidence: &str) -> GuardrailOutcome {
        GuardrailOutcome::Fired {
            group,
            category: group.category(),
            evidence: evidence.to_string(),
        }
    }

    #[tokio::test]
    async fn guardrail_hit_saturates_without_calling_classifier() {
        let classifier = Arc::new(FixedClassifier::new(ScoreVector::uniform(0.4)));
        let scorer = CategoryScorer::new(Some(classifier.clone()), 2, ScoringOptions::default());

        let outcome = scorer
            .score(
                "how to kill myself free money scam",
                &fired(GuardrailGroup::SelfHarmExplicit, "Explicit self-harm content detected"),
            )
            .await;

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.source, ScoreSource::Guardrail);
        assert_eq!(outcome.scores, ScoreVector::saturated(Category::SelfHarm));
        assert_eq!(
            outcome.evidence.get(&Category::SelfHarm),
            Some(&vec!["Explicit self-harm content detected".to_string()])
        );
        assert_eq!(outcome.evidence.len(), 1);
    }

    #[tokio::test]
    async fn remaps_scores_by_hypothesis_not_position() {
        let expected = ScoreVector::from_pairs([
            (Category::HateSpeech, 0.11),
            (Category::ScamSpam, 0.42),
            (Category::MisinfoHighHarm, 0.27),
        ]);
        let classifier = Arc::new(FixedClassifier::new(expected));
        let scorer = CategoryScorer::new(Some(classifier), 1, ScoringOptions::default());

        let outcome = scorer.score("a calm video", &GuardrailOutcome::Clear).await;
        assert_eq!(outcome.source, ScoreSource::Classifier);
        assert_eq!(outcome.scores, expected);
        assert!(outcome.evidence.is_empty());
    }

    #[tokio::test]
    async fn missing_classifier_falls_back_to_neutral() {
        let scorer = CategoryScorer::new(None, 1, ScoringOptions::default());
        let outcome = scorer.score("a calm video", &GuardrailOutcome::Clear).await;
        assert_eq!(outcome.source, ScoreSource::Fallback);
        assert_eq!(outcome.scores, ScoreVector::uniform(NEUTRAL_FALLBACK_SCORE));
    }

    #[tokio::test]
    async fn failing_classifier_falls_back_to_neutral() {
        let scorer = CategoryScorer::new(
            Some(Arc::new(FailingClassifier)),
            1,
            ScoringOptions::default(),
        );
        let outcome = scorer.score("a calm video", &GuardrailOutcome::Clear).await;
        assert_eq!(outcome.source, ScoreSource::Fallback);
        assert_eq!(outcome.scores, ScoreVector::uniform(0.5));
    }

    #[tokio::test]
    async fn fallback_still_gets_keyword_boost() {
        let scorer = CategoryScorer::new(None, 1, ScoringOptions::default());
        let outcome = scorer
            .score("This is a scam, free money", &GuardrailOutcome::Clear)
            .await;
        assert!((outcome.scores.get(Category::ScamSpam) - 0.6).abs() < 1e-9);
        assert_eq!(outcome.scores.get(Category::Harassment), 0.5);
    }

    #[tokio::test]
    async fn classifier_sees_truncated_context() {
        let classifier = Arc::new(RecordingClassifier::new());
        let scorer = CategoryScorer::new(Some(classifier.clone()), 1, ScoringOptions::default());
        let long = "é".repeat(2000);
        scorer.score(&long, &GuardrailOutcome::Clear).await;
        assert_eq!(
            classifier.seen_len.load(Ordering::SeqCst),
            MAX_CLASSIFIER_INPUT_CHARS
        );
    }

    #[tokio::test]
    async fn semaphore_bounds_concurrent_calls() {
        let classifier = Arc::new(RecordingClassifier::new());
        let scorer = CategoryScorer::new(Some(classifier.clone()), 2, ScoringOptions::default());

        let clear = GuardrailOutcome::Clear;
        let calls = (0..6).map(|_| scorer.score("text", &clear));
        futures::future::join_all(calls).await;

        assert!(classifier.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn keyword_evidence_is_opt_in() {
        let context = "free money scam, dm for details";
        let classifier = Arc::new(FixedClassifier::new(ScoreVector::uniform(0.1)));

        let off = CategoryScorer::new(Some(classifier.clone()), 1, ScoringOptions::default());
        assert!(off.score(context, &GuardrailOutcome::Clear).await.evidence.is_empty());

        let on = CategoryScorer::new(
            Some(classifier),
            1,
            ScoringOptions {
                keyword_evidence: true,
                ..Default::default()
            },
        );
        let evidence = on.score(context, &GuardrailOutcome::Clear).await.evidence;
        assert_eq!(
            evidence.get(&Category::ScamSpam),
            Some(&vec![
                "scam".to_string(),
                "free money".to_string(),
                "dm for details".to_string(),
            ])
        );
    }

    #[tokio::test]
    async fn safe_context_dampens_classifier_scores() {
        let classifier = Arc::new(FixedClassifier::new(ScoreVector::uniform(0.5)));
        let scorer = CategoryScorer::new(
            Some(classifier),
            1,
            ScoringOptions {
                safe_context_dampening: true,
                ..Default::default()
            },
        );

        let outcome = scorer
            .score("minecraft speedrun world record", &GuardrailOutcome::Clear)
            .await;
        assert!((outcome.scores.get(Category::HateSpeech) - 0.3).abs() < 1e-9);

        let outcome = scorer.score("a calm video", &GuardrailOutcome::Clear).await;
        assert_eq!(outcome.scores.get(Category::HateSpeech), 0.5);
    }

    #[tokio::test]
    async fn safe_context_does_not_dampen_fallback() {
        let scorer = CategoryScorer::new(
            None,
            1,
            ScoringOptions {
                safe_context_dampening: true,
                ..Default::default()
            },
        );
        let outcome = scorer.score("fortnite clips", &GuardrailOutcome::Clear).await;
        assert_eq!(outcome.scores, ScoreVector::uniform(0.5));
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_for_classifier("short"), "short");
        let text = "ü".repeat(600);
        assert_eq!(truncate_for_classifier(&text).chars().count(), 512);
    }

    #[test]
    fn mapping_rejects_unknown_label() {
        let mut raw = full_response(0.2);
        raw[3].label = "something else".into();
        assert!(matches!(
            map_hypothesis_scores("m", &raw),
            Err(ClassifierError::UnknownLabel { .. })
        ));
    }

    #[test]
    fn mapping_rejects_duplicate_as_missing() {
        let mut raw = full_response(0.2);
        raw[6].label = raw[0].label.clone();
        match map_hypothesis_scores("m", &raw) {
            Err(ClassifierError::MissingCategory { category }) => {
                assert_eq!(category, "MISINFO_HIGH_HARM")
            }
            other => panic!("Expected MissingCategory, got {:?}", other),
        }
    }

    #[test]
    fn mapping_rejects_wrong_length() {
        let raw = full_response(0.2)[..5].to_vec();
        assert!(matches!(
            map_hypothesis_scores("m", &raw),
            Err(ClassifierError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn mapping_rejects_out_of_range_and_nan() {
        for bad in [1.2, -0.1, f64::NAN] {
            let mut raw = full_response(0.2);
            raw[2].score = bad;
            assert!(matches!(
                map_hypothesis_scores("m", &raw),
                Err(ClassifierError::ScoreOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn boost_is_capped_per_category() {
        let mut scores = ScoreVector::uniform(0.2);
        apply_keyword_boost(
            &mut scores,
            "scam fraud phishing free money click here",
        );
        assert!((scores.get(Category::ScamSpam) - 0.35).abs() < 1e-9);
        assert_eq!(scores.get(Category::HateSpeech), 0.2);
    }

    #[test]
    fn boost_never_exceeds_one() {
        let mut scores = ScoreVector::uniform(0.97);
        apply_keyword_boost(&mut scores, "a bomb attack");
        assert_eq!(scores.get(Category::ViolenceIncitement), 1.0);
    }

    #[test]
    fn shared_keyword_boosts_both_categories() {
        let mut scores = ScoreVector::uniform(0.0);
        apply_keyword_boost(&mut scores, "attack");
        assert!((scores.get(Category::Harassment) - 0.05).abs() < 1e-9);
        assert!((scores.get(Category::ViolenceIncitement) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn soft_indicators_map_to_categories() {
        let evidence = keyword_evidence("stop the steal! @everyone go after them");
        assert_eq!(
            evidence.get(&Category::MisinfoHighHarm),
            Some(&vec!["stop the steal".to_string()])
        );
        assert_eq!(
            evidence.get(&Category::Harassment),
            Some(&vec!["@everyone".to_string(), "go after".to_string()])
        );
        assert!(!evidence.contains_key(&Category::HateSpeech));
    }

    #[test]
    fn safe_markers() {
        assert_eq!(safe_context_multiplier("breaking: local news"), SAFE_CONTEXT_MULTIPLIER);
        assert_eq!(safe_context_multiplier("how to bake bread"), SAFE_CONTEXT_MULTIPLIER);
        assert_eq!(safe_context_multiplier("cat video"), 1.0);
    }
}
