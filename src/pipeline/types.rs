//! Shared types for the moderation pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::{InputError, UnknownVariant};

/// Shortest accepted duration, in seconds.
pub const MIN_DURATION_SECONDS: i64 = 1;

/// Longest accepted duration, in seconds.
pub const MAX_DURATION_SECONDS: i64 = 3600;

// ── Input ───────────────────────────────────────────────────────────

/// Textual surface and metadata of one short video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortInput {
    pub short_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub top_comments: Vec<String>,
    #[serde(default = "default_duration", deserialize_with = "whole_seconds")]
    pub duration_seconds: i64,
    #[serde(default)]
    pub view_count: u64,
    pub upload_date: String,
    #[serde(default = "default_channel_name")]
    pub channel_name: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_duration() -> i64 {
    60
}

/// Accepts integers and integral floats such as `59.0`.
fn whole_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Whole(i64),
        Float(f64),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Whole(value) => Ok(value),
        Seconds::Float(value) if value.fract() == 0.0 => Ok(value as i64),
        Seconds::Float(value) => Err(de::Error::custom(format!(
            "duration_seconds must be a whole number, got {value}"
        ))),
    }
}

fn default_channel_name() -> String {
    "Unknown".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

impl ShortInput {
    /// Create an input with only the required fields set.
    pub fn new(
        short_id: impl Into<String>,
        title: impl Into<String>,
        upload_date: impl Into<String>,
    ) -> Self {
        Self {
            short_id: short_id.into(),
            title: title.into(),
            description: String::new(),
            transcript: String::new(),
            top_comments: Vec::new(),
            duration_seconds: default_duration(),
            view_count: 0,
            upload_date: upload_date.into(),
            channel_name: default_channel_name(),
            language: default_language(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = transcript.into();
        self
    }

    pub fn with_comments<I, S>(mut self, comments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.top_comments = comments.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_duration(mut self, seconds: i64) -> Self {
        self.duration_seconds = seconds;
        self
    }

    /// Deserialize and validate one item from a JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, InputError> {
        let input: ShortInput =
            serde_json::from_value(value).map_err(|e| InputError::Malformed(e.to_string()))?;
        input.validate()
    }

    /// Trim the free-text fields and enforce field constraints.
    pub fn validate(mut self) -> Result<Self, InputError> {
        if self.short_id.trim().is_empty() {
            return Err(InputError::EmptyShortId);
        }
        if !(MIN_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&self.duration_seconds) {
            return Err(InputError::DurationOutOfRange {
                value: self.duration_seconds,
            });
        }
        self.title = self.title.trim().to_string();
        self.description = self.description.trim().to_string();
        self.transcript = self.transcript.trim().to_string();
        Ok(self)
    }
}

// ── Categories ──────────────────────────────────────────────────────

/// Policy categories, declared in canonical order.
///
/// The declaration order drives `Ord`, map iteration and primary-violation
/// tie-breaking. Do not reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    HateSpeech,
    Harassment,
    ViolenceIncitement,
    SexualExplicit,
    SelfHarm,
    ScamSpam,
    MisinfoHighHarm,
}

impl Category {
    pub const COUNT: usize = 7;

    /// All categories in canonical order.
    pub const ALL: [Category; Category::COUNT] = [
        Category::HateSpeech,
        Category::Harassment,
        Category::ViolenceIncitement,
        Category::SexualExplicit,
        Category::SelfHarm,
        Category::ScamSpam,
        Category::MisinfoHighHarm,
    ];

    /// Position in canonical order.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HateSpeech => "HATE_SPEECH",
            Self::Harassment => "HARASSMENT",
            Self::ViolenceIncitement => "VIOLENCE_INCITEMENT",
            Self::SexualExplicit => "SEXUAL_EXPLICIT",
            Self::SelfHarm => "SELF_HARM",
            Self::ScamSpam => "SCAM_SPAM",
            Self::MisinfoHighHarm => "MISINFO_HIGH_HARM",
        }
    }

    /// The hypothesis sentence sent to the zero-shot classifier.
    pub fn hypothesis(self) -> &'static str {
        match self {
            Self::HateSpeech => {
                "This text contains hate speech, slurs, or dehumanizing language targeting protected groups."
            }
            Self::Harassment => {
                "This text contains harassment, bullying, doxxing, or aggressive personal attacks."
            }
            Self::ViolenceIncitement => {
                "This text glorifies violence, incites harm, or encourages dangerous activities."
            }
            Self::SexualExplicit => {
                "This text contains sexually explicit content, pornography, or non-consensual sexual references."
            }
            Self::SelfHarm => {
                "This text promotes suicide, self-harm, eating disorders, or self-mutilation."
            }
            Self::ScamSpam => {
                "This text is a scam, phishing attempt, spam, or fraudulent financial scheme."
            }
            Self::MisinfoHighHarm => {
                "This text spreads dangerous misinformation about elections, health, or emergencies."
            }
        }
    }

    /// Hypotheses for every category, in canonical order.
    pub fn hypotheses() -> [&'static str; Category::COUNT] {
        Self::ALL.map(Self::hypothesis)
    }

    /// Reverse lookup from a hypothesis sentence.
    pub fn from_hypothesis(hypothesis: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.hypothesis() == hypothesis)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVariant {
                kind: "category",
                value: s.to_string(),
            })
    }
}

/// Categories whose HIGH risk always escalates at P0.
pub const CRITICAL_CATEGORIES: [Category; 2] = [Category::SelfHarm, Category::ViolenceIncitement];

/// Categories removed outright on very high confidence.
pub const REMOVABLE_CATEGORIES: [Category; 3] = [
    Category::HateSpeech,
    Category::ScamSpam,
    Category::ViolenceIncitement,
];

// ── Scores ──────────────────────────────────────────────────────────

/// One score per category, indexed by canonical position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreVector([f64; Category::COUNT]);

impl ScoreVector {
    /// Every category at the same score.
    pub fn uniform(score: f64) -> Self {
        Self([score; Category::COUNT])
    }

    /// `hit` at 1.0, everything else at 0.0.
    pub fn saturated(hit: Category) -> Self {
        let mut scores = Self::uniform(0.0);
        scores.set(hit, 1.0);
        scores
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Category, f64)>,
    {
        let mut scores = Self::uniform(0.0);
        for (category, score) in pairs {
            scores.set(category, score);
        }
        scores
    }

    pub fn get(&self, category: Category) -> f64 {
        self.0[category.index()]
    }

    pub fn set(&mut self, category: Category, score: f64) {
        self.0[category.index()] = score;
    }

    /// `(category, score)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        Category::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    pub fn max(&self) -> f64 {
        self.0.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Three-tier bin of a category score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-category breakdown in a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub risk_level: RiskLevel,
    pub score: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
}

// ── Decisions ───────────────────────────────────────────────────────

/// Overall moderation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approved,
    Remove,
    AgeRestrict,
    EscalateToHuman,
    /// Representable for downstream consumers; no policy rule emits it.
    NeedMoreContext,
}

impl Decision {
    pub const ALL: [Decision; 5] = [
        Decision::Approved,
        Decision::Remove,
        Decision::AgeRestrict,
        Decision::EscalateToHuman,
        Decision::NeedMoreContext,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Remove => "REMOVE",
            Self::AgeRestrict => "AGE_RESTRICT",
            Self::EscalateToHuman => "ESCALATE_TO_HUMAN",
            Self::NeedMoreContext => "NEED_MORE_CONTEXT",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Approved => "Content passes moderation. No violations detected.",
            Self::Remove => "High confidence violation. Content should be removed.",
            Self::AgeRestrict => "Mature content. Restrict to 18+ audience.",
            Self::EscalateToHuman => "Borderline or sensitive. Requires human review.",
            Self::NeedMoreContext => "Ambiguous. Video analysis or manual review needed.",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVariant {
                kind: "decision",
                value: s.to_string(),
            })
    }
}

/// Recommended enforcement action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    EscalateForHumanReview,
    BlockAndReport,
    HoldForReview,
    AddAgeRestriction,
    HoldForHumanReview,
    ApproveContent,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EscalateForHumanReview => "ESCALATE_FOR_HUMAN_REVIEW",
            Self::BlockAndReport => "BLOCK_AND_REPORT",
            Self::HoldForReview => "HOLD_FOR_REVIEW",
            Self::AddAgeRestriction => "ADD_AGE_RESTRICTION",
            Self::HoldForHumanReview => "HOLD_FOR_HUMAN_REVIEW",
            Self::ApproveContent => "APPROVE_CONTENT",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-review turnaround, P0 most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EscalationPriority {
    P0,
    P1,
    P2,
    P3,
}

impl EscalationPriority {
    pub const ALL: [EscalationPriority; 4] = [Self::P0, Self::P1, Self::P2, Self::P3];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::P0 => "CRITICAL - Immediate action required",
            Self::P1 => "HIGH - Same-day review required",
            Self::P2 => "MEDIUM - Within 24 hours",
            Self::P3 => "LOW - Within 72 hours",
        }
    }
}

impl fmt::Display for EscalationPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EscalationPriority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVariant {
                kind: "escalation priority",
                value: s.to_string(),
            })
    }
}

// ── Result ──────────────────────────────────────────────────────────

/// Final, immutable moderation verdict for one short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationResult {
    pub short_id: String,
    pub overall_decision: Decision,
    pub confidence_score: f64,
    pub primary_violation: Category,
    pub categories: BTreeMap<Category, CategoryScore>,
    pub action_recommendation: Action,
    pub escalation_priority: EscalationPriority,
    pub notes_for_human_reviewer: String,
    pub processing_timestamp: DateTime<Utc>,
}
