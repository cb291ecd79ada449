//! Absolute-override guardrails.
//!
//! Runs before the classifier to short-circuit unambiguous cases. Groups are
//! checked in a fixed priority order and the first match wins:
//! 1. CSAM indicators → SELF_HARM
//! 2. Explicit self-harm methods → SELF_HARM
//! 3. Slurs → HATE_SPEECH (evidence is the matched text)
//! 4. Shortened/messenger link + scam keyword → SCAM_SPAM
//!
//! If a guardrail fires, the classifier call is skipped entirely.

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::ConfigError;
use crate::pipeline::types::Category;

/// A priority-ordered guardrail pattern group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardrailGroup {
    CsamIndicators,
    SelfHarmExplicit,
    Slurs,
    ExtremeScamLinks,
}

impl GuardrailGroup {
    /// Groups in evaluation order.
    pub const PRIORITY: [GuardrailGroup; 4] = [
        GuardrailGroup::CsamIndicators,
        GuardrailGroup::SelfHarmExplicit,
        GuardrailGroup::Slurs,
        GuardrailGroup::ExtremeScamLinks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::CsamIndicators => "CSAM_INDICATORS",
            Self::SelfHarmExplicit => "SELF_HARM_EXPLICIT",
            Self::Slurs => "SLURS",
            Self::ExtremeScamLinks => "EXTREME_SCAM_LINKS",
        }
    }

    /// Category a hit in this group saturates.
    ///
    /// CSAM indicators route to SELF_HARM; there is no dedicated category.
    pub fn category(self) -> Category {
        match self {
            Self::CsamIndicators | Self::SelfHarmExplicit => Category::SelfHarm,
            Self::Slurs => Category::HateSpeech,
            Self::ExtremeScamLinks => Category::ScamSpam,
        }
    }

    fn evidence(self, matched: &str) -> String {
        match self {
            Self::CsamIndicators => "CSAM indicators detected - IMMEDIATE ESCALATION".into(),
            Self::SelfHarmExplicit => "Explicit self-harm content detected".into(),
            Self::Slurs => matched.to_string(),
            Self::ExtremeScamLinks => "Malicious link + scam keywords detected".into(),
        }
    }

    /// Built-in pattern table for this group.
    pub fn default_patterns(self) -> &'static [&'static str] {
        match self {
            Self::CsamIndicators => &[
                r"(child sexual abuse|cp link|child p[o0]rn|loli)",
                r"(pedoph|child [s0]ex|grooming|child abuse)",
            ],
            Self::SelfHarmExplicit => &[
                r"(how to kill myself|how to (cut|slit) my wrist|suicide method|end it all)",
                r"(emetophilia|bulimia method|how to starve|eat less)",
            ],
            Self::Slurs => &[
                r"\b(n[i1]gg[ae]r|f[a4]gg[o0]t|dyke|tr[a4]nny|r[e3]t[a4]rd)\b",
                r"\b(j3w|j3wish|kike)\b",
                r"\b(sp[i1]c|c[o0]ck|p[o0]lak)\b",
            ],
            Self::ExtremeScamLinks => &[
                r"(bit\.ly|tinyurl|t\.me|telegram|whatsapp.*link).*?(crypto|nft|forex|giveaway|free money|click here)",
            ],
        }
    }
}

/// Outcome of the guardrail stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailOutcome {
    /// No group matched; fall through to the classifier.
    Clear,
    /// A group matched; the result is fixed.
    Fired {
        group: GuardrailGroup,
        category: Category,
        evidence: String,
    },
}


/// A compiled group.
#[derive(Debug, Clone)]
struct CompiledGroup {
    group: GuardrailGroup,
    patterns: Vec<Regex>,
}

/// Compiled guardrail tables.
///
/// Built once at startup and shared read-only between pipeline invocations.
#[derive(Debug, Clone)]
pub struct GuardrailMatcher {
    groups: Vec<CompiledGroup>,
}

impl GuardrailMatcher {
    /// Compile the built-in pattern tables.
    pub fn new() -> Result<Self, ConfigError> {
        let table: Vec<_> = GuardrailGroup::PRIORITY
            .into_iter()
            .map(|group| (group, group.default_patterns().to_vec()))
            .collect();
        Self::with_table(&table)
    }

    /// Compile a custom table.
    ///
    /// Groups are always evaluated in `GuardrailGroup::PRIORITY` order,
    /// whatever order the table lists them in. A pattern that fails to
    /// compile is a configuration defect.
    pub fn with_table(table: &[(GuardrailGroup, Vec<&str>)]) -> Result<Self, ConfigError> {
        let mut groups = Vec::with_capacity(GuardrailGroup::PRIORITY.len());
        for group in GuardrailGroup::PRIORITY {
            let mut patterns = Vec::new();
            for (_, sources) in table.iter().filter(|(g, _)| *g == group) {
                for source in sources {
                    let regex = RegexBuilder::new(source)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| ConfigError::InvalidPattern {
                            group: group.name().to_string(),
                            source: e,
                        })?;
                    patterns.push(regex);
                }
            }
            groups.push(CompiledGroup { group, patterns });
        }
        Ok(Self { groups })
    }

    /// Evaluate the full, untruncated context against every group.
    pub fn check(&self, context: &str) -> GuardrailOutcome {
        for compiled in &self.groups {
            for pattern in &compiled.patterns {
                if let Some(hit) = pattern.find(context) {
                    let group = compiled.group;
                    debug!(
                        group = group.name(),
                        pattern = pattern.as_str(),
                        "Guardrail fired"
                    );
                    return GuardrailOutcome::Fired {
                        group,
                        category: group.category(),
                        evidence: group.evidence(hit.as_str()),
                    };
                }
            }
        }

        GuardrailOutcome::Clear
    }
}
