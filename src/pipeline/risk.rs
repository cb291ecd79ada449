//! Risk binning and primary-violation selection.

use crate::pipeline::types::{Category, RiskLevel, ScoreVector};

/// Scores strictly above this are HIGH.
pub const HIGH_RISK_THRESHOLD: f64 = 0.85;

/// Scores strictly above this (and not HIGH) are MEDIUM.
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.60;

/// Bin one score. Both boundaries use strict greater-than.
pub fn bin_score(score: f64) -> RiskLevel {
    if score > HIGH_RISK_THRESHOLD {
        RiskLevel::High
    } else if score > MEDIUM_RISK_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Risk level per category, indexed by canonical position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskBins([RiskLevel; Category::COUNT]);

impl RiskBins {
    pub fn get(&self, category: Category) -> RiskLevel {
        self.0[category.index()]
    }

    /// Number of categories at `level`.
    pub fn count(&self, level: RiskLevel) -> usize {
        self.0.iter().filter(|l| **l == level).count()
    }
}

/// Bin every category score.
pub fn bin_risk(scores: &ScoreVector) -> RiskBins {
    RiskBins(Category::ALL.map(|c| bin_score(scores.get(c))))
}

/// Highest-scoring category; ties go to the earliest in canonical order.
pub fn select_primary(scores: &ScoreVector) -> (Category, f64) {
    let mut best = (Category::ALL[0], scores.get(Category::ALL[0]));
    for (category, score) in scores.iter().skip(1) {
        if score > best.1 {
            best = (category, score);
        }
    }
    best
}

/// Aggregated signals the decision policy reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAggregate {
    pub bins: RiskBins,
    pub primary: Category,
    pub primary_score: f64,
}

impl RiskAggregate {
    pub fn from_scores(scores: &ScoreVector) -> Self {
        let (primary, primary_score) = select_primary(scores);
        Self {
            bins: bin_risk(scores),
            primary,
            primary_score,
        }
    }
}
