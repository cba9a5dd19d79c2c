//! Priority scoring - weighted composite of academic and financial-need signals.
//!
//! Weights: GPA 40%, financial need 30%, activities 30%. The result is rounded
//! to two decimal places and bucketed into a fixed [`ScoreLevel`].

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

const GPA_WEIGHT: f64 = 0.4;
const FINANCIAL_WEIGHT: f64 = 0.3;
const ACTIVITY_WEIGHT: f64 = 0.3;

const LOW_INCOME: f64 = 15_000.0;
const HIGH_INCOME: f64 = 50_000.0;

/// Fixed score bands used in review screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ScoreLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ScoreLevel {
    /// Buckets a total score: >=80 very high, >=60 high, >=40 medium, else low.
    #[must_use]
    pub fn from_total(total: f64) -> Self {
        if total >= 80.0 {
            Self::VeryHigh
        } else if total >= 60.0 {
            Self::High
        } else if total >= 40.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very high",
        }
    }
}

/// Breakdown of a priority score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriorityScore {
    pub gpa_score: f64,
    pub financial_score: f64,
    pub activity_score: f64,
    /// Weighted total rounded to two decimal places
    pub total: f64,
    pub level: ScoreLevel,
}

/// 100 at GPA >= 4.0, 50 at GPA <= 2.0, linear in between.
/// A GPA that is not a number scores as the floor.
#[must_use]
pub fn gpa_score(gpa: f64) -> f64 {
    if gpa.is_nan() {
        50.0
    } else if gpa >= 4.0 {
        100.0
    } else if gpa <= 2.0 {
        50.0
    } else {
        50.0 + (gpa - 2.0) / 2.0 * 50.0
    }
}

/// 100 at income <= 15,000, 20 at income >= 50,000, linear in between.
#[must_use]
pub fn financial_score(family_income: Decimal) -> f64 {
    let income = family_income.to_f64().unwrap_or(f64::MAX);
    if income <= LOW_INCOME {
        100.0
    } else if income >= HIGH_INCOME {
        20.0
    } else {
        100.0 - (income - LOW_INCOME) / (HIGH_INCOME - LOW_INCOME) * 80.0
    }
}

/// 20 points per activity, capped at 100.
#[must_use]
pub fn activity_score(activity_count: u32) -> f64 {
    f64::from(activity_count.saturating_mul(20).min(100))
}

/// Rounds half away from zero to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Computes the composite priority score.
#[must_use]
pub fn score(gpa: f64, family_income: Decimal, activity_count: u32) -> PriorityScore {
    let gpa_score = gpa_score(gpa);
    let financial_score = financial_score(family_income);
    let activity_score = activity_score(activity_count);
    let total = round2(
        gpa_score * GPA_WEIGHT + financial_score * FINANCIAL_WEIGHT + activity_score * ACTIVITY_WEIGHT,
    );

    PriorityScore {
        gpa_score,
        financial_score,
        activity_score,
        total,
        level: ScoreLevel::from_total(total),
    }
}
