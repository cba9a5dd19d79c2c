//! Eligibility screening - pure evaluation of a student's declared attributes
//! against a scholarship's criteria.
//!
//! Criteria are a closed set of kinds ([`Criterion`]). Absent criteria are
//! skipped. A criterion whose input is missing from the profile is reported
//! in `missing_fields` and does not fail eligibility on its own.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::errors::{FieldError, Result};

/// Starting score before failed criteria are subtracted.
pub const BASE_SCORE: f64 = 100.0;

/// Document types every application must include.
pub const MANDATORY_DOCUMENTS: [&str; 2] = ["id_card", "transcript"];

/// One eligibility rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Criterion {
    /// Minimum cumulative GPA (inclusive)
    MinGpa(f64),
    /// Maximum yearly family income (inclusive)
    MaxFamilyIncome(Decimal),
    /// Faculties whose students may apply
    AllowedFaculties(BTreeSet<String>),
    /// Minimum year of study (inclusive)
    MinYearLevel(u8),
}

impl Criterion {
    /// Score deducted when this criterion is present but unmet.
    #[must_use]
    pub const fn weight(&self) -> f64 {
        match self {
            Self::MinGpa(_) => 20.0,
            Self::MaxFamilyIncome(_) => 30.0,
            Self::AllowedFaculties(_) => 25.0,
            Self::MinYearLevel(_) => 15.0,
        }
    }

    /// Name of the profile attribute this criterion reads.
    #[must_use]
    pub const fn field_name(&self) -> &'static str {
        match self {
            Self::MinGpa(_) => "gpa",
            Self::MaxFamilyIncome(_) => "family income",
            Self::AllowedFaculties(_) => "faculty",
            Self::MinYearLevel(_) => "year level",
        }
    }

    const fn kind_key(&self) -> &'static str {
        match self {
            Self::MinGpa(_) => "min_gpa",
            Self::MaxFamilyIncome(_) => "max_family_income",
            Self::AllowedFaculties(_) => "allowed_faculties",
            Self::MinYearLevel(_) => "min_year_level",
        }
    }
}

/// The full criteria set attached to a scholarship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EligibilityCriteria(pub Vec<Criterion>);

impl EligibilityCriteria {
    /// Adds a criterion, builder style.
    #[must_use]
    pub fn with(mut self, criterion: Criterion) -> Self {
        self.0.push(criterion);
        self
    }

    /// Iterates the criteria in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.0.iter()
    }

    /// Checks the criteria themselves are well-formed, reporting every problem.
    #[must_use]
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        let mut seen = BTreeSet::new();

        for criterion in &self.0 {
            let key = criterion.kind_key();
            if !seen.insert(key) {
                errors.push(FieldError::new(
                    format!("eligibility_criteria.{key}"),
                    "criterion is declared more than once",
                ));
            }
            match criterion {
                Criterion::MinGpa(gpa) if !(0.0..=4.0).contains(gpa) => {
                    errors.push(FieldError::new(
                        "eligibility_criteria.min_gpa",
                        "must be between 0.0 and 4.0",
                    ));
                }
                Criterion::MaxFamilyIncome(income) if income.is_sign_negative() => {
                    errors.push(FieldError::new(
                        "eligibility_criteria.max_family_income",
                        "must not be negative",
                    ));
                }
                Criterion::AllowedFaculties(faculties) if faculties.is_empty() => {
                    errors.push(FieldError::new(
                        "eligibility_criteria.allowed_faculties",
                        "must list at least one faculty",
                    ));
                }
                Criterion::MinYearLevel(0) => {
                    errors.push(FieldError::new(
                        "eligibility_criteria.min_year_level",
                        "must be at least 1",
                    ));
                }
                _ => {}
            }
        }

        errors
    }

    /// Parses criteria stored as JSON text.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Serializes criteria for storage.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Declared attributes of a student, each possibly unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub gpa: Option<f64>,
    pub family_income: Option<Decimal>,
    pub faculty: Option<String>,
    pub year_level: Option<u8>,
    pub activity_count: Option<u32>,
}

/// Outcome of one criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CriterionOutcome {
    /// Requirement satisfied
    Met,
    /// Requirement present and not satisfied
    Unmet,
    /// Profile lacks the attribute needed to decide
    MissingData,
}

/// Per-criterion line of an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriterionResult {
    pub criterion: Criterion,
    pub outcome: CriterionOutcome,
    /// Human-readable explanation
    pub detail: String,
}

/// Result of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilityResult {
    pub is_eligible: bool,
    /// `BASE_SCORE` minus the weights of unmet criteria, floored at zero
    pub score: f64,
    pub criteria_results: Vec<CriterionResult>,
    /// Attributes the profile did not declare
    pub missing_fields: Vec<String>,
}

/// Evaluates a profile against criteria. Deterministic and side-effect free.
#[must_use]
pub fn evaluate(criteria: &EligibilityCriteria, profile: &StudentProfile) -> EligibilityResult {
    let mut is_eligible = true;
    let mut score = BASE_SCORE;
    let mut criteria_results = Vec::with_capacity(criteria.0.len());
    let mut missing_fields = Vec::new();

    for criterion in criteria.iter() {
        let (outcome, detail) = check(criterion, profile);
        match outcome {
            CriterionOutcome::Unmet => {
                is_eligible = false;
                score -= criterion.weight();
            }
            CriterionOutcome::MissingData => {
                missing_fields.push(criterion.field_name().to_string());
            }
            CriterionOutcome::Met => {}
        }
        criteria_results.push(CriterionResult {
            criterion: criterion.clone(),
            outcome,
            detail,
        });
    }

    EligibilityResult {
        is_eligible,
        score: score.max(0.0),
        criteria_results,
        missing_fields,
    }
}

fn check(criterion: &Criterion, profile: &StudentProfile) -> (CriterionOutcome, String) {
    match criterion {
        Criterion::MinGpa(min) => match profile.gpa {
            Some(gpa) if gpa >= *min => (
                CriterionOutcome::Met,
                format!("GPA {gpa:.2} meets minimum {min:.2}"),
            ),
            Some(gpa) => (
                CriterionOutcome::Unmet,
                format!("GPA {gpa:.2} below minimum {min:.2}"),
            ),
            None => (CriterionOutcome::MissingData, "GPA not declared".to_string()),
        },
        Criterion::MaxFamilyIncome(max) => match profile.family_income {
            Some(income) if income <= *max => (
                CriterionOutcome::Met,
                format!("family income {income} within limit {max}"),
            ),
            Some(income) => (
                CriterionOutcome::Unmet,
                format!("family income {income} exceeds limit {max}"),
            ),
            None => (
                CriterionOutcome::MissingData,
                "family income not declared".to_string(),
            ),
        },
        Criterion::AllowedFaculties(allowed) => match profile.faculty.as_deref() {
            Some(faculty) if allowed.contains(faculty) => (
                CriterionOutcome::Met,
                format!("faculty {faculty} is eligible"),
            ),
            Some(faculty) => (
                CriterionOutcome::Unmet,
                format!("faculty {faculty} is not eligible"),
            ),
            None => (
                CriterionOutcome::MissingData,
                "faculty not declared".to_string(),
            ),
        },
        Criterion::MinYearLevel(min) => match profile.year_level {
            Some(year) if year >= *min => (
                CriterionOutcome::Met,
                format!("year {year} meets minimum {min}"),
            ),
            Some(year) => (
                CriterionOutcome::Unmet,
                format!("year {year} below minimum {min}"),
            ),
            None => (
                CriterionOutcome::MissingData,
                "year level not declared".to_string(),
            ),
        },
    }
}

/// Returns the required document types absent from `present`, in checklist
/// order: mandatory types first, then the scholarship's extra types.
#[must_use]
pub fn missing_documents<'a>(
    extra_required: &'a [String],
    present: &BTreeSet<String>,
) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    MANDATORY_DOCUMENTS
        .iter()
        .copied()
        .chain(extra_required.iter().map(String::as_str))
        .filter(|doc| seen.insert(*doc))
        .filter(|doc| !present.contains(*doc))
        .collect()
}
