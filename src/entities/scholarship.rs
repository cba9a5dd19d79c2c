//! Scholarship entity - A fundable award with an applicant quota.
//!
//! `available_quota` is mutated exclusively by the quota ledger
//! (`core::quota`); handlers never write it directly.

use crate::core::eligibility::EligibilityCriteria;
use crate::core::money::from_minor_units;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Scholarship database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "scholarships")]
pub struct Model {
    /// Unique identifier for the scholarship
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, unique across scholarships
    #[sea_orm(unique)]
    pub name: String,
    /// Default award per recipient, in minor currency units
    pub amount_minor: i64,
    /// Maximum number of funded applicants
    pub total_quota: i32,
    /// Places still open; `0 <= available_quota <= total_quota`
    pub available_quota: i32,
    /// First day applications are accepted
    pub application_start_date: Date,
    /// Last day applications are accepted
    pub application_end_date: Date,
    /// Eligibility criteria serialized as JSON
    pub eligibility_criteria: String,
    /// Document types required on top of the mandatory ones, as a JSON array
    pub required_documents: String,
    /// Inactive scholarships accept no new applications
    pub is_active: bool,
    /// When the scholarship was created
    pub created_at: DateTimeUtc,
    /// When the scholarship was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Scholarship and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One scholarship has one budget per year
    #[sea_orm(has_many = "super::budget::Entity")]
    Budgets,
    /// One scholarship receives many applications
    #[sea_orm(has_many = "super::application::Entity")]
    Applications,
}

impl Related<super::budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budgets.def()
    }
}

impl Related<super::application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Applications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Default award per recipient.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        from_minor_units(self.amount_minor)
    }

    /// Parsed eligibility criteria.
    pub fn criteria(&self) -> crate::errors::Result<EligibilityCriteria> {
        EligibilityCriteria::from_json(&self.eligibility_criteria)
    }

    /// Extra required document types on top of the mandatory ones.
    pub fn extra_required_documents(&self) -> crate::errors::Result<Vec<String>> {
        Ok(serde_json::from_str(&self.required_documents)?)
    }

    /// Whether applications are accepted on `date`.
    #[must_use]
    pub fn is_open_on(&self, date: Date) -> bool {
        self.is_active && self.application_start_date <= date && date <= self.application_end_date
    }
}
