//! Budget entity - Currency ceiling for a scholarship in one budget year.
//!
//! `remaining_budget` is always `total_budget - allocated_budget`; both
//! counters are written only by the budget ledger (`core::budget`).

use crate::core::money::from_minor_units;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Budget database model. All amounts are minor currency units.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    /// Unique identifier for the budget row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Scholarship this budget funds
    pub scholarship_id: i64,
    /// Budget year, unique together with `scholarship_id`
    pub budget_year: i32,
    /// Ceiling for the year
    pub total_budget: i64,
    /// Sum of all reservations made against this budget
    pub allocated_budget: i64,
    /// Derived: `total_budget - allocated_budget`
    pub remaining_budget: i64,
    /// When the budget was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Budget and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each budget belongs to one scholarship
    #[sea_orm(
        belongs_to = "super::scholarship::Entity",
        from = "Column::ScholarshipId",
        to = "super::scholarship::Column::Id"
    )]
    Scholarship,
}

impl Related<super::scholarship::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scholarship.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Ceiling for the year.
    #[must_use]
    pub fn total(&self) -> Decimal {
        from_minor_units(self.total_budget)
    }

    /// Amount already reserved.
    #[must_use]
    pub fn allocated(&self) -> Decimal {
        from_minor_units(self.allocated_budget)
    }

    /// Amount still available.
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        from_minor_units(self.remaining_budget)
    }
}
