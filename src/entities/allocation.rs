//! Allocation entity - A funding commitment for one approved application.
//!
//! `allocated_amount_minor` is fixed at creation. Only `allocation_status`
//! and the approval/disbursement metadata evolve afterwards.

use crate::core::money::from_minor_units;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status of an allocation: `pending -> approved -> disbursed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    /// Funds reserved, awaiting confirmation
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Confirmed by staff
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Transferred to the recipient
    #[sea_orm(string_value = "disbursed")]
    Disbursed,
}

impl AllocationStatus {
    /// Stable lowercase label, identical to the stored value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Disbursed => "disbursed",
        }
    }
}

/// How allocated funds reach the recipient.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum DisbursementMethod {
    /// Bank transfer; requires account number and bank name
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    /// Paper cheque
    #[sea_orm(string_value = "cheque")]
    Cheque,
    /// Cash at the finance office
    #[sea_orm(string_value = "cash")]
    Cash,
}

/// Allocation database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "allocations")]
pub struct Model {
    /// Unique identifier for the allocation
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Funded application; an application has at most one allocation
    #[sea_orm(unique)]
    pub application_id: i64,
    /// Scholarship whose quota and budget were reserved
    pub scholarship_id: i64,
    /// Budget year the amount was reserved against
    pub budget_year: i32,
    /// Committed amount in minor currency units, immutable
    pub allocated_amount_minor: i64,
    /// Current status
    pub allocation_status: AllocationStatus,
    /// How the funds will be paid
    pub disbursement_method: DisbursementMethod,
    /// Recipient account number, for bank transfers
    pub bank_account: Option<String>,
    /// Recipient bank, for bank transfers
    pub bank_name: Option<String>,
    /// Populated at disbursement
    pub transfer_date: Option<Date>,
    /// Populated at disbursement
    pub transfer_reference: Option<String>,
    /// Staff member who created the allocation
    pub allocated_by: String,
    /// Staff member who approved the allocation
    pub approved_by: Option<String>,
    /// When the allocation was created
    pub created_at: DateTimeUtc,
    /// When the allocation was approved
    pub approved_at: Option<DateTimeUtc>,
    /// When the allocation was disbursed
    pub disbursed_at: Option<DateTimeUtc>,
}

/// Defines relationships between Allocation and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each allocation funds one application
    #[sea_orm(
        belongs_to = "super::application::Entity",
        from = "Column::ApplicationId",
        to = "super::application::Column::Id"
    )]
    Application,
    /// Each allocation draws on one scholarship
    #[sea_orm(
        belongs_to = "super::scholarship::Entity",
        from = "Column::ScholarshipId",
        to = "super::scholarship::Column::Id"
    )]
    Scholarship,
}

impl Related<super::application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Application.def()
    }
}

impl Related<super::scholarship::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scholarship.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Committed amount.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        from_minor_units(self.allocated_amount_minor)
    }
}
