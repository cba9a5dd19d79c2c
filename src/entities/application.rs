//! Application entity - A student's application to one scholarship.
//!
//! The `status` column is owned by the application state machine in
//! `core::application`. Section records (personal info, addresses, ...)
//! live in their own tables keyed by `application_id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of an application.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Being edited by the student
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Handed in, waiting for staff
    #[sea_orm(string_value = "submitted")]
    Submitted,
    /// Picked up by a reviewer
    #[sea_orm(string_value = "under_review")]
    UnderReview,
    /// Interview arranged
    #[sea_orm(string_value = "interview_scheduled")]
    InterviewScheduled,
    /// Reviewer asked for additional documents
    #[sea_orm(string_value = "document_pending")]
    DocumentPending,
    /// Accepted; may receive an allocation
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Declined
    #[sea_orm(string_value = "rejected")]
    Rejected,
    /// Funds disbursed
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl ApplicationStatus {
    /// Statuses that count towards the one-open-application rule.
    pub const OPEN: [Self; 5] = [
        Self::Draft,
        Self::Submitted,
        Self::UnderReview,
        Self::InterviewScheduled,
        Self::DocumentPending,
    ];

    /// Statuses a reviewer may move an application out of.
    pub const REVIEWABLE: [Self; 4] = [
        Self::Submitted,
        Self::UnderReview,
        Self::InterviewScheduled,
        Self::DocumentPending,
    ];

    /// Stable lowercase label, identical to the stored value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::InterviewScheduled => "interview_scheduled",
            Self::DocumentPending => "document_pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    /// `approved`, `rejected` and `completed` end the review lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Completed)
    }

    /// Whether a reviewer may act on an application in this status.
    #[must_use]
    pub fn is_reviewable(self) -> bool {
        Self::REVIEWABLE.contains(&self)
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "applications")]
pub struct Model {
    /// Unique identifier for the application
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Verified identity of the applying student
    pub student_id: String,
    /// Scholarship applied for
    pub scholarship_id: i64,
    /// Current lifecycle status
    pub status: ApplicationStatus,
    /// Free-form declared fields as a JSON object
    pub application_data: String,
    /// Whether the student accepted the scholarship terms
    pub terms_accepted: bool,
    /// Set once, on the `draft -> submitted` transition
    pub submitted_at: Option<DateTimeUtc>,
    /// Notes recorded by the last review
    pub review_notes: Option<String>,
    /// Staff member who performed the last review
    pub reviewer_id: Option<String>,
    /// When the application was created
    pub created_at: DateTimeUtc,
    /// When the application was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Application and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each application targets one scholarship
    #[sea_orm(
        belongs_to = "super::scholarship::Entity",
        from = "Column::ScholarshipId",
        to = "super::scholarship::Column::Id"
    )]
    Scholarship,
    /// Audit trail of status changes
    #[sea_orm(has_many = "super::workflow_event::Entity")]
    WorkflowEvents,
    /// Uploaded document metadata
    #[sea_orm(has_many = "super::document::Entity")]
    Documents,
}

impl Related<super::scholarship::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scholarship.def()
    }
}

impl Related<super::workflow_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkflowEvents.def()
    }
}

impl Related<super::document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
