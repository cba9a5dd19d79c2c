//! Document entity - Metadata of a file held by the document store.
//!
//! The engine only reads `(document_type, verification_status)`; presence
//! of a type is what submission requires, verification is informational.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Verification state reported by document staff.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "verified")]
    Verified,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Document database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub application_id: i64,
    /// Document type key, e.g. `"id_card"` or `"transcript"`
    pub document_type: String,
    /// Storage key of the uploaded file
    pub file_name: String,
    pub verification_status: VerificationStatus,
    /// Staff member who last changed the verification status
    pub verified_by: Option<String>,
    pub uploaded_at: DateTimeUtc,
}

/// Each document record belongs to one application
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Owning application; removed together with a deleted draft
    #[sea_orm(
        belongs_to = "super::application::Entity",
        from = "Column::ApplicationId",
        to = "super::application::Column::Id",
        on_delete = "Cascade"
    )]
    Application,
}

impl Related<super::application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Application.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
