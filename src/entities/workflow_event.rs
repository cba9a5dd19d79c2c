//! Workflow event entity - Append-only audit trail of application status changes.

use super::application::ApplicationStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Workflow event database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "workflow_events")]
pub struct Model {
    /// Unique identifier for the event
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Application whose status changed
    pub application_id: i64,
    /// Status before the change, `None` on creation
    pub from_status: Option<ApplicationStatus>,
    /// Status after the change
    pub to_status: ApplicationStatus,
    /// Caller who triggered the change
    pub actor_id: String,
    /// Optional reviewer notes
    pub notes: Option<String>,
    /// When the change happened
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
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
