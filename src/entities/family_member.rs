//! Family section - parents, guardians and siblings.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Family member database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "family_members")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub application_id: i64,
    /// `"father"`, `"mother"`, `"guardian"` or `"sibling"`
    pub relationship: String,
    pub full_name: String,
    pub occupation: Option<String>,
    /// Monthly income in minor currency units
    pub monthly_income_minor: Option<i64>,
}

/// Each family member record belongs to one application
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
