//! Education history section.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Education record database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "education_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub application_id: i64,
    /// School or university name
    pub institution: String,
    /// Education level, e.g. `"high_school"` or `"bachelor"`
    pub level: String,
    pub gpa: Option<f64>,
    pub graduation_year: Option<i32>,
}

/// Each education record belongs to one application
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
