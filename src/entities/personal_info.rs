//! Personal information section - one per application.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Personal information database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "personal_info")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning application
    #[sea_orm(unique)]
    pub application_id: i64,
    /// Given name in the local script
    pub first_name: String,
    /// Family name in the local script
    pub last_name: String,
    /// Given name in Latin script, if provided
    pub first_name_en: Option<String>,
    /// Family name in Latin script, if provided
    pub last_name_en: Option<String>,
    /// Contact email
    pub email: String,
    pub phone: Option<String>,
    /// Faculty the student is enrolled in
    pub faculty: Option<String>,
    /// Current year of study, starting at 1
    pub year_level: Option<i32>,
    /// Cumulative GPA on a 4.0 scale
    pub gpa: Option<f64>,
}

/// Each personal information record belongs to one application
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
