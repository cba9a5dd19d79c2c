//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod activity;
pub mod address;
pub mod allocation;
pub mod application;
pub mod budget;
pub mod document;
pub mod education_record;
pub mod family_member;
pub mod financial_info;
pub mod personal_info;
pub mod scholarship;
pub mod workflow_event;

// Re-export specific types to avoid conflicts
pub use activity::{Entity as Activity, Model as ActivityModel};
pub use address::{Entity as Address, Model as AddressModel};
pub use allocation::{
    AllocationStatus, Column as AllocationColumn, DisbursementMethod, Entity as Allocation,
    Model as AllocationModel,
};
pub use application::{
    ApplicationStatus, Column as ApplicationColumn, Entity as Application,
    Model as ApplicationModel,
};
pub use budget::{Column as BudgetColumn, Entity as Budget, Model as BudgetModel};
pub use document::{Entity as Document, Model as DocumentModel, VerificationStatus};
pub use education_record::{Entity as EducationRecord, Model as EducationRecordModel};
pub use family_member::{Entity as FamilyMember, Model as FamilyMemberModel};
pub use financial_info::{Entity as FinancialInfo, Model as FinancialInfoModel};
pub use personal_info::{Entity as PersonalInfo, Model as PersonalInfoModel};
pub use scholarship::{
    Column as ScholarshipColumn, Entity as Scholarship, Model as ScholarshipModel,
};
pub use workflow_event::{Entity as WorkflowEvent, Model as WorkflowEventModel};
