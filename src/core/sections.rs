//! Draft editor - section records of an application.
//!
//! Every mutation runs in a transaction that first locks the application as a
//! draft owned by the caller, so edits can never land on a submitted
//! application. Inputs are checked for shape only; completeness is judged at
//! submission.

use crate::{
    core::{access::Caller, application::lock_draft, money::to_minor_units},
    entities::{
        Application, Document, FinancialInfo, PersonalInfo, VerificationStatus, activity,
        address, application, document, education_record, family_member, financial_info,
        personal_info,
    },
    errors::{Error, FieldError, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{IntoActiveModel, Set, TransactionTrait, TryIntoModel, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Personal details of the applicant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfoInput {
    pub first_name: String,
    pub last_name: String,
    pub first_name_en: Option<String>,
    pub last_name_en: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub faculty: Option<String>,
    pub year_level: Option<i32>,
    pub gpa: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    /// e.g. `"home"` or `"current"`
    pub address_type: String,
    pub line1: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationInput {
    pub institution: String,
    pub level: String,
    pub gpa: Option<f64>,
    pub graduation_year: Option<i32>,
}

/// A parent, guardian or sibling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMemberInput {
    pub relationship: String,
    pub full_name: String,
    pub occupation: Option<String>,
    pub monthly_income: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialInput {
    /// Declared yearly family income
    pub family_income: Decimal,
    pub monthly_expenses: Option<Decimal>,
    pub has_student_loan: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityInput {
    pub title: String,
    pub role: Option<String>,
    pub year: Option<i32>,
}

/// Outcome of one item of [`bulk_verify_documents`].
#[derive(Debug)]
pub struct DocumentVerification {
    pub document_id: i64,
    pub result: Result<VerificationStatus>,
}

fn require_text(errors: &mut Vec<FieldError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, "must not be empty"));
    }
}

fn check_gpa(errors: &mut Vec<FieldError>, field: &str, gpa: Option<f64>) {
    if let Some(gpa) = gpa {
        if !(0.0..=4.0).contains(&gpa) {
            errors.push(FieldError::new(field, "must be between 0.0 and 4.0"));
        }
    }
}

/// Converts a non-negative amount, recording a field error otherwise.
fn non_negative_minor(errors: &mut Vec<FieldError>, field: &str, amount: Decimal) -> i64 {
    match to_minor_units(amount) {
        Ok(minor) if minor >= 0 => minor,
        _ => {
            errors.push(FieldError::new(
                field,
                "must be a non-negative amount with at most two decimal places",
            ));
            0
        }
    }
}

fn into_result(errors: Vec<FieldError>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation { errors })
    }
}

/// Creates or replaces the personal information section.
#[instrument(skip(db, caller, input))]
pub async fn upsert_personal_info(
    db: &DatabaseConnection,
    caller: &Caller,
    application_id: i64,
    input: PersonalInfoInput,
) -> Result<personal_info::Model> {
    let mut errors = Vec::new();
    let email = input.email.trim();
    if !email.is_empty() && !email.contains('@') {
        errors.push(FieldError::new("personal_info.email", "is not a valid email address"));
    }
    if let Some(year) = input.year_level {
        if !(1..=10).contains(&year) {
            errors.push(FieldError::new("personal_info.year_level", "must be between 1 and 10"));
        }
    }
    check_gpa(&mut errors, "personal_info.gpa", input.gpa);
    into_result(errors)?;

    let txn = db.begin().await?;
    lock_draft(&txn, caller, application_id, false).await?;

    let existing = PersonalInfo::find()
        .filter(personal_info::Column::ApplicationId.eq(application_id))
        .one(&txn)
        .await?;

    let mut model = match existing {
        Some(found) => found.into_active_model(),
        None => personal_info::ActiveModel {
            application_id: Set(application_id),
            ..Default::default()
        },
    };
    model.first_name = Set(input.first_name.trim().to_string());
    model.last_name = Set(input.last_name.trim().to_string());
    model.first_name_en = Set(input.first_name_en);
    model.last_name_en = Set(input.last_name_en);
    model.email = Set(email.to_string());
    model.phone = Set(input.phone);
    model.faculty = Set(input.faculty);
    model.year_level = Set(input.year_level);
    model.gpa = Set(input.gpa);

    let saved = model.save(&txn).await?.try_into_model()?;
    txn.commit().await?;

    debug!(application_id, "Personal information saved");
    Ok(saved)
}

/// Adds an address.
#[instrument(skip(db, caller, input))]
pub async fn add_address(
    db: &DatabaseConnection,
    caller: &Caller,
    application_id: i64,
    input: AddressInput,
) -> Result<address::Model> {
    let mut errors = Vec::new();
    require_text(&mut errors, "address.address_type", &input.address_type);
    require_text(&mut errors, "address.line1", &input.line1);
    require_text(&mut errors, "address.city", &input.city);
    into_result(errors)?;

    let txn = db.begin().await?;
    lock_draft(&txn, caller, application_id, false).await?;

    let saved = address::ActiveModel {
        application_id: Set(application_id),
        address_type: Set(input.address_type.trim().to_string()),
        line1: Set(input.line1),
        city: Set(input.city),
        province: Set(input.province),
        postal_code: Set(input.postal_code),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(saved)
}

/// Adds an education history record.
#[instrument(skip(db, caller, input))]
pub async fn add_education_record(
    db: &DatabaseConnection,
    caller: &Caller,
    application_id: i64,
    input: EducationInput,
) -> Result<education_record::Model> {
    let mut errors = Vec::new();
    require_text(&mut errors, "education.institution", &input.institution);
    require_text(&mut errors, "education.level", &input.level);
    check_gpa(&mut errors, "education.gpa", input.gpa);
    into_result(errors)?;

    let txn = db.begin().await?;
    lock_draft(&txn, caller, application_id, false).await?;

    let saved = education_record::ActiveModel {
        application_id: Set(application_id),
        institution: Set(input.institution),
        level: Set(input.level),
        gpa: Set(input.gpa),
        graduation_year: Set(input.graduation_year),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(saved)
}

/// Adds a family member, guardian or sibling.
#[instrument(skip(db, caller, input))]
pub async fn add_family_member(
    db: &DatabaseConnection,
    caller: &Caller,
    application_id: i64,
    input: FamilyMemberInput,
) -> Result<family_member::Model> {
    let mut errors = Vec::new();
    require_text(&mut errors, "family_member.relationship", &input.relationship);
    require_text(&mut errors, "family_member.full_name", &input.full_name);
    let income = input
        .monthly_income
        .map(|amount| non_negative_minor(&mut errors, "family_member.monthly_income", amount));
    into_result(errors)?;

    let txn = db.begin().await?;
    lock_draft(&txn, caller, application_id, false).await?;

    let saved = family_member::ActiveModel {
        application_id: Set(application_id),
        relationship: Set(input.relationship.trim().to_string()),
        full_name: Set(input.full_name),
        occupation: Set(input.occupation),
        monthly_income_minor: Set(income),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(saved)
}

/// Creates or replaces the financial information section.
#[instrument(skip(db, caller, input))]
pub async fn upsert_financial_info(
    db: &DatabaseConnection,
    caller: &Caller,
    application_id: i64,
    input: FinancialInput,
) -> Result<financial_info::Model> {
    let mut errors = Vec::new();
    let income = non_negative_minor(&mut errors, "financial_info.family_income", input.family_income);
    let expenses = input
        .monthly_expenses
        .map(|amount| non_negative_minor(&mut errors, "financial_info.monthly_expenses", amount));
    into_result(errors)?;

    let txn = db.begin().await?;
    lock_draft(&txn, caller, application_id, false).await?;

    let existing = FinancialInfo::find()
        .filter(financial_info::Column::ApplicationId.eq(application_id))
        .one(&txn)
        .await?;

    let mut model = match existing {
        Some(found) => found.into_active_model(),
        None => financial_info::ActiveModel {
            application_id: Set(application_id),
            ..Default::default()
        },
    };
    model.family_income_minor = Set(income);
    model.monthly_expenses_minor = Set(expenses);
    model.has_student_loan = Set(input.has_student_loan);

    let saved = model.save(&txn).await?.try_into_model()?;
    txn.commit().await?;

    debug!(application_id, "Financial information saved");
    Ok(saved)
}

/// Adds an extracurricular activity.
#[instrument(skip(db, caller, input))]
pub async fn add_activity(
    db: &DatabaseConnection,
    caller: &Caller,
    application_id: i64,
    input: ActivityInput,
) -> Result<activity::Model> {
    let mut errors = Vec::new();
    require_text(&mut errors, "activity.title", &input.title);
    into_result(errors)?;

    let txn = db.begin().await?;
    lock_draft(&txn, caller, application_id, false).await?;

    let saved = activity::ActiveModel {
        application_id: Set(application_id),
        title: Set(input.title),
        role: Set(input.role),
        year: Set(input.year),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(saved)
}

/// Records an uploaded document. The file itself lives in the document store.
#[instrument(skip(db, caller))]
pub async fn add_document(
    db: &DatabaseConnection,
    caller: &Caller,
    application_id: i64,
    document_type: &str,
    file_name: &str,
) -> Result<document::Model> {
    let mut errors = Vec::new();
    require_text(&mut errors, "document.document_type", document_type);
    require_text(&mut errors, "document.file_name", file_name);
    into_result(errors)?;

    let txn = db.begin().await?;
    lock_draft(&txn, caller, application_id, false).await?;

    let saved = document::ActiveModel {
        application_id: Set(application_id),
        document_type: Set(document_type.trim().to_string()),
        file_name: Set(file_name.to_string()),
        verification_status: Set(VerificationStatus::Pending),
        verified_by: Set(None),
        uploaded_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(application_id, document_id = saved.id, "Document recorded");
    Ok(saved)
}

/// Removes a document record from a draft.
#[instrument(skip(db, caller))]
pub async fn remove_document(
    db: &DatabaseConnection,
    caller: &Caller,
    application_id: i64,
    document_id: i64,
) -> Result<()> {
    let txn = db.begin().await?;
    lock_draft(&txn, caller, application_id, false).await?;

    let result = Document::delete_many()
        .filter(document::Column::Id.eq(document_id))
        .filter(document::Column::ApplicationId.eq(application_id))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("document", document_id));
    }

    txn.commit().await?;
    Ok(())
}

/// Records the student's acceptance of the scholarship terms.
#[instrument(skip(db, caller))]
pub async fn accept_terms(
    db: &DatabaseConnection,
    caller: &Caller,
    application_id: i64,
) -> Result<application::Model> {
    let txn = db.begin().await?;
    let app = lock_draft(&txn, caller, application_id, false).await?;

    let mut model = app.into_active_model();
    model.terms_accepted = Set(true);
    model.updated_at = Set(Utc::now());
    let saved = model.update(&txn).await?;

    txn.commit().await?;
    Ok(saved)
}

/// Replaces the free-form declared fields. Must be a JSON object.
#[instrument(skip(db, caller, data))]
pub async fn update_application_data(
    db: &DatabaseConnection,
    caller: &Caller,
    application_id: i64,
    data: &serde_json::Value,
) -> Result<application::Model> {
    if !data.is_object() {
        return Err(Error::invalid("application_data", "must be a JSON object"));
    }

    let txn = db.begin().await?;
    lock_draft(&txn, caller, application_id, false).await?;

    Application::update_many()
        .col_expr(
            application::Column::ApplicationData,
            Expr::value(serde_json::to_string(data)?),
        )
        .filter(application::Column::Id.eq(application_id))
        .exec(&txn)
        .await?;

    let saved = Application::find_by_id(application_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("application", application_id))?;
    txn.commit().await?;
    Ok(saved)
}

/// Sets the verification status of many documents.
///
/// Each item is an independent write: a failed item is reported in its
/// outcome and never undoes items that already succeeded.
#[instrument(skip(db, caller, items), fields(count = items.len()))]
pub async fn bulk_verify_documents(
    db: &DatabaseConnection,
    caller: &Caller,
    items: &[(i64, VerificationStatus)],
) -> Result<Vec<DocumentVerification>> {
    caller.require_staff()?;

    let mut outcomes = Vec::with_capacity(items.len());
    for &(document_id, status) in items {
        let result = verify_document(db, &caller.user_id, document_id, status).await;
        if let Err(e) = &result {
            warn!(document_id, error = %e, "Document verification failed");
        }
        outcomes.push(DocumentVerification { document_id, result });
    }

    let verified = outcomes.iter().filter(|o| o.result.is_ok()).count();
    info!(verified, failed = outcomes.len() - verified, "Bulk verification finished");
    Ok(outcomes)
}

async fn verify_document(
    db: &DatabaseConnection,
    verifier: &str,
    document_id: i64,
    status: VerificationStatus,
) -> Result<VerificationStatus> {
    let result = Document::update_many()
        .col_expr(document::Column::VerificationStatus, Expr::value(status))
        .col_expr(
            document::Column::VerifiedBy,
            Expr::value(Some(verifier.to_string())),
        )
        .filter(document::Column::Id.eq(document_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::not_found("document", document_id));
    }
    Ok(status)
}
