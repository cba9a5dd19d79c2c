//! Scholarship business logic - creation and lookup of scholarships.
//!
//! Creation validates every field up front and reports all problems at once.
//! After creation `available_quota` belongs to the quota ledger.

use crate::{
    core::{
        access::Caller,
        eligibility::EligibilityCriteria,
        is_unique_violation,
        money::to_minor_units,
    },
    entities::{Scholarship, scholarship},
    errors::{Error, FieldError, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{info, instrument};

/// Input for [`create_scholarship`].
#[derive(Debug, Clone)]
pub struct NewScholarship {
    pub name: String,
    /// Default award per recipient
    pub amount: Decimal,
    pub total_quota: i32,
    pub application_start_date: NaiveDate,
    pub application_end_date: NaiveDate,
    pub eligibility_criteria: EligibilityCriteria,
    /// Document types required in addition to `id_card` and `transcript`
    pub required_documents: Vec<String>,
    pub is_active: bool,
}

fn validate_new_scholarship(new: &NewScholarship) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if new.name.trim().is_empty() {
        errors.push(FieldError::new("name", "must not be empty"));
    }
    match to_minor_units(new.amount) {
        Ok(minor) if minor > 0 => {}
        _ => errors.push(FieldError::new(
            "amount",
            "must be a positive amount with at most two decimal places",
        )),
    }
    if new.total_quota <= 0 {
        errors.push(FieldError::new("total_quota", "must be at least 1"));
    }
    if new.application_end_date < new.application_start_date {
        errors.push(FieldError::new(
            "application_end_date",
            "must not be before the start date",
        ));
    }
    if new.required_documents.iter().any(|d| d.trim().is_empty()) {
        errors.push(FieldError::new(
            "required_documents",
            "document types must not be empty",
        ));
    }
    errors.extend(new.eligibility_criteria.validate());

    errors
}

/// Creates a scholarship with `available_quota = total_quota`.
///
/// # Errors
/// - `Forbidden` unless the caller is staff
/// - `Validation` listing every invalid field
/// - `Conflict` if a scholarship with the same name exists
#[instrument(skip(db, new), fields(name = %new.name))]
pub async fn create_scholarship<C>(
    db: &C,
    caller: &Caller,
    new: NewScholarship,
) -> Result<scholarship::Model>
where
    C: ConnectionTrait,
{
    caller.require_staff()?;

    let errors = validate_new_scholarship(&new);
    if !errors.is_empty() {
        return Err(Error::Validation { errors });
    }

    let now = Utc::now();
    let model = scholarship::ActiveModel {
        name: Set(new.name.trim().to_string()),
        amount_minor: Set(to_minor_units(new.amount)?),
        total_quota: Set(new.total_quota),
        available_quota: Set(new.total_quota),
        application_start_date: Set(new.application_start_date),
        application_end_date: Set(new.application_end_date),
        eligibility_criteria: Set(new.eligibility_criteria.to_json()?),
        required_documents: Set(serde_json::to_string(&new.required_documents)?),
        is_active: Set(new.is_active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let created = model.insert(db).await.map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict("A scholarship with this name already exists")
        } else {
            Error::from(e)
        }
    })?;

    info!(
        scholarship_id = created.id,
        total_quota = created.total_quota,
        "Scholarship created"
    );
    Ok(created)
}

/// Finds a scholarship by its unique ID.
pub async fn get_scholarship<C>(db: &C, scholarship_id: i64) -> Result<Option<scholarship::Model>>
where
    C: ConnectionTrait,
{
    Scholarship::find_by_id(scholarship_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Like [`get_scholarship`] but fails with `NotFound` when absent.
pub async fn require_scholarship<C>(db: &C, scholarship_id: i64) -> Result<scholarship::Model>
where
    C: ConnectionTrait,
{
    get_scholarship(db, scholarship_id)
        .await?
        .ok_or_else(|| Error::not_found("scholarship", scholarship_id))
}

/// Finds a scholarship by name.
pub async fn get_scholarship_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<scholarship::Model>> {
    Scholarship::find()
        .filter(scholarship::Column::Name.eq(name.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists active scholarships ordered by name.
pub async fn list_active_scholarships(
    db: &DatabaseConnection,
) -> Result<Vec<scholarship::Model>> {
    Scholarship::find()
        .filter(scholarship::Column::IsActive.eq(true))
        .order_by_asc(scholarship::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}
