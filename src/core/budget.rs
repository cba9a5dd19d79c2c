//! Budget ledger - the only writer of a budget's allocated/remaining pair.
//!
//! Budgets are keyed by `(scholarship_id, budget_year)`. Reservations use a
//! guarded additive UPDATE so `allocated_budget <= total_budget` holds under
//! concurrency, and `remaining_budget` is recomputed in the same statement.

use crate::{
    core::{
        access::Caller,
        is_unique_violation,
        money::{from_minor_units, positive_minor_units, to_minor_units},
    },
    entities::{Budget, budget},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Read-only view of a budget with its utilization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetSummary {
    pub scholarship_id: i64,
    pub budget_year: i32,
    pub total_budget: Decimal,
    pub allocated_budget: Decimal,
    pub remaining_budget: Decimal,
    /// `allocated / total * 100`, two decimal places; zero for a zero budget
    pub utilization_percent: Decimal,
}

/// Creates the budget for one scholarship year with nothing allocated.
///
/// # Errors
/// - `Forbidden` unless the caller is staff
/// - `InvalidAmount` for negative totals or sub-cent precision
/// - `Conflict` if the year already has a budget
#[instrument(skip(db, caller))]
pub async fn create_budget<C>(
    db: &C,
    caller: &Caller,
    scholarship_id: i64,
    budget_year: i32,
    total: Decimal,
) -> Result<budget::Model>
where
    C: ConnectionTrait,
{
    caller.require_staff()?;

    let total_minor = to_minor_units(total)?;
    if total_minor < 0 {
        return Err(Error::InvalidAmount { amount: total });
    }
    crate::core::scholarship::require_scholarship(db, scholarship_id).await?;

    let model = budget::ActiveModel {
        scholarship_id: Set(scholarship_id),
        budget_year: Set(budget_year),
        total_budget: Set(total_minor),
        allocated_budget: Set(0),
        remaining_budget: Set(total_minor),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };

    let created = model.insert(db).await.map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict("A budget already exists for this scholarship and year")
        } else {
            Error::from(e)
        }
    })?;

    info!(scholarship_id, budget_year, %total, "Budget created");
    Ok(created)
}

/// Finds the budget for a scholarship year.
pub async fn get_budget<C>(
    db: &C,
    scholarship_id: i64,
    budget_year: i32,
) -> Result<Option<budget::Model>>
where
    C: ConnectionTrait,
{
    Budget::find()
        .filter(budget::Column::ScholarshipId.eq(scholarship_id))
        .filter(budget::Column::BudgetYear.eq(budget_year))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists every budget year of a scholarship, oldest first.
pub async fn list_budgets<C>(db: &C, scholarship_id: i64) -> Result<Vec<budget::Model>>
where
    C: ConnectionTrait,
{
    Budget::find()
        .filter(budget::Column::ScholarshipId.eq(scholarship_id))
        .order_by_asc(budget::Column::BudgetYear)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Adds `amount` to `allocated_budget` if it still fits under `total_budget`.
///
/// Runs as one statement:
/// `allocated = allocated + amount, remaining = total - allocated - amount
///  WHERE allocated <= total - amount`. Zero affected rows means the budget is
/// missing or cannot cover the amount; both leave the row unchanged.
///
/// # Errors
/// - `InvalidAmount` unless `amount` is positive with at most two decimals
/// - `BudgetExceeded` when the reservation would overcommit the budget
/// - `NotFound` when no budget exists for the year
#[instrument(skip(db))]
pub async fn reserve_budget<C>(
    db: &C,
    scholarship_id: i64,
    budget_year: i32,
    amount: Decimal,
) -> Result<budget::Model>
where
    C: ConnectionTrait,
{
    let amount_minor = positive_minor_units(amount)?;

    let result = Budget::update_many()
        .col_expr(
            budget::Column::AllocatedBudget,
            Expr::col(budget::Column::AllocatedBudget).add(amount_minor),
        )
        .col_expr(
            budget::Column::RemainingBudget,
            Expr::col(budget::Column::TotalBudget)
                .sub(Expr::col(budget::Column::AllocatedBudget))
                .sub(amount_minor),
        )
        .col_expr(budget::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(budget::Column::ScholarshipId.eq(scholarship_id))
        .filter(budget::Column::BudgetYear.eq(budget_year))
        .filter(
            Expr::col(budget::Column::AllocatedBudget)
                .lte(Expr::col(budget::Column::TotalBudget).sub(amount_minor)),
        )
        .exec(db)
        .await?;

    let current = get_budget(db, scholarship_id, budget_year)
        .await?
        .ok_or_else(|| Error::not_found("budget", format!("{scholarship_id}/{budget_year}")))?;

    if result.rows_affected == 0 {
        warn!(
            scholarship_id,
            budget_year,
            %amount,
            remaining = %current.remaining(),
            "Budget reservation refused"
        );
        return Err(Error::BudgetExceeded {
            scholarship_id,
            budget_year,
            requested: amount,
            remaining: current.remaining(),
        });
    }

    debug!(scholarship_id, budget_year, %amount, "Budget reserved");
    Ok(current)
}

/// Subtracts `amount` from `allocated_budget`.
///
/// Guarded by `allocated_budget >= amount` so a release can never push the
/// allocation negative.
///
/// # Errors
/// - `InvalidAmount` unless `amount` is positive with at most two decimals
/// - `Conflict` when less than `amount` is allocated
/// - `NotFound` when no budget exists for the year
#[instrument(skip(db))]
pub async fn release_budget<C>(
    db: &C,
    scholarship_id: i64,
    budget_year: i32,
    amount: Decimal,
) -> Result<budget::Model>
where
    C: ConnectionTrait,
{
    let amount_minor = positive_minor_units(amount)?;

    let result = Budget::update_many()
        .col_expr(
            budget::Column::AllocatedBudget,
            Expr::col(budget::Column::AllocatedBudget).sub(amount_minor),
        )
        .col_expr(
            budget::Column::RemainingBudget,
            Expr::col(budget::Column::TotalBudget)
                .sub(Expr::col(budget::Column::AllocatedBudget))
                .add(amount_minor),
        )
        .col_expr(budget::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(budget::Column::ScholarshipId.eq(scholarship_id))
        .filter(budget::Column::BudgetYear.eq(budget_year))
        .filter(budget::Column::AllocatedBudget.gte(amount_minor))
        .exec(db)
        .await?;

    let current = get_budget(db, scholarship_id, budget_year)
        .await?
        .ok_or_else(|| Error::not_found("budget", format!("{scholarship_id}/{budget_year}")))?;

    if result.rows_affected == 0 {
        return Err(Error::conflict(
            "Cannot release more than is allocated from this budget",
        ));
    }

    debug!(scholarship_id, budget_year, %amount, "Budget released");
    Ok(current)
}

/// Utilization as a percentage with two decimal places; zero when `total` is zero.
#[must_use]
pub fn calculate_utilization(allocated: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }

    (allocated * Decimal::ONE_HUNDRED / total).round_dp(2)
}

/// Read-only budget summary for one scholarship year.
pub async fn budget_summary<C>(
    db: &C,
    scholarship_id: i64,
    budget_year: i32,
) -> Result<BudgetSummary>
where
    C: ConnectionTrait,
{
    let budget = get_budget(db, scholarship_id, budget_year)
        .await?
        .ok_or_else(|| Error::not_found("budget", format!("{scholarship_id}/{budget_year}")))?;

    Ok(summarize(&budget))
}

/// Builds a [`BudgetSummary`] from a stored row.
#[must_use]
pub fn summarize(budget: &budget::Model) -> BudgetSummary {
    BudgetSummary {
        scholarship_id: budget.scholarship_id,
        budget_year: budget.budget_year,
        total_budget: budget.total(),
        allocated_budget: budget.allocated(),
        remaining_budget: budget.remaining(),
        utilization_percent: calculate_utilization(
            from_minor_units(budget.allocated_budget),
            from_minor_units(budget.total_budget),
        ),
    }
}
