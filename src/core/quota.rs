//! Quota ledger - the only writer of `scholarships.available_quota`.
//!
//! Both operations are single conditional UPDATE statements, so concurrent
//! callers can never drive the counter below zero or above `total_quota`.
//! They accept any `ConnectionTrait` so they can join a caller's transaction.

use crate::{
    entities::{Scholarship, scholarship},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{debug, instrument, warn};

/// Snapshot of a scholarship's quota counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    pub total_quota: i32,
    pub available_quota: i32,
}

impl QuotaStatus {
    /// Places already taken.
    #[must_use]
    pub const fn used(&self) -> i32 {
        self.total_quota - self.available_quota
    }
}

/// Takes one place from the scholarship's quota.
///
/// Performs `available_quota = available_quota - 1 WHERE available_quota > 0`
/// and checks the affected-row count, so the check and the decrement are one
/// atomic step.
///
/// # Errors
/// - `QuotaExhausted` when no place is left
/// - `NotFound` when the scholarship does not exist
#[instrument(skip(db))]
pub async fn reserve_quota<C>(db: &C, scholarship_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Scholarship::update_many()
        .col_expr(
            scholarship::Column::AvailableQuota,
            Expr::col(scholarship::Column::AvailableQuota).sub(1),
        )
        .col_expr(scholarship::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(scholarship::Column::Id.eq(scholarship_id))
        .filter(scholarship::Column::AvailableQuota.gt(0))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return match Scholarship::find_by_id(scholarship_id).one(db).await? {
            Some(_) => {
                warn!(scholarship_id, "Quota reservation refused: no places left");
                Err(Error::QuotaExhausted { scholarship_id })
            }
            None => Err(Error::not_found("scholarship", scholarship_id)),
        };
    }

    debug!(scholarship_id, "Quota place reserved");
    Ok(())
}

/// Returns one place to the scholarship's quota.
///
/// The update is guarded by `available_quota < total_quota`, so a release
/// without a matching reservation is refused instead of over-filling.
///
/// # Errors
/// - `Conflict` when the quota is already full
/// - `NotFound` when the scholarship does not exist
#[instrument(skip(db))]
pub async fn release_quota<C>(db: &C, scholarship_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Scholarship::update_many()
        .col_expr(
            scholarship::Column::AvailableQuota,
            Expr::col(scholarship::Column::AvailableQuota).add(1),
        )
        .col_expr(scholarship::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(scholarship::Column::Id.eq(scholarship_id))
        .filter(
            Expr::col(scholarship::Column::AvailableQuota)
                .lt(Expr::col(scholarship::Column::TotalQuota)),
        )
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return match Scholarship::find_by_id(scholarship_id).one(db).await? {
            Some(_) => Err(Error::conflict("The scholarship quota is already full")),
            None => Err(Error::not_found("scholarship", scholarship_id)),
        };
    }

    debug!(scholarship_id, "Quota place released");
    Ok(())
}

/// Reads the current quota counters.
pub async fn quota_status<C>(db: &C, scholarship_id: i64) -> Result<QuotaStatus>
where
    C: ConnectionTrait,
{
    let scholarship = Scholarship::find_by_id(scholarship_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("scholarship", scholarship_id))?;

    Ok(QuotaStatus {
        total_quota: scholarship.total_quota,
        available_quota: scholarship.available_quota,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::errors::ErrorKind;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_reserve_and_release_keep_bounds() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Quota", 2).await?;

        reserve_quota(&db, scholarship.id).await?;
        reserve_quota(&db, scholarship.id).await?;
        let status = quota_status(&db, scholarship.id).await?;
        assert_eq!(status.available_quota, 0);
        assert_eq!(status.used(), 2);

        let err = reserve_quota(&db, scholarship.id).await.unwrap_err();
        assert!(matches!(err, Error::QuotaExhausted { .. }));
        assert_eq!(quota_status(&db, scholarship.id).await?.available_quota, 0);

        release_quota(&db, scholarship.id).await?;
        release_quota(&db, scholarship.id).await?;
        assert_eq!(quota_status(&db, scholarship.id).await?.available_quota, 2);

        let err = release_quota(&db, scholarship.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(quota_status(&db, scholarship.id).await?.available_quota, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_scholarship_is_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        assert_eq!(
            reserve_quota(&db, 999).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            release_quota(&db, 999).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_on_last_place() -> Result<()> {
        let pooled = setup_pooled_test_db(4).await?;
        let db = pooled.db.clone();
        let scholarship = create_test_scholarship(&db, "Last Place", 1).await?;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            let id = scholarship.id;
            handles.push(tokio::spawn(async move { reserve_quota(&db, id).await }));
        }

        let mut successes = 0;
        let mut exhausted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => successes += 1,
                Err(Error::QuotaExhausted { .. }) => exhausted += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(exhausted, 7);
        assert_eq!(quota_status(&db, scholarship.id).await?.available_quota, 0);
        Ok(())
    }
}
