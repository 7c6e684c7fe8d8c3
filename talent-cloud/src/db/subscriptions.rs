//! Subscription queries
//!
//! Rows are written by checkout/admin flows and the payment-event ingest;
//! the metering engine itself only reads them. Period/status mutation happens
//! through the conditional updates at the bottom, which the billing cycle
//! scheduler relies on for multi-instance idempotency.

use shared::Holder;
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Subscription {
    pub id: String,
    pub holder_type: String,
    pub holder_id: String,
    pub plan_id: String,
    pub status: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub canceled_at: Option<i64>,
    pub scheduled_cancellation_date: Option<i64>,
    pub created_at: i64,
}

/// Current active subscription for a holder, if any.
///
/// Callers fall back to [`shared::billing::FREE_PLAN_ID`] when this returns
/// `None`; the fallback lives in the metering engine, not here.
pub async fn resolve_active(
    pool: &PgPool,
    holder: &Holder,
    now: i64,
) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM subscriptions
            WHERE holder_type = $1 AND holder_id = $2
              AND status = 'active' AND current_period_end >= $3
            ORDER BY created_at DESC
            LIMIT 1",
    )
    .bind(holder.holder_type.as_db())
    .bind(&holder.id)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub async fn get(pool: &PgPool, id: &str) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM subscriptions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub struct CreateSubscription<'a> {
    pub id: &'a str,
    pub holder: &'a Holder,
    pub plan_id: &'a str,
    pub period_start: i64,
    pub period_end: i64,
    pub now: i64,
}

/// Create or re-activate a subscription (checkout completion, gateway replay).
///
/// A holder carries at most one active subscription (partial unique index),
/// so a checkout arriving under a new id must supersede the holder's current
/// active row in the same transaction. A plain insert would violate the
/// index, and the already-recorded event could never be replayed.
pub async fn upsert_active(
    pool: &PgPool,
    sub: &CreateSubscription<'_>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE subscriptions SET status = 'canceled', canceled_at = $3
            WHERE holder_type = $1 AND holder_id = $2
              AND status = 'active' AND id <> $4",
    )
    .bind(sub.holder.holder_type.as_db())
    .bind(&sub.holder.id)
    .bind(sub.now)
    .bind(sub.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO subscriptions
            (id, holder_type, holder_id, plan_id, status,
             current_period_start, current_period_end, created_at)
         VALUES ($1, $2, $3, $4, 'active', $5, $6, $7)
         ON CONFLICT (id) DO UPDATE SET
            status = 'active', plan_id = $4,
            current_period_start = $5, current_period_end = $6,
            canceled_at = NULL, scheduled_cancellation_date = NULL",
    )
    .bind(sub.id)
    .bind(sub.holder.holder_type.as_db())
    .bind(&sub.holder.id)
    .bind(sub.plan_id)
    .bind(sub.period_start)
    .bind(sub.period_end)
    .bind(sub.now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn update_status(pool: &PgPool, id: &str, status: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE subscriptions SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Admin plan change, immediate effect. Entitlements of the new plan apply
/// from the next check; the running period and its usage are kept.
pub async fn change_plan(pool: &PgPool, id: &str, plan_id: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE subscriptions SET plan_id = $1 WHERE id = $2 AND status <> 'canceled'")
            .bind(plan_id)
            .bind(id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Pending, non-immediate cancellation: takes effect at period end without an
/// early status change.
pub async fn schedule_cancellation(
    pool: &PgPool,
    id: &str,
    effective_at: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE subscriptions SET scheduled_cancellation_date = $1
            WHERE id = $2 AND status = 'active'",
    )
    .bind(effective_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn cancel_now(pool: &PgPool, id: &str, now: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE subscriptions SET status = 'canceled', canceled_at = $1
            WHERE id = $2 AND status <> 'canceled'",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Period-end refresh from a gateway event (payment recovery).
pub async fn set_period_end(pool: &PgPool, id: &str, period_end: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE subscriptions SET current_period_end = $1 WHERE id = $2")
        .bind(period_end)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Scheduler view of an elapsed subscription: the row plus the billing
/// interval of its plan.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DueSubscription {
    pub id: String,
    pub holder_type: String,
    pub holder_id: String,
    pub interval: String,
    pub current_period_end: i64,
    pub scheduled_cancellation_date: Option<i64>,
}

/// Active subscriptions whose period has elapsed; scheduler input.
pub async fn list_due(pool: &PgPool, now: i64) -> Result<Vec<DueSubscription>, sqlx::Error> {
    sqlx::query_as(
        "SELECT s.id, s.holder_type, s.holder_id, p.interval,
                s.current_period_end, s.scheduled_cancellation_date
            FROM subscriptions s
            JOIN plans p ON p.id = s.plan_id
            WHERE s.status = 'active' AND s.current_period_end < $1",
    )
    .bind(now)
    .fetch_all(pool)
    .await
}

/// Conditional period advance keyed on the old `current_period_end`.
///
/// A concurrent scheduler run that already advanced this row matches zero
/// rows here and must then skip the ledger reset. Idempotent by construction,
/// not by external locking.
pub async fn advance_period(
    pool: &PgPool,
    id: &str,
    old_period_end: i64,
    new_period_end: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE subscriptions
            SET current_period_start = current_period_end, current_period_end = $1
            WHERE id = $2 AND current_period_end = $3 AND status = 'active'",
    )
    .bind(new_period_end)
    .bind(id)
    .bind(old_period_end)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Conditional cancel for subscriptions whose scheduled cancellation date has
/// been reached. Same old-period-end guard as [`advance_period`].
pub async fn cancel_elapsed(
    pool: &PgPool,
    id: &str,
    old_period_end: i64,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE subscriptions SET status = 'canceled', canceled_at = $1
            WHERE id = $2 AND current_period_end = $3 AND status = 'active'",
    )
    .bind(now)
    .bind(id)
    .bind(old_period_end)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
