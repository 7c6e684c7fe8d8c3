//! Usage ledger queries
//!
//! One counter row per holder/feature; `period_start` marks the billing
//! period the counter belongs to. The database is the sole serialization
//! point: every write here is a single conditional statement, never a
//! read-then-write.

use shared::Holder;
use sqlx::PgPool;

#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct UsageCounter {
    pub consumed: i64,
    pub extra_allowance: i64,
}

/// Consumption for the given period. A row from an older period (or no row
/// at all) reads as zero: the fresh period simply has not been materialized
/// yet, and reads must not materialize it.
pub async fn fetch(
    pool: &PgPool,
    holder: &Holder,
    feature_key: &str,
    period_start: i64,
) -> Result<UsageCounter, sqlx::Error> {
    let row: Option<UsageCounter> = sqlx::query_as(
        "SELECT consumed, extra_allowance FROM usage_ledger
            WHERE holder_type = $1 AND holder_id = $2
              AND feature_key = $3 AND period_start = $4",
    )
    .bind(holder.holder_type.as_db())
    .bind(&holder.id)
    .bind(feature_key)
    .bind(period_start)
    .fetch_optional(pool)
    .await?;
    Ok(row.unwrap_or(UsageCounter {
        consumed: 0,
        extra_allowance: 0,
    }))
}

/// Lazily materialize the counter for the current period.
///
/// Creates the row if absent, or rolls a stale row forward (zeroing it) if it
/// still carries an older `period_start`. Both paths are guarded so that two
/// concurrent callers converge on one fresh row.
pub async fn ensure_current(
    pool: &PgPool,
    holder: &Holder,
    feature_key: &str,
    period_start: i64,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO usage_ledger
            (holder_type, holder_id, feature_key, period_start,
             consumed, extra_allowance, updated_at)
         VALUES ($1, $2, $3, $4, 0, 0, $5)
         ON CONFLICT (holder_type, holder_id, feature_key) DO UPDATE SET
            period_start = $4, consumed = 0, extra_allowance = 0, updated_at = $5
         WHERE usage_ledger.period_start < $4",
    )
    .bind(holder.holder_type.as_db())
    .bind(&holder.id)
    .bind(feature_key)
    .bind(period_start)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// The atomic conditional increment backing `consume` for metered features.
///
/// Returns `false` when the guard fails, i.e. the cap was already exhausted
/// by a concurrent consumer. The caller decides what to do with that (the
/// documented overshoot path).
pub async fn try_consume(
    pool: &PgPool,
    holder: &Holder,
    feature_key: &str,
    period_start: i64,
    amount: i64,
    cap: i64,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE usage_ledger SET consumed = consumed + $5, updated_at = $7
            WHERE holder_type = $1 AND holder_id = $2
              AND feature_key = $3 AND period_start = $4
              AND consumed + $5 <= $6 + extra_allowance",
    )
    .bind(holder.holder_type.as_db())
    .bind(&holder.id)
    .bind(feature_key)
    .bind(period_start)
    .bind(amount)
    .bind(cap)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Unconditional increment: boolean features (counted but never capped) and
/// the overshoot path, where the gated action already happened and the
/// increment must not be dropped. Returns the new total.
pub async fn force_consume(
    pool: &PgPool,
    holder: &Holder,
    feature_key: &str,
    period_start: i64,
    amount: i64,
    now: i64,
) -> Result<i64, sqlx::Error> {
    let (consumed,): (i64,) = sqlx::query_as(
        "UPDATE usage_ledger SET consumed = consumed + $5, updated_at = $6
            WHERE holder_type = $1 AND holder_id = $2
              AND feature_key = $3 AND period_start = $4
            RETURNING consumed",
    )
    .bind(holder.holder_type.as_db())
    .bind(&holder.id)
    .bind(feature_key)
    .bind(period_start)
    .bind(amount)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(consumed)
}

/// Admin credit grant: additive, current period only, does not roll over.
pub async fn grant_extra_allowance(
    pool: &PgPool,
    holder: &Holder,
    feature_key: &str,
    period_start: i64,
    amount: i64,
    now: i64,
) -> Result<i64, sqlx::Error> {
    ensure_current(pool, holder, feature_key, period_start, now).await?;
    let (extra,): (i64,) = sqlx::query_as(
        "UPDATE usage_ledger SET extra_allowance = extra_allowance + $5, updated_at = $6
            WHERE holder_type = $1 AND holder_id = $2
              AND feature_key = $3 AND period_start = $4
            RETURNING extra_allowance",
    )
    .bind(holder.holder_type.as_db())
    .bind(&holder.id)
    .bind(feature_key)
    .bind(period_start)
    .bind(amount)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(extra)
}

/// Period rollover: zero every counter of the holder that still belongs to an
/// older period. The `period_start < $3` guard makes a second concurrent run
/// a no-op.
pub async fn reset_for_holder(
    pool: &PgPool,
    holder: &Holder,
    new_period_start: i64,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE usage_ledger
            SET period_start = $3, consumed = 0, extra_allowance = 0, updated_at = $4
            WHERE holder_type = $1 AND holder_id = $2 AND period_start < $3",
    )
    .bind(holder.holder_type.as_db())
    .bind(&holder.id)
    .bind(new_period_start)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
