//! Per-plan feature entitlement queries

use sqlx::PgPool;

/// The `(plan, feature)` row defining whether and how much of a feature a
/// plan grants. Edits take immediate effect for every holder on the plan.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Entitlement {
    pub plan_id: String,
    pub feature_key: String,
    pub enabled: bool,
    pub monthly_cap: i64,
    pub overage_unit_cents: Option<i64>,
}

/// All entitlement rows of a plan joined with the feature kind, ordered for
/// stable snapshot output.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct EntitledFeature {
    pub feature_key: String,
    pub kind: String,
    pub enabled: bool,
    pub monthly_cap: i64,
    pub overage_unit_cents: Option<i64>,
}

/// Single entitlement row joined with the feature kind; what the quota check
/// resolves against.
pub async fn get_with_kind(
    pool: &PgPool,
    plan_id: &str,
    feature_key: &str,
) -> Result<Option<EntitledFeature>, sqlx::Error> {
    sqlx::query_as(
        "SELECT e.feature_key, f.kind, e.enabled, e.monthly_cap, e.overage_unit_cents
            FROM plan_entitlements e
            JOIN features f ON f.key = e.feature_key
            WHERE e.plan_id = $1 AND e.feature_key = $2",
    )
    .bind(plan_id)
    .bind(feature_key)
    .fetch_optional(pool)
    .await
}

pub async fn list_for_plan(
    pool: &PgPool,
    plan_id: &str,
) -> Result<Vec<EntitledFeature>, sqlx::Error> {
    sqlx::query_as(
        "SELECT e.feature_key, f.kind, e.enabled, e.monthly_cap, e.overage_unit_cents
            FROM plan_entitlements e
            JOIN features f ON f.key = e.feature_key
            WHERE e.plan_id = $1
            ORDER BY e.feature_key",
    )
    .bind(plan_id)
    .fetch_all(pool)
    .await
}

/// Create or overwrite the entitlement row for `(plan, feature)`.
pub async fn upsert(pool: &PgPool, row: &Entitlement) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO plan_entitlements (plan_id, feature_key, enabled, monthly_cap, overage_unit_cents)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (plan_id, feature_key) DO UPDATE SET
            enabled = $3, monthly_cap = $4, overage_unit_cents = $5",
    )
    .bind(&row.plan_id)
    .bind(&row.feature_key)
    .bind(row.enabled)
    .bind(row.monthly_cap)
    .bind(row.overage_unit_cents)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, plan_id: &str, feature_key: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM plan_entitlements WHERE plan_id = $1 AND feature_key = $2")
            .bind(plan_id)
            .bind(feature_key)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}
