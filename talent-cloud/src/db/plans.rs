//! Plan catalog queries

use sqlx::PgPool;

/// A sellable subscription tier
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Plan {
    pub id: String,
    pub product: String,
    pub tier: String,
    pub interval: String,
    pub price_cents: i64,
    pub is_public: bool,
    pub created_at: i64,
}

pub async fn get(pool: &PgPool, id: &str) -> Result<Option<Plan>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list(pool: &PgPool) -> Result<Vec<Plan>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM plans ORDER BY product, tier")
        .fetch_all(pool)
        .await
}

pub struct CreatePlan<'a> {
    pub id: &'a str,
    pub product: &'a str,
    pub tier: &'a str,
    pub interval: &'a str,
    pub price_cents: i64,
    pub is_public: bool,
    pub now: i64,
}

pub async fn create(pool: &PgPool, plan: &CreatePlan<'_>) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO plans (id, product, tier, interval, price_cents, is_public, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT (id) DO NOTHING",
    )
    .bind(plan.id)
    .bind(plan.product)
    .bind(plan.tier)
    .bind(plan.interval)
    .bind(plan.price_cents)
    .bind(plan.is_public)
    .bind(plan.now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Plans are append-only in spirit: only visibility and price are editable.
/// Repricing for existing subscribers ships as a new plan id.
pub async fn update(
    pool: &PgPool,
    id: &str,
    price_cents: i64,
    is_public: bool,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE plans SET price_cents = $2, is_public = $3 WHERE id = $1")
        .bind(id)
        .bind(price_cents)
        .bind(is_public)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Number of non-canceled subscriptions referencing this plan. Deletion is
/// rejected while this is non-zero.
pub async fn subscription_references(pool: &PgPool, id: &str) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM subscriptions WHERE plan_id = $1 AND status <> 'canceled'",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    sqlx::query("DELETE FROM plan_entitlements WHERE plan_id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    let result = sqlx::query("DELETE FROM plans WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
