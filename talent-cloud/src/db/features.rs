//! Feature registry queries

use sqlx::PgPool;

/// Catalog entry for a billable capability
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Feature {
    pub key: String,
    pub kind: String,
    pub unit: String,
    pub name: String,
    pub description: String,
    pub created_at: i64,
}

pub async fn get(pool: &PgPool, key: &str) -> Result<Option<Feature>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM features WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
}

pub async fn list(pool: &PgPool) -> Result<Vec<Feature>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM features ORDER BY key")
        .fetch_all(pool)
        .await
}

pub struct CreateFeature<'a> {
    pub key: &'a str,
    pub kind: &'a str,
    pub unit: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub now: i64,
}

pub async fn create(pool: &PgPool, feature: &CreateFeature<'_>) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO features (key, kind, unit, name, description, created_at)
         VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (key) DO NOTHING",
    )
    .bind(feature.key)
    .bind(feature.kind)
    .bind(feature.unit)
    .bind(feature.name)
    .bind(feature.description)
    .bind(feature.now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update(
    pool: &PgPool,
    key: &str,
    name: &str,
    description: &str,
    unit: &str,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE features SET name = $2, description = $3, unit = $4 WHERE key = $1")
            .bind(key)
            .bind(name)
            .bind(description)
            .bind(unit)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Number of entitlement rows referencing this feature. Deletion is rejected
/// while this is non-zero (referential-integrity contract, never a cascade).
pub async fn entitlement_references(pool: &PgPool, key: &str) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM plan_entitlements WHERE feature_key = $1")
            .bind(key)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

pub async fn delete(pool: &PgPool, key: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM features WHERE key = $1")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
