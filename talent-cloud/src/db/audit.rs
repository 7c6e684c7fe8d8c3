//! Audit log operations

use shared::Holder;
use sqlx::PgPool;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Write an audit log entry
pub async fn log(
    pool: &PgPool,
    holder: &Holder,
    action: &str,
    detail: Option<&serde_json::Value>,
    now: i64,
) -> Result<(), BoxError> {
    sqlx::query(
        "INSERT INTO audit_logs (holder_type, holder_id, action, detail, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(holder.holder_type.as_db())
    .bind(&holder.id)
    .bind(action)
    .bind(detail)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Query audit log entries for a holder (paginated)
#[derive(sqlx::FromRow, serde::Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub action: String,
    pub detail: Option<serde_json::Value>,
    pub created_at: i64,
}

pub async fn query(
    pool: &PgPool,
    holder: &Holder,
    limit: i32,
    offset: i32,
) -> Result<Vec<AuditEntry>, BoxError> {
    let rows: Vec<AuditEntry> = sqlx::query_as(
        "SELECT id, action, detail, created_at FROM audit_logs
            WHERE holder_type = $1 AND holder_id = $2
            ORDER BY created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(holder.holder_type.as_db())
    .bind(&holder.id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
