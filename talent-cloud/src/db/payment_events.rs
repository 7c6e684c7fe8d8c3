//! Payment gateway event log
//!
//! Append-only audit of inbound billing-gateway notifications. Insert-first
//! idempotency on `(gateway, event_id)`: the INSERT happens before any
//! processing and a zero rows-affected result means a duplicate delivery,
//! eliminating the check-then-insert race.

use sqlx::PgPool;

/// Record an inbound event; `false` means this `(gateway, event_id)` was
/// already processed and the caller should acknowledge without reprocessing.
pub async fn record(
    pool: &PgPool,
    gateway: &str,
    event_id: &str,
    event_type: &str,
    payload: &serde_json::Value,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO payment_events (gateway, event_id, event_type, payload, processed_at)
         VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
    )
    .bind(gateway)
    .bind(event_id)
    .bind(event_type)
    .bind(payload)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct PaymentEvent {
    pub gateway: String,
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub processed_at: i64,
}

/// Recent events, newest first (operational inspection).
pub async fn list_recent(pool: &PgPool, limit: i32) -> Result<Vec<PaymentEvent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_events ORDER BY processed_at DESC LIMIT $1")
        .bind(limit)
        .fetch_all(pool)
        .await
}
