//! Payment gateway event ingest
//!
//! POST /payments/webhook — reacts to billing-gateway notifications that were
//! already signature-verified by the upstream webhook receiver. Idempotency is
//! insert-first on `(gateway, event_id)`: the event row is written before any
//! processing and a duplicate delivery is acknowledged without reprocessing.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use shared::billing::{BillingInterval, SubscriptionStatus};
use shared::util::now_millis;
use shared::Holder;

use crate::api::parse_holder;
use crate::db;
use crate::scheduler;
use crate::state::AppState;

pub async fn handle_webhook(
    State(state): State<AppState>,
    Json(event): Json<serde_json::Value>,
) -> StatusCode {
    let gateway = event["gateway"].as_str().unwrap_or("unknown");
    let event_type = event["type"].as_str().unwrap_or("");
    tracing::info!(gateway = gateway, event_type = event_type, "Received payment event");

    let event_id = match event["id"].as_str() {
        Some(id) => id,
        None => {
            tracing::warn!("Payment event missing id");
            return StatusCode::BAD_REQUEST;
        }
    };

    let now = now_millis();
    match db::payment_events::record(&state.pool, gateway, event_id, event_type, &event, now).await
    {
        Ok(false) => {
            tracing::info!(event_id = event_id, "Duplicate payment event, skipping");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(%e, "DB error recording payment event");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        Ok(true) => {} // New event, proceed
    }

    match event_type {
        "checkout.completed" => handle_checkout_completed(&state, &event, now).await,
        "payment.failed" => handle_payment_failed(&state, &event).await,
        "payment.recovered" => handle_payment_recovered(&state, &event).await,
        "subscription.canceled" => handle_subscription_canceled(&state, &event, now).await,
        _ => {
            tracing::debug!(event_type = event_type, "Unhandled payment event type");
            StatusCode::OK
        }
    }
}

fn event_object(event: &serde_json::Value) -> Option<&serde_json::Value> {
    event.get("data").and_then(|d| d.get("object"))
}

fn event_holder(obj: &serde_json::Value) -> Option<Holder> {
    let holder = obj.get("holder")?;
    parse_holder(holder["type"].as_str()?, holder["id"].as_str()?).ok()
}

/// checkout.completed → create or re-activate the holder's subscription with
/// a fresh billing period
async fn handle_checkout_completed(
    state: &AppState,
    event: &serde_json::Value,
    now: i64,
) -> StatusCode {
    let obj = match event_object(event) {
        Some(o) => o,
        None => return StatusCode::OK,
    };

    let holder = match event_holder(obj) {
        Some(h) => h,
        None => {
            tracing::warn!("checkout.completed missing or malformed holder");
            return StatusCode::OK;
        }
    };

    let subscription_id = match obj["subscription"].as_str() {
        Some(s) => s,
        None => {
            tracing::warn!("checkout.completed missing subscription");
            return StatusCode::OK;
        }
    };

    let plan_id = match obj["plan_id"].as_str() {
        Some(p) => p,
        None => {
            tracing::warn!("checkout.completed missing plan_id");
            return StatusCode::OK;
        }
    };

    let plan = match db::plans::get(&state.pool, plan_id).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            tracing::warn!(plan_id = plan_id, "checkout.completed references unknown plan");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(%e, "DB error loading plan for checkout event");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    // Period start is the checkout time; the gateway may override the end.
    let interval = BillingInterval::from_db(&plan.interval).unwrap_or(BillingInterval::Monthly);
    let period_end = obj["period_end"]
        .as_i64()
        .unwrap_or_else(|| scheduler::advance_period(now, interval));

    let sub = db::subscriptions::CreateSubscription {
        id: subscription_id,
        holder: &holder,
        plan_id,
        period_start: now,
        period_end,
        now,
    };
    if let Err(e) = db::subscriptions::upsert_active(&state.pool, &sub).await {
        tracing::error!(%e, "Failed to upsert subscription");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    tracing::info!(
        holder = %holder,
        subscription_id = subscription_id,
        plan_id = plan_id,
        "Subscription activated via checkout"
    );

    let detail = serde_json::json!({ "subscription_id": subscription_id, "plan_id": plan_id });
    let _ = db::audit::log(&state.pool, &holder, "subscription_activated", Some(&detail), now)
        .await;

    StatusCode::OK
}

/// payment.failed → active → past_due. Resolution only honors active rows,
/// so the holder meters against the free plan until the payment recovers;
/// dunning is the gateway's job.
async fn handle_payment_failed(state: &AppState, event: &serde_json::Value) -> StatusCode {
    let obj = match event_object(event) {
        Some(o) => o,
        None => return StatusCode::OK,
    };

    let sub_id = match obj["subscription"].as_str() {
        Some(s) => s,
        None => return StatusCode::OK,
    };

    if let Err(e) =
        db::subscriptions::update_status(&state.pool, sub_id, SubscriptionStatus::PastDue.as_db())
            .await
    {
        tracing::error!(%e, "Failed to mark subscription past_due");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    tracing::info!(subscription_id = sub_id, "Subscription past due (payment failed)");
    StatusCode::OK
}

/// payment.recovered → past_due → active, refreshing the period end when the
/// event carries one
async fn handle_payment_recovered(state: &AppState, event: &serde_json::Value) -> StatusCode {
    let obj = match event_object(event) {
        Some(o) => o,
        None => return StatusCode::OK,
    };

    let sub_id = match obj["subscription"].as_str() {
        Some(s) => s,
        None => return StatusCode::OK,
    };

    if let Err(e) =
        db::subscriptions::update_status(&state.pool, sub_id, SubscriptionStatus::Active.as_db())
            .await
    {
        tracing::error!(%e, "Failed to re-activate subscription");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    if let Some(period_end) = obj["period_end"].as_i64() {
        if let Err(e) = db::subscriptions::set_period_end(&state.pool, sub_id, period_end).await {
            tracing::error!(%e, "Failed to refresh period end");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    }

    tracing::info!(subscription_id = sub_id, "Subscription recovered");
    StatusCode::OK
}

/// subscription.canceled → immediate terminal transition; the holder falls
/// back to the free plan on the next check
async fn handle_subscription_canceled(
    state: &AppState,
    event: &serde_json::Value,
    now: i64,
) -> StatusCode {
    let obj = match event_object(event) {
        Some(o) => o,
        None => return StatusCode::OK,
    };

    let sub_id = match obj["subscription"].as_str() {
        Some(s) => s,
        None => return StatusCode::OK,
    };

    if let Err(e) = db::subscriptions::cancel_now(&state.pool, sub_id, now).await {
        tracing::error!(%e, "Failed to cancel subscription");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    if let Ok(Some(sub)) = db::subscriptions::get(&state.pool, sub_id).await
        && let Ok(holder) = parse_holder(&sub.holder_type, &sub.holder_id)
    {
        let detail = serde_json::json!({ "subscription_id": sub_id });
        let _ =
            db::audit::log(&state.pool, &holder, "subscription_canceled", Some(&detail), now).await;
    }

    tracing::info!(subscription_id = sub_id, "Subscription canceled by gateway");
    StatusCode::OK
}
