//! Admin API: catalog CRUD, subscription operations, credit grants,
//! manual billing cycle trigger
//!
//! Guarded by the static bearer token middleware in `api::mod`. Every
//! subscription-affecting operation writes an audit entry (best-effort).

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use shared::billing::{BillingInterval, FeatureKind, HolderType};
use shared::error::{AppError, ErrorCode};
use shared::util::now_millis;
use shared::Holder;

use super::{parse_holder, ApiResult};
use crate::db;
use crate::scheduler::{self, CycleReport};
use crate::state::AppState;

fn internal(e: impl std::fmt::Display) -> AppError {
    tracing::error!("Admin query error: {e}");
    AppError::new(ErrorCode::InternalError)
}

// ── Feature registry ──

/// GET /api/admin/features
pub async fn list_features(State(state): State<AppState>) -> ApiResult<Vec<db::features::Feature>> {
    let features = db::features::list(&state.pool).await.map_err(internal)?;
    Ok(Json(features))
}

#[derive(Deserialize)]
pub struct CreateFeatureRequest {
    pub key: String,
    pub kind: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

fn default_unit() -> String {
    "count".to_string()
}

/// POST /api/admin/features
pub async fn create_feature(
    State(state): State<AppState>,
    Json(req): Json<CreateFeatureRequest>,
) -> ApiResult<db::features::Feature> {
    if FeatureKind::from_db(&req.kind).is_none() {
        return Err(AppError::validation("kind must be 'boolean' or 'metered'"));
    }
    if req.key.is_empty() {
        return Err(AppError::validation("feature key must not be empty"));
    }

    let created = db::features::create(
        &state.pool,
        &db::features::CreateFeature {
            key: &req.key,
            kind: &req.kind,
            unit: &req.unit,
            name: &req.name,
            description: &req.description,
            now: now_millis(),
        },
    )
    .await
    .map_err(internal)?;
    if !created {
        return Err(AppError::conflict(format!("feature {} already exists", req.key))
            .with_detail("key", req.key));
    }

    let feature = db::features::get(&state.pool, &req.key)
        .await
        .map_err(internal)?
        .ok_or_else(|| AppError::new(ErrorCode::InternalError))?;
    Ok(Json(feature))
}

#[derive(Deserialize)]
pub struct UpdateFeatureRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_unit")]
    pub unit: String,
}

/// PUT /api/admin/features/{key}
pub async fn update_feature(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<UpdateFeatureRequest>,
) -> ApiResult<db::features::Feature> {
    let updated =
        db::features::update(&state.pool, &key, &req.name, &req.description, &req.unit)
            .await
            .map_err(internal)?;
    if !updated {
        return Err(AppError::new(ErrorCode::FeatureNotFound).with_detail("key", key));
    }
    let feature = db::features::get(&state.pool, &key)
        .await
        .map_err(internal)?
        .ok_or_else(|| AppError::new(ErrorCode::FeatureNotFound))?;
    Ok(Json(feature))
}

/// DELETE /api/admin/features/{key}
///
/// Rejected while any entitlement row references the feature; never cascades.
pub async fn delete_feature(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<serde_json::Value> {
    let references = db::features::entitlement_references(&state.pool, &key)
        .await
        .map_err(internal)?;
    if references > 0 {
        return Err(AppError::new(ErrorCode::FeatureInUse)
            .with_detail("key", key)
            .with_detail("entitlement_rows", references));
    }
    let deleted = db::features::delete(&state.pool, &key).await.map_err(internal)?;
    if !deleted {
        return Err(AppError::new(ErrorCode::FeatureNotFound).with_detail("key", key));
    }
    Ok(Json(serde_json::json!({ "deleted": key })))
}

// ── Plan catalog ──

/// GET /api/admin/plans
pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Vec<db::plans::Plan>> {
    let plans = db::plans::list(&state.pool).await.map_err(internal)?;
    Ok(Json(plans))
}

#[derive(Deserialize)]
pub struct CreatePlanRequest {
    pub id: String,
    pub product: String,
    pub tier: String,
    pub interval: String,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

/// POST /api/admin/plans
pub async fn create_plan(
    State(state): State<AppState>,
    Json(req): Json<CreatePlanRequest>,
) -> ApiResult<db::plans::Plan> {
    if BillingInterval::from_db(&req.interval).is_none() {
        return Err(AppError::validation("interval must be 'monthly' or 'yearly'"));
    }
    if req.id.is_empty() {
        return Err(AppError::validation("plan id must not be empty"));
    }

    let created = db::plans::create(
        &state.pool,
        &db::plans::CreatePlan {
            id: &req.id,
            product: &req.product,
            tier: &req.tier,
            interval: &req.interval,
            price_cents: req.price_cents,
            is_public: req.is_public,
            now: now_millis(),
        },
    )
    .await
    .map_err(internal)?;
    if !created {
        return Err(
            AppError::conflict(format!("plan {} already exists", req.id)).with_detail("id", req.id)
        );
    }

    let plan = db::plans::get(&state.pool, &req.id)
        .await
        .map_err(internal)?
        .ok_or_else(|| AppError::new(ErrorCode::InternalError))?;
    Ok(Json(plan))
}

#[derive(Deserialize)]
pub struct UpdatePlanRequest {
    pub price_cents: i64,
    pub is_public: bool,
}

/// PUT /api/admin/plans/{id}
pub async fn update_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePlanRequest>,
) -> ApiResult<db::plans::Plan> {
    let updated = db::plans::update(&state.pool, &id, req.price_cents, req.is_public)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(AppError::new(ErrorCode::PlanNotFound).with_detail("id", id));
    }
    let plan = db::plans::get(&state.pool, &id)
        .await
        .map_err(internal)?
        .ok_or_else(|| AppError::new(ErrorCode::PlanNotFound))?;
    Ok(Json(plan))
}

/// DELETE /api/admin/plans/{id}
///
/// Rejected while any non-canceled subscription references the plan.
pub async fn delete_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let references = db::plans::subscription_references(&state.pool, &id)
        .await
        .map_err(internal)?;
    if references > 0 {
        return Err(AppError::new(ErrorCode::PlanInUse)
            .with_detail("id", id)
            .with_detail("subscriptions", references));
    }
    let deleted = db::plans::delete(&state.pool, &id).await.map_err(internal)?;
    if !deleted {
        return Err(AppError::new(ErrorCode::PlanNotFound).with_detail("id", id));
    }
    Ok(Json(serde_json::json!({ "deleted": id })))
}

// ── Per-plan entitlements ──

/// GET /api/admin/plans/{id}/entitlements
pub async fn list_entitlements(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<db::entitlements::EntitledFeature>> {
    ensure_plan_exists(&state, &id).await?;
    let rows = db::entitlements::list_for_plan(&state.pool, &id)
        .await
        .map_err(internal)?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct UpsertEntitlementRequest {
    pub feature_key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub monthly_cap: i64,
    #[serde(default)]
    pub overage_unit_cents: Option<i64>,
}

/// PUT /api/admin/plans/{id}/entitlements
///
/// Creates or overwrites the `(plan, feature)` row. Takes immediate effect
/// for every holder on the plan — no caching layer sits in front of checks.
pub async fn upsert_entitlement(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpsertEntitlementRequest>,
) -> ApiResult<db::entitlements::Entitlement> {
    ensure_plan_exists(&state, &id).await?;
    db::features::get(&state.pool, &req.feature_key)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            AppError::new(ErrorCode::FeatureNotFound).with_detail("key", req.feature_key.clone())
        })?;
    if req.monthly_cap < 0 {
        return Err(AppError::validation("monthly_cap must not be negative"));
    }

    let row = db::entitlements::Entitlement {
        plan_id: id,
        feature_key: req.feature_key,
        enabled: req.enabled,
        monthly_cap: req.monthly_cap,
        overage_unit_cents: req.overage_unit_cents,
    };
    db::entitlements::upsert(&state.pool, &row).await.map_err(internal)?;
    Ok(Json(row))
}

/// DELETE /api/admin/plans/{id}/entitlements/{feature_key}
pub async fn delete_entitlement(
    State(state): State<AppState>,
    Path((id, feature_key)): Path<(String, String)>,
) -> ApiResult<serde_json::Value> {
    let deleted = db::entitlements::delete(&state.pool, &id, &feature_key)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(AppError::new(ErrorCode::EntitlementNotFound)
            .with_detail("plan_id", id)
            .with_detail("feature_key", feature_key));
    }
    Ok(Json(serde_json::json!({ "deleted": [id, feature_key] })))
}

async fn ensure_plan_exists(state: &AppState, id: &str) -> Result<(), AppError> {
    db::plans::get(&state.pool, id)
        .await
        .map_err(internal)?
        .ok_or_else(|| AppError::new(ErrorCode::PlanNotFound).with_detail("id", id))?;
    Ok(())
}

// ── Credits & audit ──

#[derive(Deserialize)]
pub struct GrantAllowanceRequest {
    pub feature: String,
    pub amount: i64,
}

/// POST /api/admin/holders/{holder_type}/{holder_id}/grant-allowance
pub async fn grant_allowance(
    State(state): State<AppState>,
    Path((holder_type, holder_id)): Path<(String, String)>,
    Json(req): Json<GrantAllowanceRequest>,
) -> ApiResult<serde_json::Value> {
    let holder = parse_holder(&holder_type, &holder_id)?;
    let extra = state
        .engine
        .grant_extra_allowance(&holder, &req.feature, req.amount)
        .await?;
    Ok(Json(serde_json::json!({
        "feature": req.feature,
        "extra_allowance": extra,
    })))
}

#[derive(Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_limit")]
    pub limit: i32,
    #[serde(default)]
    pub offset: i32,
}

fn default_limit() -> i32 {
    50
}

/// GET /api/admin/holders/{holder_type}/{holder_id}/audit
pub async fn audit_log(
    State(state): State<AppState>,
    Path((holder_type, holder_id)): Path<(String, String)>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Vec<db::audit::AuditEntry>> {
    let holder = parse_holder(&holder_type, &holder_id)?;
    let entries = db::audit::query(&state.pool, &holder, query.limit.min(500), query.offset)
        .await
        .map_err(internal)?;
    Ok(Json(entries))
}

// ── Subscription operations ──

/// GET /api/admin/subscriptions/{id}
pub async fn get_subscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<db::subscriptions::Subscription> {
    let sub = db::subscriptions::get(&state.pool, &id)
        .await
        .map_err(internal)?
        .ok_or_else(|| AppError::new(ErrorCode::SubscriptionNotFound).with_detail("id", id))?;
    Ok(Json(sub))
}

#[derive(Deserialize)]
pub struct ChangePlanRequest {
    pub plan_id: String,
}

/// POST /api/admin/subscriptions/{id}/change-plan
///
/// Immediate effect: the next check resolves against the new plan. The
/// running period and its consumed counters are kept.
pub async fn change_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChangePlanRequest>,
) -> ApiResult<db::subscriptions::Subscription> {
    ensure_plan_exists(&state, &req.plan_id).await?;

    let changed = db::subscriptions::change_plan(&state.pool, &id, &req.plan_id)
        .await
        .map_err(internal)?;
    if !changed {
        return Err(AppError::new(ErrorCode::SubscriptionNotFound).with_detail("id", id));
    }

    let sub = db::subscriptions::get(&state.pool, &id)
        .await
        .map_err(internal)?
        .ok_or_else(|| AppError::new(ErrorCode::SubscriptionNotFound))?;

    if let Some(holder) = holder_of(&sub) {
        let detail = serde_json::json!({ "subscription_id": sub.id, "plan_id": req.plan_id });
        let _ = db::audit::log(&state.pool, &holder, "plan_changed", Some(&detail), now_millis())
            .await;
    }
    Ok(Json(sub))
}

/// POST /api/admin/subscriptions/{id}/cancel
///
/// Non-immediate: marks the cancellation to take effect at period end; the
/// scheduler performs the terminal transition.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<db::subscriptions::Subscription> {
    let sub = db::subscriptions::get(&state.pool, &id)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            AppError::new(ErrorCode::SubscriptionNotFound).with_detail("id", id.clone())
        })?;

    let scheduled =
        db::subscriptions::schedule_cancellation(&state.pool, &id, sub.current_period_end)
            .await
            .map_err(internal)?;
    if !scheduled {
        return Err(AppError::invalid_request("subscription is not active"));
    }

    let sub = db::subscriptions::get(&state.pool, &id)
        .await
        .map_err(internal)?
        .ok_or_else(|| AppError::new(ErrorCode::SubscriptionNotFound))?;

    if let Some(holder) = holder_of(&sub) {
        let detail = serde_json::json!({
            "subscription_id": sub.id,
            "effective_at": sub.scheduled_cancellation_date,
        });
        let _ = db::audit::log(
            &state.pool,
            &holder,
            "cancellation_scheduled",
            Some(&detail),
            now_millis(),
        )
        .await;
    }
    Ok(Json(sub))
}

/// POST /api/admin/subscriptions/{id}/cancel-now
pub async fn cancel_now(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<db::subscriptions::Subscription> {
    let now = now_millis();
    let canceled = db::subscriptions::cancel_now(&state.pool, &id, now)
        .await
        .map_err(internal)?;
    if !canceled {
        return Err(AppError::new(ErrorCode::SubscriptionNotFound).with_detail("id", id));
    }

    let sub = db::subscriptions::get(&state.pool, &id)
        .await
        .map_err(internal)?
        .ok_or_else(|| AppError::new(ErrorCode::SubscriptionNotFound))?;

    if let Some(holder) = holder_of(&sub) {
        let detail = serde_json::json!({ "subscription_id": sub.id });
        let _ =
            db::audit::log(&state.pool, &holder, "subscription_canceled", Some(&detail), now).await;
    }

    tracing::info!(subscription_id = %id, "Subscription canceled immediately");
    Ok(Json(sub))
}

// ── Operational ──

/// POST /api/admin/billing/run-cycle
///
/// Manual trigger of one scheduler pass; same conditional updates, so it is
/// safe to fire while the periodic task is running.
pub async fn run_cycle(State(state): State<AppState>) -> ApiResult<CycleReport> {
    let report = scheduler::run_once(&state.pool, now_millis())
        .await
        .map_err(internal)?;
    tracing::info!(
        examined = report.examined,
        advanced = report.advanced,
        canceled = report.canceled,
        "Manual billing cycle run"
    );
    Ok(Json(report))
}

/// GET /api/admin/payment-events
pub async fn payment_events(
    State(state): State<AppState>,
) -> ApiResult<Vec<db::payment_events::PaymentEvent>> {
    let events = db::payment_events::list_recent(&state.pool, 100)
        .await
        .map_err(internal)?;
    Ok(Json(events))
}

fn holder_of(sub: &db::subscriptions::Subscription) -> Option<Holder> {
    HolderType::from_db(&sub.holder_type).map(|holder_type| Holder {
        holder_type,
        id: sub.holder_id.clone(),
    })
}
