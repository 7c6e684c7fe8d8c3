//! Metering surface: check / consume / entitlements
//!
//! These are the calls every gated route handler in the platform makes.
//! `check` is advisory and retry-safe; `consume` is post-action bookkeeping
//! whose failure must never be surfaced as a failure of the already-completed
//! gated action.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use shared::billing::CheckDecision;
use shared::error::ApiResponse;

use super::{parse_holder, ApiResult};
use crate::metering::FeatureUsage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MeterRequest {
    pub feature: String,
    #[serde(default = "default_amount")]
    pub amount: i64,
}

fn default_amount() -> i64 {
    1
}

/// GET /api/holders/{holder_type}/{holder_id}/entitlements
pub async fn get_entitlements(
    State(state): State<AppState>,
    Path((holder_type, holder_id)): Path<(String, String)>,
) -> ApiResult<Vec<FeatureUsage>> {
    let holder = parse_holder(&holder_type, &holder_id)?;
    let snapshot = state.engine.get_entitlements(&holder).await?;
    Ok(Json(snapshot))
}

/// POST /api/holders/{holder_type}/{holder_id}/check
///
/// Side-effect-free preview; denials come back as structured values with
/// HTTP 200, never as errors.
pub async fn check(
    State(state): State<AppState>,
    Path((holder_type, holder_id)): Path<(String, String)>,
    Json(req): Json<MeterRequest>,
) -> ApiResult<CheckDecision> {
    let holder = parse_holder(&holder_type, &holder_id)?;
    if req.amount <= 0 {
        return Err(shared::error::AppError::validation(
            "amount must be positive",
        ));
    }
    let decision = state
        .engine
        .check_allowed(&holder, &req.feature, req.amount)
        .await?;
    Ok(Json(decision))
}

/// POST /api/holders/{holder_type}/{holder_id}/consume
///
/// Fire-and-forget from the caller's perspective: the gated action already
/// happened, so a ledger failure here is logged with enough context to
/// reconcile manually and still acknowledged with 202.
pub async fn consume(
    State(state): State<AppState>,
    Path((holder_type, holder_id)): Path<(String, String)>,
    Json(req): Json<MeterRequest>,
) -> Response {
    let holder = match parse_holder(&holder_type, &holder_id) {
        Ok(h) => h,
        Err(e) => return e.into_response(),
    };
    if req.amount <= 0 {
        return shared::error::AppError::validation("amount must be positive").into_response();
    }

    if let Err(e) = state.engine.consume(&holder, &req.feature, req.amount).await {
        let app: shared::error::AppError = e.into();
        tracing::error!(
            holder = %holder,
            feature = %req.feature,
            amount = req.amount,
            error = %app,
            "Failed to record consumption; manual reconciliation required"
        );
    }

    (StatusCode::ACCEPTED, Json(ApiResponse::ok())).into_response()
}
