//! API routes for talent-cloud

pub mod admin;
pub mod health;
pub mod metering;
pub mod payment_webhook;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;

use shared::error::{AppError, ErrorCode};
use shared::{Holder, HolderType};

use crate::state::AppState;

pub type ApiResult<T> = Result<axum::Json<T>, AppError>;

/// Parse the `{holder_type}/{holder_id}` path segments into a [`Holder`].
pub fn parse_holder(holder_type: &str, holder_id: &str) -> Result<Holder, AppError> {
    let holder_type = HolderType::from_db(holder_type)
        .ok_or_else(|| AppError::new(ErrorCode::HolderInvalid).with_detail("type", holder_type))?;
    if holder_id.is_empty() {
        return Err(AppError::new(ErrorCode::HolderInvalid));
    }
    Ok(Holder {
        holder_type,
        id: holder_id.to_string(),
    })
}

/// Middleware guarding the admin API with the static bearer token from config.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let authorized = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == state.admin_token);

    if !authorized {
        return Err(AppError::new(ErrorCode::AdminTokenInvalid).into_response());
    }
    Ok(next.run(request).await)
}

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Metering surface consumed by the platform's route handlers
    let holders = Router::new()
        .route(
            "/api/holders/{holder_type}/{holder_id}/entitlements",
            get(metering::get_entitlements),
        )
        .route(
            "/api/holders/{holder_type}/{holder_id}/check",
            post(metering::check),
        )
        .route(
            "/api/holders/{holder_type}/{holder_id}/consume",
            post(metering::consume),
        );

    // Admin surface (catalog, subscription, credit operations)
    let admin = Router::new()
        .route("/api/admin/features", get(admin::list_features).post(admin::create_feature))
        .route(
            "/api/admin/features/{key}",
            put(admin::update_feature).delete(admin::delete_feature),
        )
        .route("/api/admin/plans", get(admin::list_plans).post(admin::create_plan))
        .route(
            "/api/admin/plans/{id}",
            put(admin::update_plan).delete(admin::delete_plan),
        )
        .route(
            "/api/admin/plans/{id}/entitlements",
            get(admin::list_entitlements).put(admin::upsert_entitlement),
        )
        .route(
            "/api/admin/plans/{id}/entitlements/{feature_key}",
            delete(admin::delete_entitlement),
        )
        .route(
            "/api/admin/holders/{holder_type}/{holder_id}/grant-allowance",
            post(admin::grant_allowance),
        )
        .route(
            "/api/admin/holders/{holder_type}/{holder_id}/audit",
            get(admin::audit_log),
        )
        .route("/api/admin/subscriptions/{id}", get(admin::get_subscription))
        .route(
            "/api/admin/subscriptions/{id}/change-plan",
            post(admin::change_plan),
        )
        .route("/api/admin/subscriptions/{id}/cancel", post(admin::cancel))
        .route(
            "/api/admin/subscriptions/{id}/cancel-now",
            post(admin::cancel_now),
        )
        .route("/api/admin/billing/run-cycle", post(admin::run_cycle))
        .route("/api/admin/payment-events", get(admin::payment_events))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ));

    // Payment gateway events (signature already verified upstream)
    let webhook = Router::new().route("/payments/webhook", post(payment_webhook::handle_webhook));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(holders)
        .merge(admin)
        .merge(webhook)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
