//! talent-cloud — feature entitlement & usage metering service
//!
//! Long-running service that:
//! - Answers `check` / `consume` calls gating every billable action
//!   (job postings, AI screenings, competency tests, ...)
//! - Serves the per-holder usage snapshot read model
//! - Ingests payment-gateway events and mutates subscriptions accordingly
//! - Rolls billing periods over on a schedule

mod api;
mod config;
mod db;
mod error;
mod metering;
mod scheduler;
mod state;

use config::Config;
use state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "talent_cloud=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting talent-cloud (env: {})", config.environment);

    // Initialize application state (connects PG, runs migrations)
    let state = AppState::new(&config).await?;

    // Billing cycle scheduler (period rollover + scheduled cancellations)
    scheduler::spawn(state.pool.clone(), config.billing_cycle_interval_secs);

    let app = api::create_router(state);

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("talent-cloud HTTP listening on {http_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
