//! Application state for talent-cloud

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;
use crate::metering::MeteringEngine;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,
    /// Quota enforcement engine (pool injected, no global state)
    pub engine: MeteringEngine,
    /// Static bearer token guarding the admin API
    pub admin_token: String,
}

impl AppState {
    /// Create a new AppState
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pg_max_connections)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self {
            engine: MeteringEngine::new(pool.clone()),
            pool,
            admin_token: config.admin_token.clone(),
        })
    }
}
