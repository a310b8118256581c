//! Connection pool for the PostgreSQL storage backend.

use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::{PgPool, Postgres};
use tracing::{debug, info, instrument};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};

/// Type alias for PostgreSQL pool options.
pub type PgPoolOptions = PoolOptions<Postgres>;

const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Idle connections to keep: the configured value, else a quarter of the
/// pool, never below one and never above the pool size.
fn min_idle(config: &PostgresConfig) -> u32 {
    config
        .min_connections
        .unwrap_or(config.pool_size / 4)
        .clamp(1, config.pool_size.max(1))
}

/// Validates the configuration and turns it into pool options.
pub(crate) fn pool_options(config: &PostgresConfig) -> Result<PgPoolOptions> {
    if config.url.trim().is_empty() {
        return Err(PostgresError::config("connection URL is empty"));
    }
    if config.pool_size == 0 {
        return Err(PostgresError::config("pool_size must be at least 1"));
    }

    let max_lifetime = config
        .max_lifetime_secs
        .map_or(DEFAULT_MAX_LIFETIME, Duration::from_secs);

    Ok(PgPoolOptions::new()
        .max_connections(config.pool_size)
        .min_connections(min_idle(config))
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
        .max_lifetime(max_lifetime)
        .idle_timeout(config.idle_timeout_ms.map(Duration::from_millis))
        .test_before_acquire(false))
}

/// Connects a pool for the seedline state and record tables.
#[instrument(skip(config), fields(url = %mask_password(&config.url)))]
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    let options = pool_options(config)?;

    info!(
        max_connections = options.get_max_connections(),
        min_connections = options.get_min_connections(),
        connect_timeout_ms = config.connect_timeout_ms,
        "Connecting PostgreSQL pool"
    );

    let pool = options.connect(&config.url).await?;
    debug!("PostgreSQL pool connected");
    Ok(pool)
}

/// Replaces the password in a connection URL's userinfo with `****`.
pub(crate) fn mask_password(url: &str) -> String {
    let authority_start = url.find("://").map_or(0, |p| p + 3);
    let authority_end = url[authority_start..]
        .find('/')
        .map_or(url.len(), |p| authority_start + p);
    let authority = &url[authority_start..authority_end];

    let Some(at) = authority.rfind('@') else {
        return url.to_string();
    };
    let Some(colon) = authority[..at].find(':') else {
        return url.to_string();
    };

    format!(
        "{}****{}",
        &url[..authority_start + colon + 1],
        &url[authority_start + at..]
    )
}
