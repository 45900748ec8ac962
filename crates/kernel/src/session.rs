//! Session management using Redis.

use anyhow::{Context, Result};
use fred::prelude::*;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_redis_store::RedisStore;

/// Session expiry on inactivity (24 hours).
pub const DEFAULT_SESSION_EXPIRY_HOURS: i64 = 24;

/// Create the session layer using Redis as the backend.
pub async fn create_session_layer(
    redis_url: &str,
    same_site: SameSite,
) -> Result<SessionManagerLayer<RedisStore<Pool>>> {
    let config = Config::from_url(redis_url).context("failed to parse Redis URL")?;

    let pool = Builder::from_config(config)
        .build_pool(1)
        .context("failed to create Redis pool")?;

    pool.init()
        .await
        .context("failed to connect to Redis for sessions")?;

    Ok(session_layer(RedisStore::new(pool), same_site))
}

/// Wrap any session store with the application's cookie policy.
pub fn session_layer<S>(store: S, same_site: SameSite) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_secure(true)
        .with_http_only(true)
        .with_same_site(same_site)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            DEFAULT_SESSION_EXPIRY_HOURS,
        )))
}
