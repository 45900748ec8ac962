//! Authentication: credential and CAS login, session binding and return
//! paths.

pub mod cas;
pub mod credentials;
pub mod redirect;

use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

pub use cas::{CasClient, CasIdentity, CasVerifier, FakeCasVerifier};
pub use credentials::{LoginError, authenticate, authenticate_ticket};

/// Session key for storing the authenticated user ID.
pub const SESSION_USER_ID: &str = "user_id";

/// Bind `user_id` to the session. The session id is cycled first so a
/// pre-login id cannot be reused.
pub async fn log_in(session: &Session, user_id: Uuid) -> anyhow::Result<()> {
    session
        .cycle_id()
        .await
        .map_err(|e| anyhow::anyhow!("failed to cycle session id: {e}"))?;
    session
        .insert(SESSION_USER_ID, user_id)
        .await
        .map_err(|e| anyhow::anyhow!("failed to store user id in session: {e}"))?;
    info!(user_id = %user_id, "user logged in");
    Ok(())
}

/// Drop the session entirely.
pub async fn log_out(session: &Session) -> anyhow::Result<()> {
    let user_id = current_user_id(session).await;
    session
        .delete()
        .await
        .map_err(|e| anyhow::anyhow!("failed to delete session: {e}"))?;
    if let Some(user_id) = user_id {
        info!(user_id = %user_id, "user logged out");
    }
    Ok(())
}

/// The logged-in user's ID, if any.
pub async fn current_user_id(session: &Session) -> Option<Uuid> {
    session.get(SESSION_USER_ID).await.ok().flatten()
}
