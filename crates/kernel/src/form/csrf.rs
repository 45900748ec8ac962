//! CSRF token generation and verification.

use anyhow::{Result, bail};
use rand::RngCore;
use subtle::ConstantTimeEq;
use tower_sessions::Session;

/// Form field carrying the token.
pub const CSRF_FIELD: &str = "csrf_token";

/// Session key for storing CSRF tokens.
const CSRF_SESSION_KEY: &str = "csrf_tokens";

/// Maximum number of tokens to store per session.
const MAX_TOKENS: usize = 10;

/// Token validity period in seconds (1 hour).
const TOKEN_VALIDITY_SECS: i64 = 3600;

/// A stored token and when it was issued.
type StoredToken = (String, i64);

async fn stored_tokens(session: &Session) -> Vec<StoredToken> {
    session
        .get(CSRF_SESSION_KEY)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Generate a CSRF token and store it in the session.
pub async fn generate_csrf_token(session: &Session) -> Result<String> {
    let mut random_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut random_bytes);
    let token = hex::encode(random_bytes);

    let mut tokens = stored_tokens(session).await;
    tokens.push((token.clone(), chrono::Utc::now().timestamp()));

    // Keep only the most recent tokens.
    if tokens.len() > MAX_TOKENS {
        let skip = tokens.len() - MAX_TOKENS;
        tokens.drain(..skip);
    }

    session
        .insert(CSRF_SESSION_KEY, tokens)
        .await
        .map_err(|e| anyhow::anyhow!("failed to store CSRF token: {e}"))?;

    Ok(token)
}

/// Verify a CSRF token against the session.
///
/// Tokens are single-use and time-limited.
pub async fn verify_csrf_token(session: &Session, submitted: &str) -> Result<bool> {
    if submitted.is_empty() {
        bail!("empty CSRF token");
    }

    let mut tokens = stored_tokens(session).await;
    if tokens.is_empty() {
        return Ok(false);
    }

    let now = chrono::Utc::now().timestamp();
    let found = tokens.iter().position(|(token, issued)| {
        bool::from(token.as_bytes().ct_eq(submitted.as_bytes()))
            && now - issued <= TOKEN_VALIDITY_SECS
    });

    let Some(index) = found else {
        return Ok(false);
    };

    tokens.remove(index);
    tokens.retain(|(_, issued)| now - issued <= TOKEN_VALIDITY_SECS);
    session
        .insert(CSRF_SESSION_KEY, tokens)
        .await
        .map_err(|e| anyhow::anyhow!("failed to update CSRF tokens: {e}"))?;

    Ok(true)
}
