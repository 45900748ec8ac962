//! Login by username or email and password, and by CAS ticket.

use thiserror::Error;
use tracing::info;

use super::cas::{CasIdentity, CasVerifier};
use crate::models::{User, dummy_verify};
use crate::store::PrincipalStore;

/// Why a login attempt failed.
///
/// Callers show one generic message for `InvalidCredentials` whatever the
/// underlying reason: unknown user, wrong password, inactive account or
/// rejected ticket.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("login failed")]
    Internal(#[from] anyhow::Error),
}

/// Verify a password login. `identifier` is a username or an email address.
///
/// Every path through this function performs one Argon2 verification, so
/// timing does not reveal whether the account exists.
pub async fn authenticate(
    store: &dyn PrincipalStore,
    identifier: &str,
    password: &str,
) -> Result<User, LoginError> {
    let identifier = identifier.trim();
    let Some(user) = store.find_by_login(identifier).await? else {
        dummy_verify(password);
        info!(identifier, "login failed: unknown identifier");
        return Err(LoginError::InvalidCredentials);
    };

    let password_ok = user.verify_password(password);
    if !password_ok || !user.is_active {
        info!(
            user_id = %user.id,
            active = user.is_active,
            "login failed: bad password or inactive account"
        );
        return Err(LoginError::InvalidCredentials);
    }

    Ok(user)
}

/// Verify a CAS ticket and map the asserted username to an active account.
pub async fn authenticate_ticket(
    store: &dyn PrincipalStore,
    verifier: &dyn CasVerifier,
    ticket: &str,
    service_url: &str,
) -> Result<(User, CasIdentity), LoginError> {
    let Some(identity) = verifier.verify(ticket, service_url).await else {
        info!("CAS login failed: ticket not verified");
        return Err(LoginError::InvalidCredentials);
    };

    match store.find_by_username(&identity.username).await? {
        Some(user) if user.is_active => Ok((user, identity)),
        _ => {
            info!(username = %identity.username, "CAS login failed: no active account");
            Err(LoginError::InvalidCredentials)
        }
    }
}
