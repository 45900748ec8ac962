//! Resolve the acting principal for each request.

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::access::Principal;
use crate::auth::{SESSION_USER_ID, current_user_id};
use crate::error::AppError;
use crate::state::AppState;

/// Attach a [`Principal`] to the request extensions.
///
/// Sessions pointing at a deleted or deactivated account are treated as
/// anonymous and lose their user id.
pub async fn resolve_principal(
    State(state): State<AppState>,
    session: Session,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let principal = match current_user_id(&session).await {
        None => Principal::anonymous(),
        Some(user_id) => match state.principals().load_principal(user_id).await? {
            Some(principal) => principal,
            None => {
                warn!(user_id = %user_id, "session refers to an unusable account");
                if let Err(e) = session.remove::<uuid::Uuid>(SESSION_USER_ID).await {
                    debug!(error = %e, "failed to clear stale session user");
                }
                Principal::anonymous()
            }
        },
    };

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
