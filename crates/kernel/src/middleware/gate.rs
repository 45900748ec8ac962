//! Route layer enforcing a view's access requirements.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::access::{Principal, ViewRequirements};
use crate::error::AppError;
use crate::sites::Site;
use crate::state::AppState;

/// State for one gated group of routes.
#[derive(Clone)]
pub struct GateLayerState {
    app: AppState,
    site: Site,
    requirements: Arc<ViewRequirements>,
}

impl GateLayerState {
    pub fn new(app: AppState, site: Site, requirements: ViewRequirements) -> Self {
        Self {
            app,
            site,
            requirements: Arc::new(requirements),
        }
    }
}

/// Run the site's gate before the handler.
///
/// Install with `route_layer(from_fn_with_state(GateLayerState::new(..), enforce))`
/// inside the principal layer.
pub async fn enforce(
    State(gate): State<GateLayerState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let principal = request
        .extensions()
        .get::<Principal>()
        .cloned()
        .unwrap_or_else(Principal::anonymous);
    let path = request.uri().path().to_string();
    let full_path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let decision = gate
        .site
        .gate(gate.app.routes())
        .check(
            gate.app.evaluator(),
            &gate.requirements,
            &principal,
            &path,
            &full_path,
        )
        .await;

    match decision {
        Ok(decision) => match decision.rejection() {
            Some(response) => response,
            None => next.run(request).await,
        },
        Err(e) => AppError::from(e).into_response(),
    }
}
