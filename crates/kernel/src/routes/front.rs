//! Site index pages, the root redirect and the denial pages.

use axum::extract::State;
use axum::http::Uri;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use super::helpers::render_page;
use crate::access::{PermissionExpression, Principal, ViewRequirements, builtin};
use crate::auth::redirect::{DENIER_PARAM, query_param};
use crate::error::AppResult;
use crate::middleware::{GateLayerState, enforce};
use crate::sites::Site;
use crate::state::AppState;

/// Create the front page router.
pub fn router(state: &AppState) -> Router<AppState> {
    let fohseriet_index = Router::new()
        .route("/fohseriet/", get(site_index))
        .route_layer(from_fn_with_state(
            GateLayerState::new(state.clone(), Site::Fohseriet, fohseriet_requirements()),
            enforce,
        ));

    Router::new()
        .route("/", get(root))
        .route("/fadderiet/", get(site_index))
        .route("/fadderiet/saknar-rattigheter/", get(denied))
        .route("/fohseriet/saknar-rattigheter/", get(denied))
        .merge(fohseriet_index)
}

/// Staff site: logged in, and not nollan.
fn fohseriet_requirements() -> ViewRequirements {
    ViewRequirements::login()
        .with_condition(PermissionExpression::method(builtin::CAN_ACCESS_FOHSERIET))
}

/// `/` goes to the member site, keeping the query.
async fn root(uri: Uri) -> Redirect {
    let target = match uri.query() {
        Some(query) if !query.is_empty() => format!("{}?{query}", Site::Fadderiet.index_url()),
        _ => Site::Fadderiet.index_url(),
    };
    Redirect::to(&target)
}

#[derive(Debug, Serialize)]
struct IndexContent {
    title: &'static str,
}

async fn site_index(
    State(state): State<AppState>,
    site: Site,
    principal: Principal,
    uri: Uri,
) -> AppResult<Response> {
    let title = match site {
        Site::Fadderiet => "Fadderiet",
        Site::Fohseriet => "Fohseriet",
    };
    let page = render_page(&state, site, &principal, &uri, IndexContent { title }).await?;
    Ok(page.into_response())
}

#[derive(Debug, Serialize)]
struct DeniedContent {
    /// Absolute URL of the refused page.
    denier: Option<String>,
}

/// Absolute form of a refused path.
fn absolute_denier(denier: &str, site_url: &str) -> String {
    if denier.starts_with('/') && !denier.starts_with("//") {
        format!("{site_url}{denier}")
    } else {
        denier.to_string()
    }
}

async fn denied(
    State(state): State<AppState>,
    site: Site,
    principal: Principal,
    uri: Uri,
) -> AppResult<Response> {
    let denier = query_param(uri.query(), DENIER_PARAM)
        .map(|denier| absolute_denier(&denier, &state.config().site_url));
    let page = render_page(&state, site, &principal, &uri, DeniedContent { denier }).await?;
    Ok(page.into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn relative_denier_gets_the_site_url() {
        assert_eq!(
            absolute_denier("/fohseriet/anvandare/", "https://nollesystemet.se"),
            "https://nollesystemet.se/fohseriet/anvandare/"
        );
        assert_eq!(
            absolute_denier("https://nollesystemet.se/x/", "https://nollesystemet.se"),
            "https://nollesystemet.se/x/"
        );
    }
}
