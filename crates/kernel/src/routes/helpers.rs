//! Shared route helpers for page rendering.
//!
//! Every page goes through the same pipeline: the principal layer has
//! resolved who is asking, the gate layer has let them through, and
//! [`render_page`] wraps the handler's content with the site menu and the
//! back link.

use axum::Json;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tower_sessions::Session;

use crate::access::{Principal, PrincipalSummary};
use crate::auth::redirect::{NEXT_PARAM, is_safe_next, query_param};
use crate::error::{AppError, AppResult};
use crate::form::verify_csrf_token;
use crate::menu::{Menu, MenuRenderer};
use crate::sites::Site;
use crate::state::AppState;

/// A rendered page.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub site: &'static str,
    pub path: String,
    pub user: PrincipalSummary,
    pub menu: Menu,
    /// Where a "back" link should point, from a safe `next` parameter.
    pub back_url: Option<String>,
    pub content: T,
}

/// Wrap `content` with the site chrome for `principal`.
pub async fn render_page<T: Serialize>(
    state: &AppState,
    site: Site,
    principal: &Principal,
    uri: &Uri,
    content: T,
) -> AppResult<Json<Page<T>>> {
    let definition = state.menu(site)?;
    let menu = MenuRenderer::new(state.evaluator())
        .render(&definition, principal, uri.path())
        .await?;
    let back_url = query_param(uri.query(), NEXT_PARAM)
        .filter(|next| is_safe_next(next, &state.config().site_url));

    Ok(Json(Page {
        site: site.name(),
        path: uri.path().to_string(),
        user: principal.summary(),
        menu,
        back_url,
        content,
    }))
}

/// Path and query of `uri`.
pub fn full_path(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

/// Refuse an object-level check the same way the gate refuses a view.
pub fn deny(state: &AppState, site: Site, uri: &Uri) -> Response {
    site.gate(state.routes())
        .deny(false, uri.path(), &full_path(uri))
        .rejection()
        .unwrap_or_else(|| StatusCode::FORBIDDEN.into_response())
}

/// Check a submitted CSRF token.
pub async fn require_csrf(session: &Session, submitted: &str) -> AppResult<()> {
    match verify_csrf_token(session, submitted).await {
        Ok(true) => Ok(()),
        Ok(false) | Err(_) => Err(AppError::BadRequest(
            "invalid form token, reload the page and try again".to_string(),
        )),
    }
}
