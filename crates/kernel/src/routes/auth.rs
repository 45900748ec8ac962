//! Authentication routes: login choice, credential login, CAS login,
//! logout and the development CAS stand-in.

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, error, warn};

use super::helpers::{render_page, require_csrf};
use crate::access::Principal;
use crate::auth::redirect::{
    NEXT_PARAM, forward_with_next, is_safe_next, next_or, query_param, success_redirect,
    with_query,
};
use crate::auth::{LoginError, authenticate, authenticate_ticket, log_in, log_out};
use crate::error::{AppError, AppResult};
use crate::form::{CSRF_FIELD, generate_csrf_token};
use crate::sites::Site;
use crate::state::AppState;

/// Query flag set when a login attempt failed.
const FAILED_PARAM: &str = "failed";

/// Query parameters CAS adds on its way back.
const CAS_PARAMS: [&str; 2] = ["ticket", "service"];

/// Create the auth router.
pub fn router() -> Router<AppState> {
    let mut router = Router::new();
    for site in Site::ALL {
        let prefix = site.prefix();
        router = router
            .route(&format!("{prefix}/logga-in/"), get(login_choice))
            .route(
                &format!("{prefix}/logga-in/cred/"),
                get(login_cred_form).post(login_cred_submit),
            )
            .route(&format!("{prefix}/logga-in/cas/"), get(login_cas))
            .route(&format!("{prefix}/logga-ut/"), get(logout).post(logout));
    }
    router.route(
        "/autentisering/cas-fake/",
        get(fake_cas_form).post(fake_cas_submit),
    )
}

fn is_failed(uri: &Uri) -> bool {
    query_param(uri.query(), FAILED_PARAM).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Redirect to `target` with the incoming query forwarded, minus `drop`.
fn redirect_on(target: &str, uri: &Uri, drop: &[&str]) -> Response {
    Redirect::to(&success_redirect(target, uri.query(), drop)).into_response()
}

fn site_url(state: &AppState, site: Site, name: &str) -> String {
    state
        .routes()
        .reverse(&site.route(name))
        .unwrap_or_else(|| site.index_url())
}

#[derive(Debug, Serialize)]
struct LoginChoice {
    cred_login_url: String,
    cas_login_url: String,
    failed: bool,
}

/// GET `<site>/logga-in/`
async fn login_choice(
    State(state): State<AppState>,
    site: Site,
    principal: Principal,
    uri: Uri,
) -> AppResult<Response> {
    let next = next_or(uri.query(), &state.config().site_url, &site.index_url());
    if principal.is_authenticated() {
        return Ok(redirect_on(&next, &uri, &[FAILED_PARAM]));
    }

    let content = LoginChoice {
        cred_login_url: forward_with_next(
            &site_url(&state, site, "logga-in:cred"),
            uri.query(),
            &next,
            &[FAILED_PARAM],
        ),
        cas_login_url: forward_with_next(
            &site_url(&state, site, "logga-in:cas"),
            uri.query(),
            &next,
            &[FAILED_PARAM],
        ),
        failed: is_failed(&uri),
    };
    Ok(render_page(&state, site, &principal, &uri, content)
        .await?
        .into_response())
}

#[derive(Debug, Serialize)]
struct CredentialForm {
    action: String,
    csrf_field: &'static str,
    csrf_token: String,
    failed: bool,
}

async fn credential_form(
    state: &AppState,
    session: &Session,
    site: Site,
    principal: &Principal,
    uri: &Uri,
    failed: bool,
) -> AppResult<Response> {
    let csrf_token = generate_csrf_token(session).await?;
    let action = match uri.query() {
        Some(query) if !query.is_empty() => format!("{}?{query}", uri.path()),
        _ => uri.path().to_string(),
    };
    let content = CredentialForm {
        action,
        csrf_field: CSRF_FIELD,
        csrf_token,
        failed,
    };
    Ok(render_page(state, site, principal, uri, content)
        .await?
        .into_response())
}

/// GET `<site>/logga-in/cred/`
async fn login_cred_form(
    State(state): State<AppState>,
    session: Session,
    site: Site,
    principal: Principal,
    uri: Uri,
) -> AppResult<Response> {
    if principal.is_authenticated() {
        let next = next_or(uri.query(), &state.config().site_url, &site.index_url());
        return Ok(redirect_on(&next, &uri, &[]));
    }
    credential_form(&state, &session, site, &principal, &uri, is_failed(&uri)).await
}

/// Credential login form body.
#[derive(Debug, Deserialize)]
pub struct LoginFormRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub csrf_token: String,
}

/// POST `<site>/logga-in/cred/`
async fn login_cred_submit(
    State(state): State<AppState>,
    session: Session,
    site: Site,
    principal: Principal,
    uri: Uri,
    Form(form): Form<LoginFormRequest>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    match authenticate(state.principals(), &form.username, &form.password).await {
        Ok(user) => {
            log_in(&session, user.id).await?;
            if let Err(e) = state.principals().touch_login(user.id).await {
                warn!(error = %e, user_id = %user.id, "failed to update login timestamp");
            }
            let next = next_or(uri.query(), &state.config().site_url, &site.index_url());
            Ok(redirect_on(&next, &uri, &[FAILED_PARAM]))
        }
        Err(LoginError::InvalidCredentials) => {
            let mut response =
                credential_form(&state, &session, site, &principal, &uri, true).await?;
            *response.status_mut() = StatusCode::UNAUTHORIZED;
            Ok(response)
        }
        Err(LoginError::Internal(e)) => Err(AppError::Internal(e)),
    }
}

/// Service URL CAS returns the browser to: this view, carrying `next`.
fn cas_service_url(state: &AppState, uri: &Uri, next: &str) -> String {
    with_query(
        &format!("{}{}", state.config().site_url, uri.path()),
        [(NEXT_PARAM, next)],
    )
}

/// GET `<site>/logga-in/cas/`
///
/// Without a ticket, sends the browser to CAS. With one, verifies it and
/// logs the matching account in.
async fn login_cas(
    State(state): State<AppState>,
    session: Session,
    site: Site,
    principal: Principal,
    uri: Uri,
) -> AppResult<Response> {
    let next = next_or(uri.query(), &state.config().site_url, &site.index_url());
    if principal.is_authenticated() {
        return Ok(redirect_on(&next, &uri, &CAS_PARAMS));
    }

    let service_url = cas_service_url(&state, &uri, &next);
    let Some(ticket) = query_param(uri.query(), "ticket").filter(|t| !t.is_empty()) else {
        return Ok(Redirect::to(&state.cas().login_url(&service_url)).into_response());
    };

    match authenticate_ticket(state.principals(), state.cas(), &ticket, &service_url).await {
        Ok((user, identity)) => {
            log_in(&session, user.id).await?;
            debug!(
                user_id = %user.id,
                attributes = identity.attributes.len(),
                "CAS login"
            );
            if let Err(e) = state.principals().touch_login(user.id).await {
                warn!(error = %e, user_id = %user.id, "failed to update login timestamp");
            }
            Ok(redirect_on(&next, &uri, &CAS_PARAMS))
        }
        Err(LoginError::InvalidCredentials) => {
            let login = with_query(
                &site_url(&state, site, "logga-in:index"),
                [(FAILED_PARAM, "True")],
            );
            Ok(Redirect::to(&login).into_response())
        }
        Err(LoginError::Internal(e)) => Err(AppError::Internal(e)),
    }
}

/// `<site>/logga-ut/`
async fn logout(
    State(state): State<AppState>,
    session: Session,
    site: Site,
    uri: Uri,
) -> Response {
    if let Err(e) = log_out(&session).await {
        error!(error = %e, "logout failed");
        return AppError::Internal(e).into_response();
    }
    let next = next_or(uri.query(), &state.config().site_url, &site.index_url());
    Redirect::to(&next).into_response()
}

#[derive(Debug, Serialize)]
struct FakeCasForm {
    service: String,
    csrf_field: &'static str,
    csrf_token: String,
}

/// The service a fake CAS login returns to, if it is one of ours.
fn fake_cas_service(state: &AppState, uri: &Uri) -> AppResult<String> {
    if !state.config().cas_fake {
        return Err(AppError::NotFound);
    }
    query_param(uri.query(), "service")
        .filter(|service| is_safe_next(service, &state.config().site_url))
        .ok_or_else(|| AppError::BadRequest("missing or foreign service".to_string()))
}

/// GET `/autentisering/cas-fake/`
async fn fake_cas_form(
    State(state): State<AppState>,
    session: Session,
    uri: Uri,
) -> AppResult<Response> {
    let service = fake_cas_service(&state, &uri)?;
    let csrf_token = generate_csrf_token(&session).await?;
    Ok(axum::Json(FakeCasForm {
        service,
        csrf_field: CSRF_FIELD,
        csrf_token,
    })
    .into_response())
}

#[derive(Debug, Deserialize)]
pub struct FakeCasRequest {
    pub username: String,
    #[serde(default)]
    pub csrf_token: String,
}

/// POST `/autentisering/cas-fake/`: back to the service with the username
/// as ticket.
async fn fake_cas_submit(
    State(state): State<AppState>,
    session: Session,
    uri: Uri,
    Form(form): Form<FakeCasRequest>,
) -> AppResult<Response> {
    let service = fake_cas_service(&state, &uri)?;
    require_csrf(&session, &form.csrf_token).await?;
    let target = with_query(&service, [("ticket", form.username.as_str())]);
    Ok(Redirect::to(&target).into_response())
}
