//! Happening management under `/fohseriet/evenemang/`.

use axum::extract::{Path, State};
use axum::http::Uri;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use super::helpers::{render_page, require_csrf};
use crate::access::{Principal, ViewRequirements};
use crate::error::{AppError, AppResult};
use crate::form::{CSRF_FIELD, generate_csrf_token};
use crate::middleware::{GateLayerState, enforce};
use crate::models::{Happening, HappeningInput};
use crate::permissions;
use crate::sites::Site;
use crate::state::AppState;

const SITE: Site = Site::Fohseriet;

/// Create the happening router. Every page needs the happening permission.
pub fn router(state: &AppState) -> Router<AppState> {
    let requirements = ViewRequirements::login().with_permission(permissions::EDIT_HAPPENING);

    Router::new()
        .route("/fohseriet/evenemang/", get(list_happenings))
        .route(
            "/fohseriet/evenemang/skapa/",
            get(create_form).post(create_submit),
        )
        .route(
            "/fohseriet/evenemang/{pk}/redigera/",
            get(edit_form).post(edit_submit),
        )
        .route("/fohseriet/evenemang/{pk}/radera/", post(delete_happening))
        .route_layer(from_fn_with_state(
            GateLayerState::new(state.clone(), SITE, requirements),
            enforce,
        ))
}

fn list_url(state: &AppState) -> String {
    state
        .routes()
        .reverse(&SITE.route("evenemang:lista"))
        .unwrap_or_else(|| SITE.index_url())
}

#[derive(Debug, Serialize)]
struct HappeningRow {
    #[serde(flatten)]
    happening: Happening,
    edit_url: Option<String>,
    delete_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct HappeningList {
    happenings: Vec<HappeningRow>,
    create_url: Option<String>,
    csrf_field: &'static str,
    csrf_token: String,
}

/// GET /fohseriet/evenemang/
async fn list_happenings(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    uri: Uri,
) -> AppResult<Response> {
    let mut happenings = state.happenings().list_happenings().await?;
    happenings.sort_by(|a, b| a.start_time.cmp(&b.start_time));

    let routes = state.routes();
    let happenings = happenings
        .into_iter()
        .map(|happening| {
            let pk = happening.id.to_string();
            HappeningRow {
                edit_url: routes.reverse_with(&SITE.route("evenemang:redigera"), &[("pk", &pk)]),
                delete_url: routes.reverse_with(&SITE.route("evenemang:radera"), &[("pk", &pk)]),
                happening,
            }
        })
        .collect();

    let content = HappeningList {
        happenings,
        create_url: routes.reverse(&SITE.route("evenemang:skapa")),
        csrf_field: CSRF_FIELD,
        csrf_token: generate_csrf_token(&session).await?,
    };
    Ok(render_page(&state, SITE, &principal, &uri, content)
        .await?
        .into_response())
}

/// Happening form body. Checkboxes are absent when unticked.
#[derive(Debug, Deserialize)]
pub struct HappeningFormData {
    #[serde(default)]
    pub csrf_token: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub start_time: String,
    pub end_time: String,
    pub takes_registration: Option<String>,
    pub external_registration: Option<String>,
}

/// Accepts RFC 3339 or the `YYYY-MM-DDTHH:MM` of a datetime-local input,
/// read as UTC.
fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Some(time.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn is_checked(value: Option<&str>) -> bool {
    matches!(value, Some(v) if !v.is_empty() && !v.eq_ignore_ascii_case("false"))
}

impl HappeningFormData {
    /// Parsed and validated input, or the messages to show.
    pub fn into_input(self) -> Result<HappeningInput, Vec<String>> {
        let start_time = parse_time(&self.start_time);
        let end_time = parse_time(&self.end_time);
        let (Some(start_time), Some(end_time)) = (start_time, end_time) else {
            let mut errors = Vec::new();
            if start_time.is_none() {
                errors.push("start time is not a valid date and time".to_string());
            }
            if end_time.is_none() {
                errors.push("end time is not a valid date and time".to_string());
            }
            return Err(errors);
        };

        let input = HappeningInput {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            start_time,
            end_time,
            takes_registration: is_checked(self.takes_registration.as_deref()),
            external_registration: is_checked(self.external_registration.as_deref()),
        };
        let errors = input.validate();
        if errors.is_empty() {
            Ok(input)
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Serialize)]
struct HappeningForm {
    action: String,
    csrf_field: &'static str,
    csrf_token: String,
    errors: Vec<String>,
    happening: Option<Happening>,
}

async fn happening_form(
    state: &AppState,
    session: &Session,
    principal: &Principal,
    uri: &Uri,
    happening: Option<Happening>,
    errors: Vec<String>,
) -> AppResult<Response> {
    let content = HappeningForm {
        action: uri.path().to_string(),
        csrf_field: CSRF_FIELD,
        csrf_token: generate_csrf_token(session).await?,
        errors,
        happening,
    };
    Ok(render_page(state, SITE, principal, uri, content)
        .await?
        .into_response())
}

/// GET /fohseriet/evenemang/skapa/
async fn create_form(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    uri: Uri,
) -> AppResult<Response> {
    happening_form(&state, &session, &principal, &uri, None, Vec::new()).await
}

/// POST /fohseriet/evenemang/skapa/
async fn create_submit(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    uri: Uri,
    Form(form): Form<HappeningFormData>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;
    let input = match form.into_input() {
        Ok(input) => input,
        Err(errors) => {
            return happening_form(&state, &session, &principal, &uri, None, errors).await;
        }
    };

    let happening = state
        .happenings()
        .save_happening(Happening::new(input))
        .await?;
    info!(happening_id = %happening.id, created_by = principal.username(), "happening created");
    Ok(Redirect::to(&list_url(&state)).into_response())
}

async fn load(state: &AppState, pk: Uuid) -> AppResult<Happening> {
    state
        .happenings()
        .find_happening(pk)
        .await?
        .ok_or(AppError::NotFound)
}

/// GET /fohseriet/evenemang/{pk}/redigera/
async fn edit_form(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    uri: Uri,
    Path(pk): Path<Uuid>,
) -> AppResult<Response> {
    let happening = load(&state, pk).await?;
    happening_form(&state, &session, &principal, &uri, Some(happening), Vec::new()).await
}

/// POST /fohseriet/evenemang/{pk}/redigera/
async fn edit_submit(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    uri: Uri,
    Path(pk): Path<Uuid>,
    Form(form): Form<HappeningFormData>,
) -> AppResult<Response> {
    let mut happening = load(&state, pk).await?;
    require_csrf(&session, &form.csrf_token).await?;
    let input = match form.into_input() {
        Ok(input) => input,
        Err(errors) => {
            return happening_form(&state, &session, &principal, &uri, Some(happening), errors)
                .await;
        }
    };

    happening.apply(input);
    state.happenings().save_happening(happening).await?;
    info!(happening_id = %pk, edited_by = principal.username(), "happening updated");
    Ok(Redirect::to(&list_url(&state)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct DeleteHappeningForm {
    #[serde(default)]
    pub csrf_token: String,
}

/// POST /fohseriet/evenemang/{pk}/radera/
async fn delete_happening(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    Path(pk): Path<Uuid>,
    Form(form): Form<DeleteHappeningForm>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;
    if !state.happenings().delete_happening(pk).await? {
        return Err(AppError::NotFound);
    }
    info!(happening_id = %pk, deleted_by = principal.username(), "happening deleted");
    Ok(Redirect::to(&list_url(&state)).into_response())
}
