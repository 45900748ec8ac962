//! Member pages on the fadderiet site: the own-profile form under
//! `/fadderiet/mina-sidor/` and the public nolle group list.

use axum::extract::State;
use axum::http::Uri;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::info;

use super::helpers::{render_page, require_csrf};
use crate::access::{Principal, ViewRequirements};
use crate::error::{AppError, AppResult};
use crate::form::{CSRF_FIELD, generate_csrf_token};
use crate::middleware::{GateLayerState, enforce};
use crate::models::{NolleGroup, ProfileInput, Program, UserProfile};
use crate::sites::Site;
use crate::state::AppState;

const SITE: Site = Site::Fadderiet;

/// Create the member page router.
pub fn router(state: &AppState) -> Router<AppState> {
    let profile = Router::new()
        .route(
            "/fadderiet/mina-sidor/profil/",
            get(profile_form).post(profile_submit),
        )
        .route_layer(from_fn_with_state(
            GateLayerState::new(state.clone(), SITE, ViewRequirements::login()),
            enforce,
        ));

    Router::new()
        .merge(profile)
        .route("/fadderiet/nollegrupperna/", get(nolle_groups))
}

/// Fields a member may change on their own profile. Type and nolle group
/// stay with the staff.
#[derive(Debug, Deserialize)]
pub struct OwnProfileFormData {
    #[serde(default)]
    pub csrf_token: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub program: Program,
    #[serde(default)]
    pub kth_id: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub food_preference: String,
}

impl OwnProfileFormData {
    fn into_input(self, existing: &UserProfile, errors: &mut Vec<String>) -> ProfileInput {
        if self.first_name.trim().is_empty() {
            errors.push("first name is required".to_string());
        }
        ProfileInput {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            user_type: existing.user_type,
            nolle_group_id: existing.nolle_group_id,
            program: self.program,
            kth_id: self.kth_id.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
            food_preference: self.food_preference,
        }
    }
}

#[derive(Debug, Serialize)]
struct ProfileForm {
    action: String,
    csrf_field: &'static str,
    csrf_token: String,
    errors: Vec<String>,
    profile: UserProfile,
}

async fn own_profile(state: &AppState, principal: &Principal) -> AppResult<UserProfile> {
    let user_id = principal.user_id().ok_or(AppError::NotFound)?;
    state
        .principals()
        .find_profile(user_id)
        .await?
        .ok_or(AppError::NotFound)
}

async fn render_form(
    state: &AppState,
    session: &Session,
    principal: &Principal,
    uri: &Uri,
    profile: UserProfile,
    errors: Vec<String>,
) -> AppResult<Response> {
    let content = ProfileForm {
        action: uri.path().to_string(),
        csrf_field: CSRF_FIELD,
        csrf_token: generate_csrf_token(session).await?,
        errors,
        profile,
    };
    Ok(render_page(state, SITE, principal, uri, content)
        .await?
        .into_response())
}

/// GET /fadderiet/mina-sidor/profil/
async fn profile_form(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    uri: Uri,
) -> AppResult<Response> {
    let profile = own_profile(&state, &principal).await?;
    render_form(&state, &session, &principal, &uri, profile, Vec::new()).await
}

/// POST /fadderiet/mina-sidor/profil/
async fn profile_submit(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    uri: Uri,
    Form(form): Form<OwnProfileFormData>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;
    let existing = own_profile(&state, &principal).await?;

    let mut errors = Vec::new();
    let input = form.into_input(&existing, &mut errors);
    if !errors.is_empty() {
        return render_form(&state, &session, &principal, &uri, existing, errors).await;
    }

    state
        .principals()
        .update_profile(existing.user_id, input)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(username = principal.username(), "own profile updated");
    Ok(Redirect::to(uri.path()).into_response())
}

#[derive(Debug, Serialize)]
struct NolleGroupList {
    groups: Vec<NolleGroup>,
}

/// GET /fadderiet/nollegrupperna/
async fn nolle_groups(
    State(state): State<AppState>,
    principal: Principal,
    uri: Uri,
) -> AppResult<Response> {
    let groups = state.principals().list_nolle_groups().await?;
    let page = render_page(&state, SITE, &principal, &uri, NolleGroupList { groups }).await?;
    Ok(page.into_response())
}
