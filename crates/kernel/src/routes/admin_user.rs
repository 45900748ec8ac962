//! Staff routes for member accounts under `/fohseriet/anvandare/`.

use axum::extract::{Path, State};
use axum::http::Uri;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use super::helpers::{deny, render_page, require_csrf};
use crate::access::{PermissionExpression, Principal, ViewRequirements, builtin};
use crate::error::{AppError, AppResult};
use crate::form::{CSRF_FIELD, generate_csrf_token};
use crate::middleware::{GateLayerState, enforce};
use crate::models::{CreateUser, ProfileInput, Program, UserProfile, UserType};
use crate::permissions;
use crate::sites::Site;
use crate::state::AppState;

const SITE: Site = Site::Fohseriet;

/// Shortest accepted password for accounts created here.
const MIN_PASSWORD_LEN: usize = 8;

/// Create the user management router.
pub fn router(state: &AppState) -> Router<AppState> {
    let gate = |requirements: ViewRequirements| {
        from_fn_with_state(GateLayerState::new(state.clone(), SITE, requirements), enforce)
    };

    let list = Router::new()
        .route("/fohseriet/anvandare/", get(list_users))
        .route_layer(gate(ViewRequirements::login().with_condition(
            PermissionExpression::method(builtin::CAN_SEE_SOME_USER),
        )));

    let create = Router::new()
        .route(
            "/fohseriet/anvandare/skapa/",
            get(create_user_form).post(create_user_submit),
        )
        .route_layer(gate(
            ViewRequirements::login()
                .with_condition(PermissionExpression::method(builtin::CAN_CREATE)),
        ));

    // Object-level checks happen in the handlers.
    let edit = Router::new()
        .route(
            "/fohseriet/anvandare/{pk}/redigera/",
            get(edit_user_form).post(edit_user_submit),
        )
        .route_layer(gate(ViewRequirements::login()));

    let delete = Router::new()
        .route("/fohseriet/anvandare/{pk}/radera/", post(delete_user))
        .route_layer(gate(
            ViewRequirements::login().with_permission(permissions::EDIT_USERS),
        ));

    Router::new()
        .merge(list)
        .merge(create)
        .merge(edit)
        .merge(delete)
}

fn edit_url(state: &AppState, user_id: Uuid) -> Option<String> {
    state.routes().reverse_with(
        &SITE.route("anvandare:redigera"),
        &[("pk", &user_id.to_string())],
    )
}

fn index_url(state: &AppState) -> String {
    state
        .routes()
        .reverse(&SITE.route("anvandare:index"))
        .unwrap_or_else(|| SITE.index_url())
}

#[derive(Debug, Serialize)]
struct UserRow {
    user_id: Uuid,
    name: String,
    user_type: UserType,
    can_edit: bool,
    edit_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct UserList {
    users: Vec<UserRow>,
    create_url: Option<String>,
}

/// GET /fohseriet/anvandare/
async fn list_users(
    State(state): State<AppState>,
    principal: Principal,
    uri: Uri,
) -> AppResult<Response> {
    let mut profiles = state.principals().list_profiles().await?;
    profiles.sort_by(|a, b| {
        (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name))
    });

    let users = profiles
        .into_iter()
        .filter(|profile| profile.can_see(&principal))
        .map(|profile| {
            let can_edit = profile.can_edit(&principal);
            UserRow {
                user_id: profile.user_id,
                name: profile.full_name(),
                user_type: profile.user_type,
                can_edit,
                edit_url: can_edit
                    .then(|| edit_url(&state, profile.user_id))
                    .flatten(),
            }
        })
        .collect();

    let can_create = state
        .evaluator()
        .evaluate(&PermissionExpression::method(builtin::CAN_CREATE), &principal)
        .await?;
    let create_url = can_create
        .then(|| state.routes().reverse(&SITE.route("anvandare:skapa")))
        .flatten();

    let page = render_page(&state, SITE, &principal, &uri, UserList { users, create_url }).await?;
    Ok(page.into_response())
}

/// Profile fields as submitted.
#[derive(Debug, Deserialize)]
pub struct ProfileFormData {
    #[serde(default)]
    pub csrf_token: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    #[serde(default)]
    pub program: Program,
    #[serde(default)]
    pub nolle_group_id: String,
    #[serde(default)]
    pub kth_id: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub food_preference: String,
}

impl ProfileFormData {
    fn into_input(self, errors: &mut Vec<String>) -> ProfileInput {
        if self.first_name.trim().is_empty() {
            errors.push("first name is required".to_string());
        }
        let nolle_group_id = match self.nolle_group_id.trim() {
            "" => None,
            raw => match Uuid::parse_str(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.push("unknown nolle group".to_string());
                    None
                }
            },
        };
        ProfileInput {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            user_type: self.user_type,
            nolle_group_id,
            program: self.program,
            kth_id: self.kth_id.trim().to_string(),
            phone_number: self.phone_number.trim().to_string(),
            food_preference: self.food_preference,
        }
    }
}

/// Account and profile fields as submitted.
#[derive(Debug, Deserialize)]
pub struct CreateUserFormData {
    #[serde(default)]
    pub csrf_token: String,
    pub username: String,
    pub email: String,
    /// Empty for CAS-only accounts.
    #[serde(default)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    #[serde(default)]
    pub program: Program,
    #[serde(default)]
    pub nolle_group_id: String,
    #[serde(default)]
    pub kth_id: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub food_preference: String,
}

impl CreateUserFormData {
    fn split(self) -> (String, String, String, ProfileFormData) {
        let profile = ProfileFormData {
            csrf_token: self.csrf_token,
            first_name: self.first_name,
            last_name: self.last_name,
            user_type: self.user_type,
            program: self.program,
            nolle_group_id: self.nolle_group_id,
            kth_id: self.kth_id,
            phone_number: self.phone_number,
            food_preference: self.food_preference,
        };
        (self.username, self.email, self.password, profile)
    }
}

#[derive(Debug, Serialize)]
struct UserForm {
    action: String,
    csrf_field: &'static str,
    csrf_token: String,
    errors: Vec<String>,
    profile: Option<UserProfile>,
    can_edit_groups: bool,
}

async fn user_form(
    state: &AppState,
    session: &Session,
    principal: &Principal,
    uri: &Uri,
    profile: Option<UserProfile>,
    errors: Vec<String>,
) -> AppResult<Response> {
    let can_edit_groups = state
        .evaluator()
        .evaluate(
            &PermissionExpression::method(builtin::CAN_EDIT_GROUPS),
            principal,
        )
        .await?;
    let content = UserForm {
        action: uri.path().to_string(),
        csrf_field: CSRF_FIELD,
        csrf_token: generate_csrf_token(session).await?,
        errors,
        profile,
        can_edit_groups,
    };
    Ok(render_page(state, SITE, principal, uri, content)
        .await?
        .into_response())
}

/// GET /fohseriet/anvandare/skapa/
async fn create_user_form(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    uri: Uri,
) -> AppResult<Response> {
    user_form(&state, &session, &principal, &uri, None, Vec::new()).await
}

/// POST /fohseriet/anvandare/skapa/
async fn create_user_submit(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    uri: Uri,
    Form(form): Form<CreateUserFormData>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;
    let (username, email, password, profile) = form.split();

    let mut errors = Vec::new();
    let username = username.trim().to_string();
    if username.is_empty() {
        errors.push("username is required".to_string());
    } else if state.principals().find_by_username(&username).await?.is_some() {
        errors.push(format!("username '{username}' is already taken"));
    }
    if !email.contains('@') {
        errors.push("a valid email is required".to_string());
    }
    if !password.is_empty() && password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    let profile = profile.into_input(&mut errors);
    if !errors.is_empty() {
        return user_form(&state, &session, &principal, &uri, None, errors).await;
    }

    let account = CreateUser {
        username,
        email: email.trim().to_string(),
        password: (!password.is_empty()).then_some(password),
        is_superuser: false,
    };
    let (user, _) = state.principals().create_user(account, profile).await?;
    info!(user_id = %user.id, created_by = principal.username(), "user created");
    Ok(Redirect::to(&index_url(&state)).into_response())
}

/// Load the profile behind `pk`, or refuse.
async fn editable_profile(
    state: &AppState,
    principal: &Principal,
    pk: Uuid,
    uri: &Uri,
) -> AppResult<Result<UserProfile, Response>> {
    let profile = state
        .principals()
        .find_profile(pk)
        .await?
        .ok_or(AppError::NotFound)?;
    if !profile.can_edit(principal) {
        info!(
            username = principal.username(),
            target = %pk,
            "profile edit refused"
        );
        return Ok(Err(deny(state, SITE, uri)));
    }
    Ok(Ok(profile))
}

/// GET /fohseriet/anvandare/{pk}/redigera/
async fn edit_user_form(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    uri: Uri,
    Path(pk): Path<Uuid>,
) -> AppResult<Response> {
    match editable_profile(&state, &principal, pk, &uri).await? {
        Ok(profile) => {
            user_form(&state, &session, &principal, &uri, Some(profile), Vec::new()).await
        }
        Err(refusal) => Ok(refusal),
    }
}

/// POST /fohseriet/anvandare/{pk}/redigera/
async fn edit_user_submit(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    uri: Uri,
    Path(pk): Path<Uuid>,
    Form(form): Form<ProfileFormData>,
) -> AppResult<Response> {
    let existing = match editable_profile(&state, &principal, pk, &uri).await? {
        Ok(profile) => profile,
        Err(refusal) => return Ok(refusal),
    };
    require_csrf(&session, &form.csrf_token).await?;

    let mut errors = Vec::new();
    let mut input = form.into_input(&mut errors);
    if !errors.is_empty() {
        return user_form(&state, &session, &principal, &uri, Some(existing), errors).await;
    }

    // Type and group membership are reserved for group editors.
    let can_edit_groups = state
        .evaluator()
        .evaluate(
            &PermissionExpression::method(builtin::CAN_EDIT_GROUPS),
            &principal,
        )
        .await?;
    if !can_edit_groups {
        input.user_type = existing.user_type;
        input.nolle_group_id = existing.nolle_group_id;
    }

    state
        .principals()
        .update_profile(pk, input)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(target = %pk, edited_by = principal.username(), "profile updated");
    Ok(Redirect::to(&index_url(&state)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CsrfOnlyForm {
    #[serde(default)]
    pub csrf_token: String,
}

/// POST /fohseriet/anvandare/{pk}/radera/
async fn delete_user(
    State(state): State<AppState>,
    session: Session,
    principal: Principal,
    uri: Uri,
    Path(pk): Path<Uuid>,
    Form(form): Form<CsrfOnlyForm>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    if principal.user_id() == Some(pk) {
        return Err(AppError::BadRequest(
            "cannot delete your own account".to_string(),
        ));
    }
    if let Err(refusal) = editable_profile(&state, &principal, pk, &uri).await? {
        return Ok(refusal);
    }

    if !state.principals().delete_user(pk).await? {
        return Err(AppError::NotFound);
    }
    info!(target = %pk, deleted_by = principal.username(), "user deleted");
    Ok(Redirect::to(&index_url(&state)).into_response())
}
