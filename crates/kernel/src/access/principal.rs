//! The acting user of a request.

use std::collections::HashSet;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Group, UserProfile};

/// Snapshot of who is making the request.
///
/// Built once per request by the principal middleware and never mutated
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct Principal {
    user_id: Option<Uuid>,
    username: String,
    is_superuser: bool,
    permissions: HashSet<String>,
    groups: Vec<Group>,
    profile: Option<UserProfile>,
    responsible_groups: HashSet<Uuid>,
}

impl Principal {
    /// An unauthenticated visitor.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Start building an authenticated principal.
    pub fn builder(user_id: Uuid, username: impl Into<String>) -> PrincipalBuilder {
        PrincipalBuilder {
            principal: Self {
                user_id: Some(user_id),
                username: username.into(),
                ..Self::default()
            },
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    /// Username, empty for anonymous visitors.
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_superuser(&self) -> bool {
        self.is_superuser
    }

    /// Whether the principal holds `codename`. Anonymous visitors hold
    /// nothing; superusers hold everything.
    pub fn has_permission(&self, codename: &str) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        self.is_superuser || self.permissions.contains(codename)
    }

    /// Whether the principal holds every codename in `codenames`.
    pub fn has_permissions<S: AsRef<str>>(&self, codenames: &[S]) -> bool {
        codenames.iter().all(|c| self.has_permission(c.as_ref()))
    }

    pub fn permissions(&self) -> &HashSet<String> {
        &self.permissions
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// Nolle groups this principal is förfadder for.
    pub fn responsible_groups(&self) -> &HashSet<Uuid> {
        &self.responsible_groups
    }

    /// Serializable view for page models and label templates.
    pub fn summary(&self) -> PrincipalSummary {
        PrincipalSummary {
            id: self.user_id,
            username: self.username.clone(),
            authenticated: self.is_authenticated(),
            first_name: self.profile.as_ref().map(|p| p.first_name.clone()),
            last_name: self.profile.as_ref().map(|p| p.last_name.clone()),
            user_type: self.profile.as_ref().map(|p| p.user_type),
        }
    }
}

/// Builder for authenticated principals.
#[derive(Debug)]
pub struct PrincipalBuilder {
    principal: Principal,
}

impl PrincipalBuilder {
    pub fn superuser(mut self, is_superuser: bool) -> Self {
        self.principal.is_superuser = is_superuser;
        self
    }

    pub fn permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.principal
            .permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn groups(mut self, groups: impl IntoIterator<Item = Group>) -> Self {
        self.principal.groups.extend(groups);
        self
    }

    pub fn profile(mut self, profile: UserProfile) -> Self {
        self.principal.profile = Some(profile);
        self
    }

    pub fn responsible_groups(mut self, groups: impl IntoIterator<Item = Uuid>) -> Self {
        self.principal.responsible_groups.extend(groups);
        self
    }

    pub fn build(self) -> Principal {
        self.principal
    }
}

/// What templates and page models get to see of the principal.
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalSummary {
    pub id: Option<Uuid>,
    pub username: String,
    pub authenticated: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub user_type: Option<crate::models::UserType>,
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Principal>().cloned().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "principal middleware is not installed on this route"
            ))
        })
    }
}
