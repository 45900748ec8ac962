//! Request guard for views with authentication or permission requirements.
//!
//! Checks run in a fixed order: authentication first, then permissions and
//! the view's predicate. An anonymous visitor who fails either check goes to
//! the login page with a return path, unless the view raises. A logged-in
//! visitor lacking a permission goes to the denial page, gets a 403, or
//! falls back to the login page, depending on how the view and the site are
//! configured.

use axum::response::{IntoResponse, Redirect, Response};
use tracing::info;

use super::evaluator::{AccessError, ConditionEvaluator};
use super::expression::PermissionExpression;
use super::principal::Principal;
use crate::auth::redirect::{denied_redirect_url, login_redirect_url};
use crate::error::AppError;

/// What a view demands of the principal.
#[derive(Debug, Clone, Default)]
pub struct ViewRequirements {
    pub login_required: bool,
    /// Every codename must be held.
    pub permissions: Vec<String>,
    /// Extra predicate, typically capability checks.
    pub condition: Option<PermissionExpression>,
    /// Answer 403 instead of redirecting when permissions fail.
    pub raise_exception: bool,
}

impl ViewRequirements {
    /// Open to everyone.
    pub fn none() -> Self {
        Self::default()
    }

    /// Any logged-in user.
    pub fn login() -> Self {
        Self {
            login_required: true,
            ..Self::default()
        }
    }

    pub fn with_permission(mut self, codename: impl Into<String>) -> Self {
        self.permissions.push(codename.into());
        self
    }

    pub fn with_condition(mut self, condition: PermissionExpression) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn raising(mut self) -> Self {
        self.raise_exception = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.login_required && self.permissions.is_empty() && self.condition.is_none()
    }
}

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    /// Redirect to the login page; carries the full location.
    LoginRedirect(String),
    /// Redirect to the denial page; carries the full location.
    DeniedRedirect(String),
    Forbidden,
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// The response for a rejection; `None` when allowed.
    pub fn rejection(self) -> Option<Response> {
        match self {
            Self::Allow => None,
            Self::LoginRedirect(location) | Self::DeniedRedirect(location) => {
                Some(Redirect::to(&location).into_response())
            }
            Self::Forbidden => Some(AppError::Forbidden.into_response()),
        }
    }
}

/// Gate bound to one site's login and denial pages.
#[derive(Debug, Clone)]
pub struct AccessControlGate {
    login_url: String,
    denied_url: Option<String>,
}

impl AccessControlGate {
    pub fn new(login_url: impl Into<String>, denied_url: Option<String>) -> Self {
        Self {
            login_url: login_url.into(),
            denied_url,
        }
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    pub fn denied_url(&self) -> Option<&str> {
        self.denied_url.as_deref()
    }

    /// Check `principal` against `requirements`.
    ///
    /// `path` is the request path, `full_path` the path with its query. The
    /// login redirect carries `full_path`, the denial redirect `path`.
    pub async fn check(
        &self,
        evaluator: &ConditionEvaluator,
        requirements: &ViewRequirements,
        principal: &Principal,
        path: &str,
        full_path: &str,
    ) -> Result<GateDecision, AccessError> {
        if requirements.is_empty() {
            return Ok(GateDecision::Allow);
        }

        if requirements.login_required && !principal.is_authenticated() {
            info!(path, "login required");
            return Ok(GateDecision::LoginRedirect(login_redirect_url(
                &self.login_url,
                full_path,
            )));
        }

        let mut permitted = principal.has_permissions(&requirements.permissions);
        if permitted && let Some(condition) = &requirements.condition {
            permitted = evaluator.evaluate(condition, principal).await?;
        }
        if permitted {
            return Ok(GateDecision::Allow);
        }

        if !principal.is_authenticated() && !requirements.raise_exception {
            info!(path, "permission requires login");
            return Ok(GateDecision::LoginRedirect(login_redirect_url(
                &self.login_url,
                full_path,
            )));
        }

        info!(
            path,
            username = principal.username(),
            authenticated = principal.is_authenticated(),
            "permission denied"
        );
        Ok(self.deny(requirements.raise_exception, path, full_path))
    }

    /// Decision for a failed permission check, also used by handlers for
    /// object-level checks.
    pub fn deny(&self, raise_exception: bool, path: &str, full_path: &str) -> GateDecision {
        if raise_exception {
            return GateDecision::Forbidden;
        }
        match &self.denied_url {
            Some(denied_url) => GateDecision::DeniedRedirect(denied_redirect_url(denied_url, path)),
            None => GateDecision::LoginRedirect(login_redirect_url(&self.login_url, full_path)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use uuid::Uuid;

    use super::*;
    use crate::access::capability::CapabilityRegistry;

    const LOGIN: &str = "/fohseriet/logga-in/";
    const DENIED: &str = "/fohseriet/saknar-rattigheter/";

    fn evaluator() -> ConditionEvaluator {
        let mut registry = CapabilityRegistry::new();
        registry.register_fn("app.Model.never", |_: &Principal| false);
        ConditionEvaluator::new(Arc::new(registry))
    }

    fn gate() -> AccessControlGate {
        AccessControlGate::new(LOGIN, Some(DENIED.to_string()))
    }

    fn member(perms: &[&str]) -> Principal {
        Principal::builder(Uuid::now_v7(), "kim")
            .permissions(perms.iter().copied())
            .build()
    }

    async fn decide(
        gate: &AccessControlGate,
        requirements: &ViewRequirements,
        principal: &Principal,
        path: &str,
    ) -> GateDecision {
        gate.check(&evaluator(), requirements, principal, path, path)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn no_requirements_always_pass() {
        let requirements = ViewRequirements::none();
        for principal in [Principal::anonymous(), member(&[])] {
            assert!(
                decide(&gate(), &requirements, &principal, "/fadderiet/")
                    .await
                    .is_allowed()
            );
        }
    }

    #[tokio::test]
    async fn anonymous_on_login_view_goes_to_login_with_next() {
        let decision = decide(
            &gate(),
            &ViewRequirements::login(),
            &Principal::anonymous(),
            "/anvandare/3/redigera/",
        )
        .await;
        assert_eq!(
            decision,
            GateDecision::LoginRedirect(
                "/fohseriet/logga-in/?next=/anvandare/3/redigera/".to_string()
            )
        );
    }

    #[tokio::test]
    async fn login_redirect_keeps_the_query() {
        let decision = gate()
            .check(
                &evaluator(),
                &ViewRequirements::login(),
                &Principal::anonymous(),
                "/fohseriet/evenemang/",
                "/fohseriet/evenemang/?sida=2",
            )
            .await
            .unwrap();
        assert_eq!(
            decision,
            GateDecision::LoginRedirect(
                "/fohseriet/logga-in/?next=/fohseriet/evenemang/%3Fsida%3D2".to_string()
            )
        );
    }

    #[tokio::test]
    async fn missing_permission_goes_to_denial_page() {
        let requirements = ViewRequirements::login().with_permission("app.edit_x");
        let decision = decide(&gate(), &requirements, &member(&[]), "/fohseriet/x/").await;
        assert_eq!(
            decision,
            GateDecision::DeniedRedirect(
                "/fohseriet/saknar-rattigheter/?denier=/fohseriet/x/".to_string()
            )
        );

        let allowed = decide(&gate(), &requirements, &member(&["app.edit_x"]), "/x/").await;
        assert!(allowed.is_allowed());
    }

    #[tokio::test]
    async fn anonymous_lacking_permission_is_sent_to_login() {
        let requirements = ViewRequirements::none().with_permission("app.edit_x");
        let decision = decide(&gate(), &requirements, &Principal::anonymous(), "/x/").await;
        assert_eq!(
            decision,
            GateDecision::LoginRedirect("/fohseriet/logga-in/?next=/x/".to_string())
        );

        let requirements = ViewRequirements::none()
            .with_condition(PermissionExpression::method("app.Model.never"));
        let decision = decide(&gate(), &requirements, &Principal::anonymous(), "/y/").await;
        assert!(matches!(decision, GateDecision::LoginRedirect(_)));
    }

    #[tokio::test]
    async fn raising_view_answers_forbidden_even_to_anonymous() {
        let requirements = ViewRequirements::none().with_permission("app.edit_x").raising();
        let decision = decide(&gate(), &requirements, &Principal::anonymous(), "/x/").await;
        assert_eq!(decision, GateDecision::Forbidden);
    }

    #[tokio::test]
    async fn raise_exception_answers_forbidden() {
        let requirements = ViewRequirements::login()
            .with_permission("app.edit_x")
            .raising();
        let decision = decide(&gate(), &requirements, &member(&[]), "/x/").await;
        assert_eq!(decision, GateDecision::Forbidden);
    }

    #[tokio::test]
    async fn without_denial_page_falls_back_to_login() {
        let gate = AccessControlGate::new(LOGIN, None);
        let requirements = ViewRequirements::login().with_permission("app.edit_x");
        let decision = decide(&gate, &requirements, &member(&[]), "/x/").await;
        assert_eq!(
            decision,
            GateDecision::LoginRedirect("/fohseriet/logga-in/?next=/x/".to_string())
        );
    }

    #[tokio::test]
    async fn failing_predicate_is_denied() {
        let requirements =
            ViewRequirements::login().with_condition(PermissionExpression::method("app.Model.never"));
        let decision = decide(&gate(), &requirements, &member(&[]), "/x/").await;
        assert!(matches!(decision, GateDecision::DeniedRedirect(_)));
    }

    #[tokio::test]
    async fn unknown_capability_in_predicate_is_an_error() {
        let requirements = ViewRequirements::login()
            .with_condition(PermissionExpression::method("app.Model.missing"));
        let result = gate()
            .check(&evaluator(), &requirements, &member(&[]), "/x/", "/x/")
            .await;
        assert!(matches!(result, Err(AccessError::UnknownCapability(_))));
    }

    #[test]
    fn rejection_responses() {
        assert!(GateDecision::Allow.rejection().is_none());
        let response = GateDecision::Forbidden.rejection().unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let response = GateDecision::LoginRedirect("/l/".to_string())
            .rejection()
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
}
