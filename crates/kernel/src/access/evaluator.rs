//! Evaluation of permission expressions against a principal.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::capability::CapabilityRegistry;
use super::expression::{AuthRequirement, PermissionExpression};
use super::principal::Principal;

/// Evaluation failures. Both are configuration or programming errors.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("unknown capability '{0}'")]
    UnknownCapability(String),

    #[error("capability '{key}' failed")]
    Capability {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

type EvalFuture<'a> = Pin<Box<dyn Future<Output = Result<bool, AccessError>> + Send + 'a>>;

/// Evaluates [`PermissionExpression`]s. Cheap to share; holds only the
/// read-only capability table.
#[derive(Debug, Clone)]
pub struct ConditionEvaluator {
    capabilities: Arc<CapabilityRegistry>,
}

impl ConditionEvaluator {
    pub fn new(capabilities: Arc<CapabilityRegistry>) -> Self {
        Self { capabilities }
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    /// Evaluate `expr` for `principal`.
    ///
    /// Combinators short-circuit in list order. Permission and method leaves
    /// are `false` for anonymous principals; method leaves are still resolved
    /// first so an unknown key fails for everyone.
    pub fn evaluate<'a>(
        &'a self,
        expr: &'a PermissionExpression,
        principal: &'a Principal,
    ) -> EvalFuture<'a> {
        Box::pin(async move {
            match expr {
                PermissionExpression::AuthState(requirement) => Ok(match requirement {
                    AuthRequirement::LoggedIn => principal.is_authenticated(),
                    AuthRequirement::LoggedOut => !principal.is_authenticated(),
                    AuthRequirement::Any => true,
                }),
                PermissionExpression::PermissionCheck(codename) => {
                    Ok(principal.has_permission(codename))
                }
                PermissionExpression::MethodCheck(key) => self.check_method(key, principal).await,
                PermissionExpression::AnyOf(children) => {
                    for child in children.as_slice() {
                        if self.evaluate(child, principal).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                PermissionExpression::AllOf(children) => {
                    for child in children {
                        if !self.evaluate(child, principal).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
            }
        })
    }

    async fn check_method(&self, key: &str, principal: &Principal) -> Result<bool, AccessError> {
        let capability = self
            .capabilities
            .resolve(key)
            .ok_or_else(|| AccessError::UnknownCapability(key.to_string()))?;

        if !principal.is_authenticated() {
            return Ok(false);
        }
        if principal.profile().is_none() {
            warn!(
                capability = key,
                username = principal.username(),
                "authenticated principal has no profile"
            );
        }

        let result = capability
            .check(principal)
            .await
            .map_err(|source| AccessError::Capability {
                key: key.to_string(),
                source,
            })?;
        debug!(capability = key, result, "capability checked");
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::access::capability::Capability;

    struct Counting {
        calls: Arc<AtomicUsize>,
        answer: bool,
    }

    #[async_trait]
    impl Capability for Counting {
        async fn check(&self, _principal: &Principal) -> anyhow::Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer)
        }
    }

    struct Failing;

    #[async_trait]
    impl Capability for Failing {
        async fn check(&self, _principal: &Principal) -> anyhow::Result<bool> {
            anyhow::bail!("store unavailable")
        }
    }

    fn evaluator_with(calls: &Arc<AtomicUsize>) -> ConditionEvaluator {
        let mut registry = CapabilityRegistry::new();
        registry.register(
            "app.Model.yes",
            Counting {
                calls: calls.clone(),
                answer: true,
            },
        );
        registry.register(
            "app.Model.no",
            Counting {
                calls: calls.clone(),
                answer: false,
            },
        );
        registry.register("app.Model.broken", Failing);
        ConditionEvaluator::new(Arc::new(registry))
    }

    fn member(perms: &[&str]) -> Principal {
        Principal::builder(Uuid::now_v7(), "kim")
            .permissions(perms.iter().copied())
            .build()
    }

    fn yes() -> PermissionExpression {
        PermissionExpression::permission("app.yes")
    }

    fn no() -> PermissionExpression {
        PermissionExpression::permission("app.no")
    }

    #[tokio::test]
    async fn empty_all_of_is_true_for_everyone() {
        let evaluator = evaluator_with(&Arc::new(AtomicUsize::new(0)));
        let expr = PermissionExpression::always();
        assert!(evaluator.evaluate(&expr, &Principal::anonymous()).await.unwrap());
        assert!(evaluator.evaluate(&expr, &member(&[])).await.unwrap());
    }

    #[tokio::test]
    async fn auth_state_leaves() {
        let evaluator = evaluator_with(&Arc::new(AtomicUsize::new(0)));
        let anon = Principal::anonymous();
        let kim = member(&[]);

        let logged_in = PermissionExpression::logged_in();
        let logged_out = PermissionExpression::AuthState(AuthRequirement::LoggedOut);
        let any = PermissionExpression::AuthState(AuthRequirement::Any);

        assert!(!evaluator.evaluate(&logged_in, &anon).await.unwrap());
        assert!(evaluator.evaluate(&logged_in, &kim).await.unwrap());
        assert!(evaluator.evaluate(&logged_out, &anon).await.unwrap());
        assert!(!evaluator.evaluate(&logged_out, &kim).await.unwrap());
        assert!(evaluator.evaluate(&any, &anon).await.unwrap());
        assert!(evaluator.evaluate(&any, &kim).await.unwrap());
    }

    #[tokio::test]
    async fn permission_check_is_false_for_anonymous() {
        let evaluator = evaluator_with(&Arc::new(AtomicUsize::new(0)));
        for codename in ["app.yes", "nollesystemet.edit_users", ""] {
            let expr = PermissionExpression::permission(codename);
            assert!(
                !evaluator
                    .evaluate(&expr, &Principal::anonymous())
                    .await
                    .unwrap()
            );
        }
    }

    #[tokio::test]
    async fn method_check_skips_capability_for_anonymous() {
        let calls = Arc::new(AtomicUsize::new(0));
        let evaluator = evaluator_with(&calls);
        let expr = PermissionExpression::method("app.Model.yes");

        assert!(
            !evaluator
                .evaluate(&expr, &Principal::anonymous())
                .await
                .unwrap()
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(evaluator.evaluate(&expr, &member(&[])).await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_capability_is_an_error_not_false() {
        let evaluator = evaluator_with(&Arc::new(AtomicUsize::new(0)));
        let expr = PermissionExpression::method("app.Model.missing");

        for principal in [Principal::anonymous(), member(&[])] {
            let err = evaluator.evaluate(&expr, &principal).await.unwrap_err();
            assert!(matches!(err, AccessError::UnknownCapability(ref k) if k == "app.Model.missing"));
        }
    }

    #[tokio::test]
    async fn failing_capability_propagates() {
        let evaluator = evaluator_with(&Arc::new(AtomicUsize::new(0)));
        let expr = PermissionExpression::method("app.Model.broken");
        let err = evaluator.evaluate(&expr, &member(&[])).await.unwrap_err();
        assert!(matches!(err, AccessError::Capability { .. }));
    }

    #[tokio::test]
    async fn any_of_is_order_independent() {
        let evaluator = evaluator_with(&Arc::new(AtomicUsize::new(0)));
        let kim = member(&["app.yes"]);

        for (a, b, expected) in [
            (yes(), no(), true),
            (no(), yes(), true),
            (yes(), yes(), true),
            (no(), no(), false),
        ] {
            let forward = PermissionExpression::any_of(vec![a.clone(), b.clone()]).unwrap();
            let backward = PermissionExpression::any_of(vec![b, a]).unwrap();
            assert_eq!(evaluator.evaluate(&forward, &kim).await.unwrap(), expected);
            assert_eq!(evaluator.evaluate(&backward, &kim).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn all_of_requires_both() {
        let evaluator = evaluator_with(&Arc::new(AtomicUsize::new(0)));
        let kim = member(&["app.yes"]);

        for (a, b, expected) in [
            (yes(), yes(), true),
            (yes(), no(), false),
            (no(), yes(), false),
            (no(), no(), false),
        ] {
            let expr = PermissionExpression::all_of(vec![a, b]);
            assert_eq!(evaluator.evaluate(&expr, &kim).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn any_of_short_circuits_on_first_true() {
        let calls = Arc::new(AtomicUsize::new(0));
        let evaluator = evaluator_with(&calls);
        let expr = PermissionExpression::any_of(vec![
            PermissionExpression::method("app.Model.yes"),
            PermissionExpression::method("app.Model.no"),
        ])
        .unwrap();

        assert!(evaluator.evaluate(&expr, &member(&[])).await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_of_short_circuits_on_first_false() {
        let calls = Arc::new(AtomicUsize::new(0));
        let evaluator = evaluator_with(&calls);
        let expr = PermissionExpression::all_of(vec![
            PermissionExpression::method("app.Model.no"),
            PermissionExpression::method("app.Model.yes"),
        ]);

        assert!(!evaluator.evaluate(&expr, &member(&[])).await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
