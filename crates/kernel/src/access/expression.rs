//! Boolean permission expressions.
//!
//! An expression is a tree whose leaves test the authentication state, a
//! permission codename, or a registered capability, combined with `AnyOf`
//! and `AllOf`.

use std::fmt;

use thiserror::Error;

/// Errors raised while building an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("an 'any' combinator needs at least one alternative")]
    EmptyAnyOf,
}

/// Authentication state required by an `AuthState` leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequirement {
    LoggedIn,
    LoggedOut,
    Any,
}

/// The non-empty child list of an `AnyOf` node.
///
/// Only [`Alternatives::new`] creates one, so an empty OR cannot exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternatives(Vec<PermissionExpression>);

impl Alternatives {
    pub fn new(children: Vec<PermissionExpression>) -> Result<Self, ExpressionError> {
        if children.is_empty() {
            return Err(ExpressionError::EmptyAnyOf);
        }
        Ok(Self(children))
    }

    pub fn as_slice(&self) -> &[PermissionExpression] {
        &self.0
    }
}

/// A composable access condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionExpression {
    AuthState(AuthRequirement),
    /// Capability key in `app.Model.method` form.
    MethodCheck(String),
    /// Permission codename such as `nollesystemet.edit_users`.
    PermissionCheck(String),
    AnyOf(Alternatives),
    AllOf(Vec<PermissionExpression>),
}

impl PermissionExpression {
    /// The empty conjunction: no constraint.
    pub fn always() -> Self {
        Self::AllOf(Vec::new())
    }

    pub fn logged_in() -> Self {
        Self::AuthState(AuthRequirement::LoggedIn)
    }

    pub fn method(key: impl Into<String>) -> Self {
        Self::MethodCheck(key.into())
    }

    pub fn permission(codename: impl Into<String>) -> Self {
        Self::PermissionCheck(codename.into())
    }

    pub fn any_of(children: Vec<PermissionExpression>) -> Result<Self, ExpressionError> {
        Alternatives::new(children).map(Self::AnyOf)
    }

    pub fn all_of(children: Vec<PermissionExpression>) -> Self {
        Self::AllOf(children)
    }

    /// Every capability key referenced anywhere in the tree.
    pub fn capability_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        self.visit_leaves(&mut |leaf| {
            if let Self::MethodCheck(key) = leaf {
                keys.push(key.as_str());
            }
        });
        keys
    }

    /// Every permission codename referenced anywhere in the tree.
    pub fn permission_codenames(&self) -> Vec<&str> {
        let mut codenames = Vec::new();
        self.visit_leaves(&mut |leaf| {
            if let Self::PermissionCheck(codename) = leaf {
                codenames.push(codename.as_str());
            }
        });
        codenames
    }

    fn visit_leaves<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        match self {
            Self::AnyOf(children) => {
                for child in children.as_slice() {
                    child.visit_leaves(visit);
                }
            }
            Self::AllOf(children) => {
                for child in children {
                    child.visit_leaves(visit);
                }
            }
            Self::AuthState(_) | Self::MethodCheck(_) | Self::PermissionCheck(_) => visit(self),
        }
    }
}

impl fmt::Display for PermissionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(
            f: &mut fmt::Formatter<'_>,
            op: &str,
            children: &[PermissionExpression],
        ) -> fmt::Result {
            write!(f, "{op}(")?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{child}")?;
            }
            write!(f, ")")
        }

        match self {
            Self::AuthState(AuthRequirement::LoggedIn) => write!(f, "logged-in"),
            Self::AuthState(AuthRequirement::LoggedOut) => write!(f, "logged-out"),
            Self::AuthState(AuthRequirement::Any) => write!(f, "any"),
            Self::MethodCheck(key) => write!(f, "method:{key}"),
            Self::PermissionCheck(codename) => write!(f, "perm:{codename}"),
            Self::AnyOf(children) => join(f, "any", children.as_slice()),
            Self::AllOf(children) => join(f, "all", children),
        }
    }
}
