//! The `conditions` block of a menu item.
//!
//! ```json
//! "conditions": {
//!     "logged-in": "True",
//!     "methods": { "any": ["nollesystemet.UserProfile.can_see_some_user"] },
//!     "permissions": { "all": ["fohseriet.edit_happening"] }
//! }
//! ```
//!
//! Each facet is optional. The item is shown when every present facet holds.

use serde::Deserialize;

use super::expression::{AuthRequirement, ExpressionError, PermissionExpression};

/// Facets of an item condition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemConditions {
    #[serde(rename = "logged-in", default)]
    pub logged_in: Option<LoggedInFacet>,

    #[serde(default)]
    pub methods: Option<FacetSpec>,

    #[serde(default)]
    pub permissions: Option<FacetSpec>,
}

/// Value of the `logged-in` facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum LoggedInFacet {
    #[serde(rename = "True")]
    LoggedIn,
    #[serde(rename = "False")]
    LoggedOut,
    #[serde(rename = "any")]
    Any,
}

/// `any` / `all` lists inside the `methods` and `permissions` facets.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacetSpec {
    #[serde(default)]
    pub any: Option<Vec<String>>,

    #[serde(default)]
    pub all: Option<Vec<String>>,
}

impl FacetSpec {
    fn lower(
        &self,
        leaf: fn(String) -> PermissionExpression,
    ) -> Result<PermissionExpression, ExpressionError> {
        let mut parts = Vec::with_capacity(2);
        if let Some(any) = &self.any {
            parts.push(PermissionExpression::any_of(
                any.iter().cloned().map(leaf).collect(),
            )?);
        }
        if let Some(all) = &self.all {
            parts.push(PermissionExpression::all_of(
                all.iter().cloned().map(leaf).collect(),
            ));
        }
        // Method and permission facets never hold for anonymous visitors.
        Ok(PermissionExpression::all_of(vec![
            PermissionExpression::logged_in(),
            PermissionExpression::all_of(parts),
        ]))
    }
}

impl ItemConditions {
    /// Lower the facets to a single expression: the conjunction of the
    /// facets that are present.
    pub fn to_expression(&self) -> Result<PermissionExpression, ExpressionError> {
        let mut facets = Vec::with_capacity(3);

        match self.logged_in {
            Some(LoggedInFacet::LoggedIn) => facets.push(PermissionExpression::logged_in()),
            Some(LoggedInFacet::LoggedOut) => {
                facets.push(PermissionExpression::AuthState(AuthRequirement::LoggedOut));
            }
            Some(LoggedInFacet::Any) | None => {}
        }

        if let Some(methods) = &self.methods {
            facets.push(methods.lower(PermissionExpression::MethodCheck)?);
        }
        if let Some(permissions) = &self.permissions {
            facets.push(permissions.lower(PermissionExpression::PermissionCheck)?);
        }

        Ok(PermissionExpression::all_of(facets))
    }
}
