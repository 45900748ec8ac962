//! The two sites served by the application.
//!
//! `fadderiet` is the member-facing site and `fohseriet` the staff-facing
//! one. They share the access and menu engine but each has its own menu
//! document, login page and denial page.

use std::fmt;
use std::path::{Path, PathBuf};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::access::AccessControlGate;
use crate::error::AppError;
use crate::routes::names::RouteTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    Fadderiet,
    Fohseriet,
}

impl Site {
    pub const ALL: [Site; 2] = [Site::Fadderiet, Site::Fohseriet];

    pub fn name(self) -> &'static str {
        match self {
            Site::Fadderiet => "fadderiet",
            Site::Fohseriet => "fohseriet",
        }
    }

    /// URL prefix, without trailing slash.
    pub fn prefix(self) -> &'static str {
        match self {
            Site::Fadderiet => "/fadderiet",
            Site::Fohseriet => "/fohseriet",
        }
    }

    /// The site a request path belongs to.
    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|site| {
            path.strip_prefix(site.prefix())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    /// Fully qualified route name, e.g. `fohseriet:logga-in:index`.
    pub fn route(self, name: &str) -> String {
        format!("{}:{name}", self.name())
    }

    pub fn menu_path(self, menu_dir: &Path) -> PathBuf {
        menu_dir.join(format!("{}.json", self.name()))
    }

    pub fn index_url(self) -> String {
        format!("{}/", self.prefix())
    }

    fn url(self, routes: &RouteTable, name: &str, fallback: &str) -> String {
        routes
            .reverse(&self.route(name))
            .unwrap_or_else(|| format!("{}/{fallback}/", self.prefix()))
    }

    pub fn login_url(self, routes: &RouteTable) -> String {
        self.url(routes, "logga-in:index", "logga-in")
    }

    pub fn denied_url(self, routes: &RouteTable) -> String {
        self.url(routes, "saknar-rattigheter", "saknar-rattigheter")
    }

    /// Gate sending visitors to this site's login and denial pages.
    pub fn gate(self, routes: &RouteTable) -> AccessControlGate {
        AccessControlGate::new(self.login_url(routes), Some(self.denied_url(routes)))
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The site of the requested path; 404 outside both sites.
impl<S> FromRequestParts<S> for Site
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Site::from_path(parts.uri.path()).ok_or(AppError::NotFound)
    }
}
