//! Named routes.
//!
//! Menus and redirects refer to pages by name (`fohseriet:evenemang:lista`)
//! rather than by path. Patterns use the router's `{param}` syntax.

use std::collections::HashMap;

/// Every named page of the application.
pub const ROUTES: &[(&str, &str)] = &[
    ("fadderiet:index", "/fadderiet/"),
    ("fadderiet:logga-in:index", "/fadderiet/logga-in/"),
    ("fadderiet:logga-in:cred", "/fadderiet/logga-in/cred/"),
    ("fadderiet:logga-in:cas", "/fadderiet/logga-in/cas/"),
    ("fadderiet:logga-ut", "/fadderiet/logga-ut/"),
    ("fadderiet:saknar-rattigheter", "/fadderiet/saknar-rattigheter/"),
    ("fadderiet:nollegrupperna", "/fadderiet/nollegrupperna/"),
    ("fadderiet:mina-sidor:profil", "/fadderiet/mina-sidor/profil/"),
    ("fohseriet:index", "/fohseriet/"),
    ("fohseriet:logga-in:index", "/fohseriet/logga-in/"),
    ("fohseriet:logga-in:cred", "/fohseriet/logga-in/cred/"),
    ("fohseriet:logga-in:cas", "/fohseriet/logga-in/cas/"),
    ("fohseriet:logga-ut", "/fohseriet/logga-ut/"),
    ("fohseriet:saknar-rattigheter", "/fohseriet/saknar-rattigheter/"),
    ("fohseriet:evenemang:lista", "/fohseriet/evenemang/"),
    ("fohseriet:evenemang:skapa", "/fohseriet/evenemang/skapa/"),
    ("fohseriet:evenemang:redigera", "/fohseriet/evenemang/{pk}/redigera/"),
    ("fohseriet:evenemang:radera", "/fohseriet/evenemang/{pk}/radera/"),
    ("fohseriet:anvandare:index", "/fohseriet/anvandare/"),
    ("fohseriet:anvandare:skapa", "/fohseriet/anvandare/skapa/"),
    ("fohseriet:anvandare:redigera", "/fohseriet/anvandare/{pk}/redigera/"),
    ("fohseriet:anvandare:radera", "/fohseriet/anvandare/{pk}/radera/"),
    ("autentisering:cas-fake", "/autentisering/cas-fake/"),
];

/// Name → path resolver.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    patterns: HashMap<String, String>,
}

impl RouteTable {
    /// Table holding [`ROUTES`].
    pub fn standard() -> Self {
        let mut table = Self::default();
        for (name, pattern) in ROUTES {
            table.insert(*name, *pattern);
        }
        table
    }

    pub fn insert(&mut self, name: impl Into<String>, pattern: impl Into<String>) {
        self.patterns.insert(name.into(), pattern.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    /// Whether `name` resolves without parameters.
    pub fn is_static(&self, name: &str) -> bool {
        self.patterns.get(name).is_some_and(|p| !p.contains('{'))
    }

    /// Path of a parameterless route.
    pub fn reverse(&self, name: &str) -> Option<String> {
        self.reverse_with(name, &[])
    }

    /// Path of a route with its `{param}` placeholders filled in. `None` if
    /// the name is unknown or a placeholder is left unfilled.
    pub fn reverse_with(&self, name: &str, params: &[(&str, &str)]) -> Option<String> {
        let mut path = self.patterns.get(name)?.clone();
        for (key, value) in params {
            path = path.replace(&format!("{{{key}}}"), value);
        }
        if path.contains('{') {
            return None;
        }
        Some(path)
    }
}
