#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! [`TestApp`] runs the real router, principal layer, gates and menus
//! against the in-memory principal store, an in-memory session store and
//! the fake CAS verifier. No database or Redis is needed.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::cookie::SameSite;
use uuid::Uuid;

use nollesystemet_kernel::config::Config;
use nollesystemet_kernel::models::{CreateUser, ProfileInput, Program, UserType};
use nollesystemet_kernel::routes::app_router;
use nollesystemet_kernel::routes::names::RouteTable;
use nollesystemet_kernel::session::session_layer;
use nollesystemet_kernel::state::{AppState, cas_verifier};
use nollesystemet_kernel::store::MemoryStore;
use nollesystemet_test_utils::{TestUser, form};

/// The shipped site menus.
pub fn menu_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../resources/menus"))
}

/// Configuration for tests: shipped menus and the fake CAS.
pub fn test_config() -> Config {
    Config {
        menu_dir: menu_dir(),
        cas_fake: true,
        ..Config::default()
    }
}

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let routes = Arc::new(RouteTable::standard());
        let cas = cas_verifier(&config, &routes).expect("CAS verifier");
        let state = AppState::from_parts(config, routes, store.clone(), store.clone(), cas);
        state.preload_menus().expect("shipped menus must load");

        let router = app_router(state.clone()).layer(session_layer(
            tower_sessions::MemoryStore::default(),
            SameSite::Lax,
        ));

        Self {
            router,
            store,
            state,
        }
    }

    /// Store an account from a fixture and return its id.
    pub fn add_user(&self, fixture: &TestUser) -> Uuid {
        let user_type: UserType = fixture.user_type.to_string().parse().expect("user type");
        let user = self
            .store
            .add_user(
                CreateUser {
                    username: fixture.username.clone(),
                    email: fixture.email.clone(),
                    password: fixture.password.clone(),
                    is_superuser: fixture.superuser,
                },
                Some(ProfileInput {
                    first_name: fixture.first_name.clone(),
                    last_name: fixture.last_name.clone(),
                    user_type,
                    nolle_group_id: None,
                    program: Program::None,
                    kth_id: String::new(),
                    phone_number: String::new(),
                    food_preference: String::new(),
                }),
            )
            .expect("add user");
        for codename in &fixture.permissions {
            self.store.grant(user.id, codename);
        }
        user.id
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a request with cookies from a previous response.
    pub async fn request_with_cookies(
        &self,
        mut request: Request<Body>,
        cookies: &str,
    ) -> Response {
        if !cookies.is_empty() {
            request.headers_mut().insert(
                header::COOKIE,
                cookies.parse().expect("Invalid cookie header"),
            );
        }
        self.request(request).await
    }

    pub async fn get(&self, uri: &str, cookies: &str) -> Response {
        self.request_with_cookies(Request::get(uri).body(Body::empty()).unwrap(), cookies)
            .await
    }

    pub async fn post_form(&self, uri: &str, body: String, cookies: &str) -> Response {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.request_with_cookies(request, cookies).await
    }

    /// Fetch a form page and return its CSRF token, keeping `cookies`
    /// current.
    pub async fn csrf_token(&self, uri: &str, cookies: &mut String) -> String {
        let response = self.get(uri, cookies).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
        update_cookies(cookies, &response);
        let page = body_json(response).await;
        page["content"]["csrf_token"]
            .as_str()
            .expect("page carries a CSRF token")
            .to_string()
    }

    /// Log in through the credential form and return session cookies.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let mut cookies = String::new();
        let uri = "/fohseriet/logga-in/cred/";
        let token = self.csrf_token(uri, &mut cookies).await;
        let response = self
            .post_form(uri, form::login(username, password, &token), &cookies)
            .await;
        assert_eq!(
            response.status(),
            StatusCode::SEE_OTHER,
            "Login failed for user '{username}'"
        );
        update_cookies(&mut cookies, &response);
        cookies
    }

    /// Store `fixture` and log it in.
    pub async fn logged_in(&self, fixture: &TestUser) -> (Uuid, String) {
        let id = self.add_user(fixture);
        let password = fixture.password.as_deref().expect("fixture has a password");
        (id, self.login(&fixture.username, password).await)
    }
}

/// Extract Set-Cookie headers from a response for use in subsequent requests.
pub fn extract_cookies(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|cookie| {
            // Extract just the cookie name=value, ignoring attributes
            cookie.split(';').next()
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Replace `cookies` when the response set new ones.
pub fn update_cookies(cookies: &mut String, response: &Response) {
    let fresh = extract_cookies(response);
    if !fresh.is_empty() {
        *cookies = fresh;
    }
}

/// The `Location` of a redirect.
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect has a Location")
        .to_str()
        .unwrap()
        .to_string()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        panic!(
            "body is not JSON ({e}): {}",
            String::from_utf8_lossy(&bytes)
        )
    })
}
