#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Login and logout flows: credentials, CAS through the fake verifier, and
//! the return-path contract.

use axum::http::StatusCode;
use nollesystemet_kernel::store::PrincipalStore;
use nollesystemet_test_utils::{DEFAULT_PASSWORD, form, test_user};

mod common;
use common::{TestApp, body_json, location, test_config, update_cookies};

/// Session state after following `cookies` to a site index.
async fn is_logged_in(app: &TestApp, cookies: &str) -> bool {
    let page = body_json(app.get("/fadderiet/", cookies).await).await;
    page["user"]["authenticated"] == true
}

// =============================================================================
// Credential login
// =============================================================================

#[tokio::test]
async fn login_with_username_or_email() {
    let app = TestApp::new();
    let user = test_user("kim");
    app.add_user(&user);

    let cookies = app.login("kim", DEFAULT_PASSWORD).await;
    assert!(is_logged_in(&app, &cookies).await);

    let cookies = app.login("KIM@kth.se", DEFAULT_PASSWORD).await;
    assert!(is_logged_in(&app, &cookies).await);
}

#[tokio::test]
async fn successful_login_updates_last_login() {
    let app = TestApp::new();
    let id = app.add_user(&test_user("kim"));
    assert!(app.store.find_user(id).await.unwrap().unwrap().last_login.is_none());

    app.login("kim", DEFAULT_PASSWORD).await;
    assert!(app.store.find_user(id).await.unwrap().unwrap().last_login.is_some());
}

#[tokio::test]
async fn login_cycles_the_session_id() {
    let app = TestApp::new();
    app.add_user(&test_user("kim"));

    let mut cookies = String::new();
    let uri = "/fadderiet/logga-in/cred/";
    let token = app.csrf_token(uri, &mut cookies).await;
    let before = cookies.clone();
    let response = app
        .post_form(uri, form::login("kim", DEFAULT_PASSWORD, &token), &cookies)
        .await;
    update_cookies(&mut cookies, &response);

    assert!(!before.is_empty());
    assert_ne!(before, cookies);
    assert!(!is_logged_in(&app, &before).await);
    assert!(is_logged_in(&app, &cookies).await);
}

#[tokio::test]
async fn wrong_password_rerenders_the_form_as_unauthorized() {
    let app = TestApp::new();
    app.add_user(&test_user("kim"));

    let mut cookies = String::new();
    let uri = "/fadderiet/logga-in/cred/";
    let token = app.csrf_token(uri, &mut cookies).await;
    let response = app
        .post_form(uri, form::login("kim", "not it", &token), &cookies)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let page = body_json(response).await;
    assert_eq!(page["content"]["failed"], true);
    assert!(page["content"]["csrf_token"].as_str().is_some());
    assert!(!is_logged_in(&app, &cookies).await);
}

#[tokio::test]
async fn unknown_and_inactive_accounts_fail_alike() {
    let app = TestApp::new();
    let id = app.add_user(&test_user("kim"));
    app.store.deactivate(id);

    for identifier in ["kim", "nobody"] {
        let mut cookies = String::new();
        let uri = "/fadderiet/logga-in/cred/";
        let token = app.csrf_token(uri, &mut cookies).await;
        let response = app
            .post_form(uri, form::login(identifier, DEFAULT_PASSWORD, &token), &cookies)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{identifier}");
    }
}

#[tokio::test]
async fn login_requires_a_valid_csrf_token() {
    let app = TestApp::new();
    app.add_user(&test_user("kim"));

    let mut cookies = String::new();
    let uri = "/fadderiet/logga-in/cred/";
    app.csrf_token(uri, &mut cookies).await;
    let response = app
        .post_form(uri, form::login("kim", DEFAULT_PASSWORD, "forged"), &cookies)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn csrf_tokens_are_single_use() {
    let app = TestApp::new();
    app.add_user(&test_user("kim"));

    let mut cookies = String::new();
    let uri = "/fadderiet/logga-in/cred/";
    let token = app.csrf_token(uri, &mut cookies).await;
    let response = app
        .post_form(uri, form::login("kim", "not it", &token), &cookies)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = app
        .post_form(uri, form::login("kim", DEFAULT_PASSWORD, &token), &cookies)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_follows_next_and_forwards_other_params() {
    let app = TestApp::new();
    app.add_user(&test_user("kim"));

    let mut cookies = String::new();
    let uri = "/fadderiet/logga-in/cred/?next=/fohseriet/&lang=sv&failed=True";
    let token = app.csrf_token(uri, &mut cookies).await;
    let response = app
        .post_form(uri, form::login("kim", DEFAULT_PASSWORD, &token), &cookies)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/fohseriet/?lang=sv");
}

#[tokio::test]
async fn foreign_next_falls_back_to_the_site_index() {
    let app = TestApp::new();
    app.add_user(&test_user("kim"));

    let mut cookies = String::new();
    let uri = "/fadderiet/logga-in/cred/?next=//evil.example/";
    let token = app.csrf_token(uri, &mut cookies).await;
    let response = app
        .post_form(uri, form::login("kim", DEFAULT_PASSWORD, &token), &cookies)
        .await;
    assert_eq!(location(&response), "/fadderiet/");
}

// =============================================================================
// Login choice and logout
// =============================================================================

#[tokio::test]
async fn login_choice_links_carry_next() {
    let app = TestApp::new();
    let response = app
        .get("/fadderiet/logga-in/?next=/fadderiet/&failed=True", "")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    assert_eq!(page["content"]["failed"], true);
    assert_eq!(
        page["content"]["cred_login_url"],
        "/fadderiet/logga-in/cred/?next=/fadderiet/"
    );
    assert_eq!(
        page["content"]["cas_login_url"],
        "/fadderiet/logga-in/cas/?next=/fadderiet/"
    );
    assert_eq!(page["back_url"], "/fadderiet/");
}

#[tokio::test]
async fn logged_in_visitor_skips_the_login_choice() {
    let app = TestApp::new();
    let (_, cookies) = app.logged_in(&test_user("kim")).await;
    let response = app
        .get("/fohseriet/logga-in/?next=/fohseriet/evenemang/", &cookies)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/fohseriet/evenemang/");
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new();
    let (_, cookies) = app.logged_in(&test_user("kim")).await;
    assert!(is_logged_in(&app, &cookies).await);

    let response = app.post_form("/fohseriet/logga-ut/", String::new(), &cookies).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/fohseriet/");
    assert!(!is_logged_in(&app, &cookies).await);
}

#[tokio::test]
async fn deleted_account_turns_the_session_anonymous() {
    let app = TestApp::new();
    let (id, cookies) = app.logged_in(&test_user("kim")).await;
    assert!(app.store.delete_user(id).await.unwrap());
    assert!(!is_logged_in(&app, &cookies).await);
}

// =============================================================================
// CAS
// =============================================================================

#[tokio::test]
async fn cas_login_without_ticket_goes_to_the_verifier() {
    let app = TestApp::new();
    let response = app.get("/fadderiet/logga-in/cas/?next=/fadderiet/", "").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "http://localhost:3000/autentisering/cas-fake/?service=\
         http%3A//localhost%3A3000/fadderiet/logga-in/cas/%3Fnext%3D/fadderiet/"
    );
}

#[tokio::test]
async fn cas_ticket_logs_in_and_strips_cas_params() {
    let app = TestApp::new();
    app.add_user(&test_user("kim").without_password());

    let response = app
        .get(
            "/fadderiet/logga-in/cas/?next=/fohseriet/&ticket=kim&service=x&lang=sv",
            "",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/fohseriet/?lang=sv");

    let mut cookies = String::new();
    update_cookies(&mut cookies, &response);
    assert!(is_logged_in(&app, &cookies).await);
}

#[tokio::test]
async fn cas_ticket_for_unknown_user_fails() {
    let app = TestApp::new();
    let response = app
        .get("/fadderiet/logga-in/cas/?next=/fadderiet/&ticket=nobody", "")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/fadderiet/logga-in/?failed=True");
}

#[tokio::test]
async fn fake_cas_round_trip() {
    let app = TestApp::new();
    app.add_user(&test_user("kim").without_password());

    let service = "http://localhost:3000/fohseriet/logga-in/cas/?next=/fohseriet/";
    let fake = format!(
        "/autentisering/cas-fake/?{}",
        form::body(&[("service", service)])
    );

    let mut cookies = String::new();
    let response = app.get(&fake, &cookies).await;
    assert_eq!(response.status(), StatusCode::OK);
    update_cookies(&mut cookies, &response);
    let body = body_json(response).await;
    assert_eq!(body["service"], service);
    let token = body["csrf_token"].as_str().unwrap().to_string();

    let response = app
        .post_form(
            &fake,
            form::body(&[("username", "kim"), ("csrf_token", token.as_str())]),
            &cookies,
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let back = location(&response);
    assert_eq!(back, format!("{service}&ticket=kim"));

    let path = back.strip_prefix("http://localhost:3000").unwrap();
    let response = app.get(path, &cookies).await;
    assert_eq!(location(&response), "/fohseriet/");
    update_cookies(&mut cookies, &response);
    assert!(is_logged_in(&app, &cookies).await);
}

#[tokio::test]
async fn fake_cas_refuses_foreign_services() {
    let app = TestApp::new();
    let fake = format!(
        "/autentisering/cas-fake/?{}",
        form::body(&[("service", "https://evil.example/")])
    );
    let response = app.get(&fake, "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn fake_cas_is_hidden_unless_enabled() {
    let config = nollesystemet_kernel::config::Config {
        cas_fake: false,
        ..test_config()
    };
    let app = TestApp::with_config(config);
    let response = app
        .get("/autentisering/cas-fake/?service=/fadderiet/", "")
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
