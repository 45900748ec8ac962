//! CAS ticket verification.
//!
//! The login view sends the browser to the CAS server with a service URL;
//! CAS sends it back with a `ticket`, which is validated here. Validation is
//! a single call with a timeout and no retries. Any failure, transport or
//! protocol, counts as an invalid ticket.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::redirect::with_query;

/// Identity asserted by the CAS server.
#[derive(Debug, Clone, PartialEq)]
pub struct CasIdentity {
    pub username: String,
    pub attributes: HashMap<String, Value>,
}

/// Something that can validate CAS tickets.
#[async_trait]
pub trait CasVerifier: Send + Sync {
    /// Where to send a browser that has no ticket yet.
    fn login_url(&self, service_url: &str) -> String;

    /// Validate `ticket` for `service_url`. `None` means not verified.
    async fn verify(&self, ticket: &str, service_url: &str) -> Option<CasIdentity>;
}

/// Client for a real CAS server, protocol version 3 with JSON responses.
#[derive(Debug, Clone)]
pub struct CasClient {
    server_url: String,
    http: reqwest::Client,
}

impl CasClient {
    pub fn new(server_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn validate_url(&self) -> String {
        format!("{}/p3/serviceValidate", self.server_url)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidationEnvelope {
    service_response: ServiceResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceResponse {
    authentication_success: Option<AuthenticationSuccess>,
    authentication_failure: Option<AuthenticationFailure>,
}

#[derive(Debug, Deserialize)]
struct AuthenticationSuccess {
    user: String,
    #[serde(default)]
    attributes: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct AuthenticationFailure {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

/// Interpret a validation response body.
fn parse_validation(body: &str) -> Option<CasIdentity> {
    let envelope: ValidationEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "unparseable CAS validation response");
            return None;
        }
    };
    let response = envelope.service_response;
    if let Some(failure) = response.authentication_failure {
        debug!(
            code = %failure.code,
            description = %failure.description.trim(),
            "CAS ticket rejected"
        );
        return None;
    }
    let success = response.authentication_success?;
    if success.user.is_empty() {
        return None;
    }
    Some(CasIdentity {
        username: success.user,
        attributes: success.attributes,
    })
}

#[async_trait]
impl CasVerifier for CasClient {
    fn login_url(&self, service_url: &str) -> String {
        with_query(
            &format!("{}/login", self.server_url),
            [("service", service_url)],
        )
    }

    async fn verify(&self, ticket: &str, service_url: &str) -> Option<CasIdentity> {
        let result = self
            .http
            .get(self.validate_url())
            .query(&[
                ("service", service_url),
                ("ticket", ticket),
                ("format", "JSON"),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "CAS validation request failed");
                return None;
            }
        };
        match response.text().await {
            Ok(body) => parse_validation(&body),
            Err(e) => {
                warn!(error = %e, "CAS validation response unreadable");
                None
            }
        }
    }
}

/// Development stand-in: the ticket is the username.
///
/// Pairs with the fake CAS login page, which redirects back to the service
/// with `ticket=<username>`.
#[derive(Debug, Clone)]
pub struct FakeCasVerifier {
    login_page: String,
}

impl FakeCasVerifier {
    pub fn new(login_page: impl Into<String>) -> Self {
        Self {
            login_page: login_page.into(),
        }
    }
}

#[async_trait]
impl CasVerifier for FakeCasVerifier {
    fn login_url(&self, service_url: &str) -> String {
        with_query(&self.login_page, [("service", service_url)])
    }

    async fn verify(&self, ticket: &str, _service_url: &str) -> Option<CasIdentity> {
        if ticket.is_empty() {
            return None;
        }
        Some(CasIdentity {
            username: ticket.to_string(),
            attributes: HashMap::new(),
        })
    }
}
