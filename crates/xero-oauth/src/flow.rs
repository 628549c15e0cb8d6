//! Authorization-code flow against the Xero identity service
//!
//! One run walks the grant exactly once:
//!
//! 1. Build the authorization URL with a random `state`.
//! 2. Hand it to the caller, which returns the URL the browser was redirected to.
//! 3. Check `state`, pull out the `code` and exchange it at the token endpoint
//!    with the client credentials sent as HTTP Basic auth.
//! 4. Ask the connections endpoint which tenants the token reaches and keep
//!    the first one.
//!
//! Nothing is retried. Any failure ends the run.

use std::future::Future;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use url::Url;

use crate::config::{OAuthConfig, parse_url};
use crate::error::{OAuthError, Result};

/// Token endpoint response. Only `access_token` is guaranteed.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthToken {
    /// Access token for API requests
    pub access_token: String,
    /// Token type (usually "Bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime of the access token in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Present when the `offline_access` scope was granted
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Space-separated scopes actually granted
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// In-memory state of one authorization attempt
#[derive(Debug, Clone)]
pub struct AuthorizationSession {
    /// URL the operator opens to grant consent
    pub url: Url,
    /// Anti-forgery value echoed back in the redirect
    pub state: String,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResult {
    pub access_token: String,
    pub tenant_id: String,
}

/// One entry of the connections endpoint response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection {
    tenant_id: String,
    tenant_name: Option<String>,
    tenant_type: Option<String>,
}

/// Drives the authorization-code grant for one configured client
pub struct AuthFlow {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl AuthFlow {
    pub fn new(http: reqwest::Client, config: OAuthConfig) -> Self {
        Self { http, config }
    }

    /// Start a session with a freshly generated state
    pub fn authorization_session(&self) -> AuthorizationSession {
        self.authorization_session_with_state(generate_state())
    }

    /// Start a session with a caller-chosen state
    pub fn authorization_session_with_state(
        &self,
        state: impl Into<String>,
    ) -> AuthorizationSession {
        let state = state.into();
        let mut url = self.config.authorization_base_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", &state);

        AuthorizationSession { url, state }
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthToken> {
        tracing::info!(token_url = %self.config.token_url, "exchanging authorization code");

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(self.config.token_url.clone())
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await?;
            return Err(OAuthError::TokenExchange { status, body });
        }

        let token: OAuthToken = response.json().await?;
        tracing::debug!(
            token_type = %token.token_type,
            expires_in = ?token.expires_in,
            has_refresh_token = token.refresh_token.is_some(),
            "obtained access token"
        );

        Ok(token)
    }

    /// Look up the tenant the access token is connected to.
    ///
    /// Only the first connection is used, however many the credential reaches.
    pub async fn resolve_tenant(&self, access_token: &str) -> Result<String> {
        let response = self
            .http
            .get(self.config.connections_url.clone())
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "connections request failed");
            return Err(OAuthError::TenantDiscovery(response.text().await?));
        }

        // Only the first entry is decoded
        let connections: Vec<serde_json::Value> = response.json().await?;
        let available = connections.len();
        let first = connections.into_iter().next().ok_or(OAuthError::NoTenant)?;
        let first: Connection = serde_json::from_value(first)
            .map_err(|e| OAuthError::TenantDiscovery(format!("unreadable connection: {e}")))?;

        tracing::info!(
            tenant_id = %first.tenant_id,
            tenant_name = first.tenant_name.as_deref().unwrap_or("-"),
            tenant_type = first.tenant_type.as_deref().unwrap_or("-"),
            available,
            "selected tenant"
        );

        Ok(first.tenant_id)
    }

    /// Run the whole grant.
    ///
    /// `obtain_redirect` receives the session and resolves to the full URL the
    /// identity service redirected the browser to.
    pub async fn acquire_token<F, Fut>(&self, obtain_redirect: F) -> Result<TokenResult>
    where
        F: FnOnce(AuthorizationSession) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let session = self.authorization_session();
        let expected_state = session.state.clone();

        let redirect = obtain_redirect(session).await?;
        let code = extract_code(&redirect, &expected_state)?;

        let token = self.exchange_code(&code).await?;
        let tenant_id = self.resolve_tenant(&token.access_token).await?;

        Ok(TokenResult {
            access_token: token.access_token,
            tenant_id,
        })
    }
}

/// Pull the authorization code out of a redirect URL
pub fn extract_code(redirect_url: &str, expected_state: &str) -> Result<String> {
    let url = parse_url(redirect_url.trim())?;

    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            "code" => code = Some(value.into_owned()),
            _ => {}
        }
    }

    let received = state.unwrap_or_default();
    if received != expected_state {
        return Err(OAuthError::StateMismatch {
            expected: expected_state.to_string(),
            received,
        });
    }

    if let Some(error) = error {
        let reason = match error_description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        };
        return Err(OAuthError::AuthorizationDenied(reason));
    }

    code.filter(|code| !code.is_empty())
        .ok_or(OAuthError::MissingCode)
}

/// 16 random bytes, base64url without padding
fn generate_state() -> String {
    use rand::RngCore;

    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
