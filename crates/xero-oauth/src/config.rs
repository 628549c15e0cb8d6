//! Client configuration read from the env file and the process environment
//!
//! Six keys are required; `CONNECTIONS_URL` is optional and defaults to the
//! Xero tenant discovery endpoint.

use std::collections::HashMap;

use url::Url;

use crate::error::{OAuthError, Result};
use crate::store::EnvStore;

/// Tenant discovery endpoint of the Xero API
pub const XERO_CONNECTIONS_URL: &str = "https://api.xero.com/connections";

pub const CLIENT_ID_KEY: &str = "CLIENT_ID";
pub const CLIENT_SECRET_KEY: &str = "CLIENT_SECRET";
pub const REDIRECT_URI_KEY: &str = "REDIRECT_URI";
pub const AUTHORIZATION_BASE_URL_KEY: &str = "AUTHORIZATION_BASE_URL";
pub const TOKEN_URL_KEY: &str = "TOKEN_URL";
pub const SCOPE_KEY: &str = "SCOPE";
/// Optional override of [`XERO_CONNECTIONS_URL`]
pub const CONNECTIONS_URL_KEY: &str = "CONNECTIONS_URL";

/// OAuth client configuration, fixed for the lifetime of a run
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Redirect URI registered for the app
    pub redirect_uri: String,
    /// Authorization endpoint the operator's browser visits
    pub authorization_base_url: Url,
    /// Token endpoint the authorization code is exchanged at
    pub token_url: Url,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Endpoint listing the tenants the token is connected to
    pub connections_url: Url,
}

impl OAuthConfig {
    /// Build the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| OAuthError::MissingConfig(key.to_string()))
        };

        let scopes: Vec<String> = required(SCOPE_KEY)?
            .split(',')
            .map(str::trim)
            .filter(|scope| !scope.is_empty())
            .map(str::to_string)
            .collect();
        if scopes.is_empty() {
            return Err(OAuthError::MissingConfig(SCOPE_KEY.to_string()));
        }

        let connections_url = lookup(CONNECTIONS_URL_KEY)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| XERO_CONNECTIONS_URL.to_string());

        Ok(Self {
            client_id: required(CLIENT_ID_KEY)?,
            client_secret: required(CLIENT_SECRET_KEY)?,
            redirect_uri: required(REDIRECT_URI_KEY)?,
            authorization_base_url: parse_url(&required(AUTHORIZATION_BASE_URL_KEY)?)?,
            token_url: parse_url(&required(TOKEN_URL_KEY)?)?,
            scopes,
            connections_url: parse_url(&connections_url)?,
        })
    }

    /// Build the configuration from a map of entries
    pub fn from_map(entries: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|key| entries.get(key).cloned())
    }

    /// Build the configuration from an env file, letting variables already
    /// set in the process environment take precedence over the file
    pub fn from_store(store: &EnvStore) -> Result<Self> {
        let entries = store.read()?;
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| entries.get(key).cloned()))
    }
}

pub(crate) fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| OAuthError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> HashMap<String, String> {
        [
            (CLIENT_ID_KEY, "client-123"),
            (CLIENT_SECRET_KEY, "secret-456"),
            (REDIRECT_URI_KEY, "http://localhost:8080/callback"),
            (AUTHORIZATION_BASE_URL_KEY, "https://login.xero.com/identity/connect/authorize"),
            (TOKEN_URL_KEY, "https://identity.xero.com/connect/token"),
            (SCOPE_KEY, "offline_access, accounting.settings,,accounting.transactions"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn splits_scope_list_on_commas() {
        let config = OAuthConfig::from_map(&entries()).unwrap();
        assert_eq!(
            config.scopes,
            vec!["offline_access", "accounting.settings", "accounting.transactions"]
        );
        assert_eq!(config.connections_url.as_str(), XERO_CONNECTIONS_URL);
    }

    #[test]
    fn missing_key_is_reported_by_name() {
        let mut entries = entries();
        entries.remove(TOKEN_URL_KEY);
        let err = OAuthConfig::from_map(&entries).unwrap_err();
        assert!(matches!(err, OAuthError::MissingConfig(ref key) if key == TOKEN_URL_KEY));
    }

    #[test]
    fn blank_scope_is_missing() {
        let mut entries = entries();
        entries.insert(SCOPE_KEY.to_string(), " , ".to_string());
        let err = OAuthConfig::from_map(&entries).unwrap_err();
        assert!(matches!(err, OAuthError::MissingConfig(ref key) if key == SCOPE_KEY));
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let mut entries = entries();
        entries.insert(TOKEN_URL_KEY.to_string(), "not a url".to_string());
        let err = OAuthConfig::from_map(&entries).unwrap_err();
        assert!(matches!(err, OAuthError::InvalidUrl { .. }));
    }

    #[test]
    fn connections_url_can_be_overridden() {
        let mut entries = entries();
        entries.insert(
            CONNECTIONS_URL_KEY.to_string(),
            "http://127.0.0.1:9999/connections".to_string(),
        );
        let config = OAuthConfig::from_map(&entries).unwrap();
        assert_eq!(
            config.connections_url.as_str(),
            "http://127.0.0.1:9999/connections"
        );
    }
}
