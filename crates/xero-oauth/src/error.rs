//! Error types for the Xero OAuth setup flow

use std::time::Duration;

use thiserror::Error;

/// Errors produced while acquiring and persisting a Xero access token
#[derive(Error, Debug)]
pub enum OAuthError {
    /// A required configuration key is absent or blank
    #[error("Missing configuration key: {0}")]
    MissingConfig(String),

    /// A URL (endpoint, redirect URI or pasted redirect) could not be used
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The operator supplied no redirect URL
    #[error("No redirect URL was provided")]
    MissingRedirect,

    /// The identity provider redirected back with an error instead of a code
    #[error("Authorization was denied: {0}")]
    AuthorizationDenied(String),

    /// The redirect URL carried no authorization code
    #[error("Authorization code missing from redirect URL")]
    MissingCode,

    /// The state in the redirect URL does not belong to this session
    #[error("State mismatch in redirect URL (expected {expected}, got {received})")]
    StateMismatch { expected: String, received: String },

    /// The token endpoint rejected the authorization code
    #[error("Failed to exchange authorization code (status {status}): {body}")]
    TokenExchange { status: u16, body: String },

    /// The connections endpoint returned a non-success status; carries the raw body
    #[error("{0}")]
    TenantDiscovery(String),

    /// The credential is not connected to any tenant
    #[error("No tenant available for this credential")]
    NoTenant,

    /// No redirect arrived at the local listener in time
    #[error("OAuth authorization timeout (no redirect within {0:?})")]
    CallbackTimeout(Duration),

    /// The operator interrupted the wait for the redirect
    #[error("OAuth authorization cancelled")]
    Cancelled,

    /// Reading the configuration store failed
    #[error("Failed to read env file '{path}': {source}")]
    EnvFile {
        path: String,
        #[source]
        source: dotenvy::Error,
    },

    /// HTTP transport or response decoding errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for OAuth setup operations
pub type Result<T> = std::result::Result<T, OAuthError>;
