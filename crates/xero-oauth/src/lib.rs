//! OAuth 2.0 authorization-code setup for the Xero accounting API
//!
//! Runs the consent flow once, exchanges the code for an access token,
//! discovers the connected tenant and writes both into a `.env` file.

pub mod callback;
pub mod config;
pub mod error;
pub mod flow;
pub mod prompt;
pub mod store;

pub use config::OAuthConfig;
pub use error::{OAuthError, Result};
pub use flow::{AuthFlow, AuthorizationSession, OAuthToken, TokenResult, extract_code};
pub use store::EnvStore;

/// Default wait for the redirect when the local callback listener is used
pub const OAUTH_CALLBACK_TIMEOUT_SECS: u64 = 300;
