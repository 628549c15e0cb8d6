//! Local listener that catches the identity service's redirect
//!
//! An alternative to pasting the redirect URL by hand: a short-lived HTTP
//! server on the redirect URI's loopback address answers the first request to
//! the redirect path, and the full URL of that request is handed to the flow.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::RawQuery,
    response::{Html, IntoResponse},
    routing::get,
};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use url::{Host, Url};

use crate::config::parse_url;
use crate::error::{OAuthError, Result};

const SUCCESS_PAGE: &str = "<html><body><h1>Authorization Successful!</h1>\
    <p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body><h1>Authorization Failed</h1>\
    <p>Check the terminal for details. You can close this window.</p></body></html>";

/// How long the browser's last response may take to drain after shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Bind the loopback address named by the redirect URI
pub async fn bind(redirect_uri: &str) -> Result<TcpListener> {
    let addr = listen_addr(&parse_url(redirect_uri)?, redirect_uri)?;
    Ok(TcpListener::bind(addr).await?)
}

/// Wait for the redirect on an already bound listener.
///
/// Resolves to the full redirect URL, rebuilt from `redirect_uri` and the
/// query string the browser sent.
pub async fn wait_for_redirect_on(
    listener: TcpListener,
    redirect_uri: &str,
    timeout: Duration,
) -> Result<String> {
    let mut base = parse_url(redirect_uri)?;
    base.set_query(None);
    base.set_fragment(None);
    let path = base.path().to_string();

    let (redirect_tx, redirect_rx) = oneshot::channel::<String>();
    let redirect_tx = Arc::new(Mutex::new(Some(redirect_tx)));

    let callback_handler = move |RawQuery(query): RawQuery| {
        let redirect_tx = redirect_tx.clone();
        let base = base.clone();
        async move {
            let mut redirect = base;
            redirect.set_query(query.as_deref());
            let denied = redirect.query_pairs().any(|(key, _)| key == "error");

            if let Some(tx) = redirect_tx.lock().await.take() {
                let _ = tx.send(redirect.to_string());
            }

            if denied {
                Html(FAILURE_PAGE).into_response()
            } else {
                Html(SUCCESS_PAGE).into_response()
            }
        }
    };

    let app = Router::new().route(&path, get(callback_handler));

    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, %path, "waiting for OAuth redirect");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown_rx.await;
    });
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.await {
            tracing::warn!(error = %e, "callback server stopped with error");
        }
    });
    let server_abort = server_handle.abort_handle();

    let outcome = tokio::select! {
        received = tokio::time::timeout(timeout, redirect_rx) => match received {
            Ok(Ok(redirect)) => Ok(redirect),
            Ok(Err(_)) => Err(OAuthError::Cancelled),
            Err(_) => Err(OAuthError::CallbackTimeout(timeout)),
        },
        _ = tokio::signal::ctrl_c() => Err(OAuthError::Cancelled),
    };

    // Stop server
    let _ = shutdown_tx.send(());
    if tokio::time::timeout(SHUTDOWN_GRACE, server_handle).await.is_err() {
        server_abort.abort();
    }

    outcome
}

fn listen_addr(url: &Url, redirect_uri: &str) -> Result<SocketAddr> {
    let invalid = |reason: &str| OAuthError::InvalidUrl {
        url: redirect_uri.to_string(),
        reason: reason.to_string(),
    };

    if url.scheme() != "http" {
        return Err(invalid("the callback listener needs an http redirect URI"));
    }

    let ip = match url.host() {
        Some(Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
        Some(Host::Ipv4(ip)) if ip.is_loopback() => IpAddr::V4(ip),
        Some(Host::Ipv6(ip)) if ip.is_loopback() => IpAddr::V6(ip),
        _ => return Err(invalid("the callback listener only binds loopback hosts")),
    };
    let port = url.port_or_known_default().unwrap_or(80);

    Ok(SocketAddr::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(redirect_uri: &str) -> Result<SocketAddr> {
        listen_addr(&Url::parse(redirect_uri).unwrap(), redirect_uri)
    }

    #[test]
    fn listen_addr_uses_loopback_and_port() {
        assert_eq!(
            addr("http://localhost:8080/callback").unwrap(),
            "127.0.0.1:8080".parse().unwrap()
        );
        assert_eq!(
            addr("http://[::1]/callback").unwrap(),
            "[::1]:80".parse().unwrap()
        );
    }

    #[test]
    fn listen_addr_rejects_remote_or_tls_redirects() {
        assert!(matches!(
            addr("https://localhost:8080/callback"),
            Err(OAuthError::InvalidUrl { .. })
        ));
        assert!(matches!(
            addr("http://example.com/callback"),
            Err(OAuthError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn returns_full_redirect_url() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let redirect_uri = format!("http://127.0.0.1:{port}/callback");

        let waiter = tokio::spawn({
            let redirect_uri = redirect_uri.clone();
            async move {
                wait_for_redirect_on(listener, &redirect_uri, Duration::from_secs(10)).await
            }
        });

        let page = reqwest::get(format!("{redirect_uri}?code=abc123&state=s1"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(page.contains("Authorization Successful"));

        let redirect = waiter.await.unwrap().unwrap();
        assert_eq!(redirect, format!("{redirect_uri}?code=abc123&state=s1"));
    }

    #[tokio::test]
    async fn times_out_without_redirect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let err = wait_for_redirect_on(
            listener,
            &format!("http://127.0.0.1:{port}/callback"),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            OAuthError::CallbackTimeout(waited) if waited == Duration::from_millis(50)
        ));
        assert_eq!(
            err.to_string(),
            "OAuth authorization timeout (no redirect within 50ms)"
        );
    }
}
