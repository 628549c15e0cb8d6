use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use xero_oauth::{
    AuthFlow, EnvStore, OAUTH_CALLBACK_TIMEOUT_SECS, OAuthConfig, callback, prompt,
};

/// OAuth 2.0 helper tool that stores a Xero access token and tenant ID
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Env file holding the client configuration; receives ACCESS_TOKEN and TENANT_ID
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Catch the redirect with a local listener instead of pasting it
    #[arg(long)]
    listen: bool,

    /// Seconds to wait for the redirect when --listen is used
    #[arg(long, default_value_t = OAUTH_CALLBACK_TIMEOUT_SECS)]
    timeout_secs: u64,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("xero_oauth=info,xero_oauth_helper=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let store = EnvStore::new(&args.env_file);
    let config = OAuthConfig::from_store(&store)?;
    let redirect_uri = config.redirect_uri.clone();
    let flow = AuthFlow::new(reqwest::Client::new(), config);

    let result = if args.listen {
        // Bind before the URL is shown so an early redirect is not lost
        let listener = callback::bind(&redirect_uri).await?;
        let timeout = Duration::from_secs(args.timeout_secs);
        flow.acquire_token(|session| async move {
            prompt::print_authorization_banner(&session, "Waiting for authorization...");
            callback::wait_for_redirect_on(listener, &redirect_uri, timeout).await
        })
        .await?
    } else {
        flow.acquire_token(|session| async move {
            prompt::print_authorization_banner(
                &session,
                "After granting access, copy the URL your browser was redirected to.",
            );
            prompt::prompt_for_redirect().await
        })
        .await?
    };

    println!(
        "access_token: {} - tenant_id: {}",
        result.access_token, result.tenant_id
    );

    // Save token to env file
    store.persist(&result)?;

    eprintln!("\nACCESS_TOKEN and TENANT_ID saved to: {}", args.env_file);
    eprintln!("You can now run xero-coa against this tenant");

    Ok(())
}
