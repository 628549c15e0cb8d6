//! Console side of the consent step

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::error::{OAuthError, Result};
use crate::flow::AuthorizationSession;

/// Show the operator where to grant consent
pub fn print_authorization_banner(session: &AuthorizationSession, waiting: &str) {
    eprintln!("\n=================================================");
    eprintln!("Xero OAuth 2.0 Authorization Required");
    eprintln!("=================================================");
    eprintln!("\nPlease go to the following URL and authorize access:\n");
    eprintln!("{}\n", session.url);
    eprintln!("{waiting}");
    eprintln!("=================================================\n");
}

/// Read one pasted redirect URL
pub async fn read_redirect<R>(reader: &mut R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let redirect = line.trim();
    if redirect.is_empty() {
        return Err(OAuthError::MissingRedirect);
    }
    Ok(redirect.to_string())
}

/// Ask for the redirect URL on stdin. Waits as long as it takes.
pub async fn prompt_for_redirect() -> Result<String> {
    eprint!("Paste the full redirect URL here: ");
    let mut stdin = BufReader::new(tokio::io::stdin());
    read_redirect(&mut stdin).await
}
