//! Gmail API hub construction from an externally acquired access token
//!
//! The OAuth handshake itself happens outside this crate. Whatever performs
//! it hands over a bearer token, which the hub attaches to every request.

use google_gmail1::{hyper_rustls, hyper_util, Gmail};
use std::fmt;

use crate::error::{MailError, Result};

/// Read access for listing and fetching message metadata
pub const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";
/// Submitting new messages
pub const SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";
/// Label changes on messages and label CRUD
pub const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Scopes the token must have been granted
pub const REQUIRED_SCOPES: &[&str] = &[READONLY_SCOPE, SEND_SCOPE, MODIFY_SCOPE];

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<HttpsConnector>;

/// Opaque bearer token supplied by the authentication collaborator
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(MailError::AuthError("missing access token".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Install the platform's rustls crypto provider once per process
///
/// Later calls are no-ops; another component may already have installed one.
pub fn install_crypto_provider() {
    #[cfg(not(windows))]
    let installed = rustls::crypto::aws_lc_rs::default_provider().install_default();

    #[cfg(windows)]
    let installed = rustls::crypto::ring::default_provider().install_default();

    if installed.is_err() {
        tracing::trace!("rustls crypto provider already installed");
    }
}

/// Build a Gmail hub that authorizes every request with `token`
///
/// Uses HTTP/1 with the platform's native root certificates.
pub fn connect(token: &AccessToken) -> Result<GmailHub> {
    install_crypto_provider();

    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(|e| MailError::AuthError(format!("Failed to load TLS roots: {}", e)))?
        .https_or_http()
        .enable_http1()
        .build();

    Ok(hub_with_connector(connector, token))
}

/// Build a Gmail hub over a caller-supplied connector
pub fn hub_with_connector(connector: HttpsConnector, token: &AccessToken) -> GmailHub {
    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(connector);

    Gmail::new(client, token.secret().to_string())
}
