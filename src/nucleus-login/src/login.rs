//! End-to-end login flows.
//!
//! The device flow suits headless terminals: the user authorizes a short code on
//! another device while the CLI polls. The browser flow redirects to a local
//! listener and is protected by a `state` check and PKCE.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::browser::BrowserLauncher;
use crate::callback::CallbackListener;
use crate::constants::{CALLBACK_HOST_PORT, CALLBACK_PATH, DEFAULT_CALLBACK_TIMEOUT, SCOPES};
use crate::error::{AuthError, Result};
use crate::grant::Auth0GrantClient;
use crate::pkce::{PkceChallenge, constant_time_eq, random_token};
use crate::storage::TokenStore;
use crate::types::{CallbackResult, Credential};

/// Drives a login attempt and records the resulting credential.
pub struct LoginCoordinator {
    grant: Auth0GrantClient,
    store: TokenStore,
    backend: Arc<dyn Backend>,
    browser: Arc<dyn BrowserLauncher>,
    scopes: Vec<String>,
    callback_host_port: String,
    callback_path: String,
    callback_timeout: Option<Duration>,
}

impl LoginCoordinator {
    pub fn new(
        grant: Auth0GrantClient,
        store: TokenStore,
        backend: Arc<dyn Backend>,
        browser: Arc<dyn BrowserLauncher>,
    ) -> Self {
        Self {
            grant,
            store,
            backend,
            browser,
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            callback_host_port: CALLBACK_HOST_PORT.to_string(),
            callback_path: CALLBACK_PATH.to_string(),
            callback_timeout: Some(DEFAULT_CALLBACK_TIMEOUT),
        }
    }

    pub fn with_callback_address(mut self, host_port: &str, path: &str) -> Self {
        self.callback_host_port = host_port.to_string();
        self.callback_path = path.to_string();
        self
    }

    /// `None` waits for the redirect until cancelled.
    pub fn with_callback_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.callback_timeout = timeout;
        self
    }

    fn scopes(&self) -> Vec<&str> {
        self.scopes.iter().map(String::as_str).collect()
    }

    /// Open `url` unless headless; failures only change what is printed.
    fn show_url(&self, url: &str) {
        if self.browser.is_headless() {
            eprintln!(
                "\n(Headless environment detected - please open the URL in a browser on another device)"
            );
            info!(is_headless = true, "Skipping browser open");
            return;
        }
        match self.browser.open(url) {
            Ok(()) => eprintln!("\n(Opening browser...)"),
            Err(e) => {
                debug!(error = %e, "Failed to open browser automatically");
                eprintln!("\n(Could not open browser automatically - please open the URL manually)");
            }
        }
    }

    /// Device authorization flow. The identity is bound before the credential is saved.
    pub async fn login_with_device_code(&self, cancel: &CancellationToken) -> Result<Credential> {
        info!(client_id = %self.grant.config().auth_client_id, "Starting device code login");
        let session = self.grant.request_device_code(&self.scopes()).await?;

        eprintln!("\nTo authenticate, visit:");
        eprintln!("\n  {}", session.verification_uri);
        eprintln!("\nAnd enter code: {}", session.user_code);
        if let Some(complete) = &session.verification_uri_complete {
            eprintln!("\nOr open this link directly:");
            eprintln!("  {complete}");
        }
        self.show_url(session.browser_url());
        eprintln!("\nWaiting for authentication...");

        let credential = self.grant.poll_for_token(&session, cancel).await?;
        self.backend.set_user(&credential.access_token).await?;
        self.store.save(&credential)?;
        info!("Device code login complete");
        Ok(credential)
    }

    /// Browser flow through the local redirect listener.
    ///
    /// Nothing is saved unless the returned `state` matches the one generated here.
    pub async fn login_with_browser(&self, cancel: &CancellationToken) -> Result<Credential> {
        let listener =
            CallbackListener::bind(&self.callback_host_port, &self.callback_path).await?;
        let redirect_uri = listener.redirect_uri().to_string();

        let state = random_token();
        let pkce = PkceChallenge::new();
        let authorize_url = self
            .grant
            .authorize_url(&self.scopes(), &state, &redirect_uri, &pkce);
        info!(redirect_uri = %redirect_uri, "Starting browser login");

        eprintln!("\nTo authenticate, open:");
        eprintln!("\n  {authorize_url}");
        self.show_url(&authorize_url);
        eprintln!("\nWaiting for the browser to finish...");

        let code = match listener.wait(self.callback_timeout, cancel).await? {
            CallbackResult::Authorized {
                code,
                state: received,
            } => {
                if !constant_time_eq(&state, &received) {
                    warn!("OAuth state mismatch, aborting login");
                    return Err(AuthError::StateMismatch);
                }
                code
            }
            CallbackResult::ProviderError { error, description } => {
                return Err(AuthError::ProviderError { error, description });
            }
            CallbackResult::Malformed(reason) => return Err(AuthError::ProtocolError(reason)),
        };
        debug!("OAuth state validation passed");

        let credential = self
            .grant
            .exchange_authorization_code(&code, &redirect_uri, &pkce.verifier)
            .await?;
        self.store.save(&credential)?;
        self.backend.set_user(&credential.access_token).await?;
        info!("Browser login complete");
        Ok(credential)
    }

    /// Service-account login: stores an access-token-only credential.
    pub async fn login_with_client_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Credential> {
        info!(client_id = %client_id, "Starting service account login");
        let access_token = self
            .backend
            .service_account_token(client_id, client_secret)
            .await?;
        let credential = Credential::access_only(access_token);
        self.store.save(&credential)?;
        self.backend
            .verify_service_account(&credential.access_token)
            .await?;
        Ok(credential)
    }

    /// Erase the stored credential and end the provider's browser session.
    pub fn logout(&self) -> Result<()> {
        self.store.clear()?;
        info!("Credential removed");

        let logout_url = self.grant.logout_url();
        if self.browser.is_headless() {
            eprintln!("\nTo end the browser session, open:\n\n  {logout_url}");
            return Ok(());
        }
        if let Err(e) = self.browser.open(&logout_url) {
            debug!(error = %e, "Failed to open browser for logout");
            eprintln!("\nTo end the browser session, open:\n\n  {logout_url}");
        }
        Ok(())
    }
}
