//! OAuth 2.0 grant exchanges against the identity provider.
//!
//! Implements the Device Authorization Grant (RFC 8628), the authorization code
//! exchange for the browser flow and the refresh-token grant. All three share the
//! provider's `/oauth/token` endpoint and differ only in `grant_type`.

use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::constants::{LOGOUT_RETURN_TO, MIN_POLL_INTERVAL};
use crate::env::ApiConnectionConfig;
use crate::error::{AuthError, Result};
use crate::jwks::{AccessClaims, JwksValidator};
use crate::pkce::PkceChallenge;
use crate::types::{
    Credential, DeviceCodeResponse, DeviceSession, TokenErrorResponse, TokenResponse,
};
use crate::utils::http_client;

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// What the token endpoint answered.
enum TokenReply {
    Issued(TokenResponse),
    Rejected(TokenErrorResponse),
}

/// Client for the identity provider tenant of one environment.
#[derive(Clone)]
pub struct Auth0GrantClient {
    client: Client,
    config: ApiConnectionConfig,
    validator: JwksValidator,
    min_poll_interval: Duration,
}

impl Auth0GrantClient {
    pub fn new(config: ApiConnectionConfig) -> Result<Self> {
        Ok(Self::with_client(config, http_client()?))
    }

    pub fn with_client(config: ApiConnectionConfig, client: Client) -> Self {
        let validator =
            JwksValidator::new(&config.auth_base_url, &config.api_audience, client.clone());
        Self {
            client,
            config,
            validator,
            min_poll_interval: MIN_POLL_INTERVAL,
        }
    }

    /// Lower bound applied to the provider's device poll interval.
    pub fn with_min_poll_interval(mut self, interval: Duration) -> Self {
        self.min_poll_interval = interval;
        self
    }

    pub fn config(&self) -> &ApiConnectionConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.auth_base_url.trim_end_matches('/'))
    }

    /// Start a device authorization attempt.
    pub async fn request_device_code(&self, scopes: &[&str]) -> Result<DeviceSession> {
        let url = self.endpoint("/oauth/device/code");
        let scope = scopes.join(" ");
        debug!(url = %url, scopes = %scope, "Requesting device code");

        let response = self
            .client
            .post(&url)
            .form(&[
                ("client_id", self.config.auth_client_id.as_str()),
                ("scope", scope.as_str()),
                ("audience", self.config.api_audience.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!(status = %status, body = %body, "Device code request failed");
            return Err(AuthError::ProtocolError(format!(
                "device code request failed with status {status}"
            )));
        }

        let parsed: DeviceCodeResponse = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "Failed to parse device code response JSON");
            AuthError::ProtocolError(format!("failed to parse device code response: {e}"))
        })?;

        let session = DeviceSession::from_response(parsed, self.min_poll_interval)?;
        info!(
            user_code = %session.user_code,
            poll_interval_secs = session.poll_interval.as_secs(),
            "Device code obtained"
        );
        Ok(session)
    }

    /// Poll the token endpoint until the user authorizes the device, the session
    /// expires or the provider reports a terminal error.
    ///
    /// The session expiry is checked before every poll, so the loop always ends.
    pub async fn poll_for_token(
        &self,
        session: &DeviceSession,
        cancel: &CancellationToken,
    ) -> Result<Credential> {
        let mut poll_count: u32 = 0;

        loop {
            sleep_or_cancel(session.poll_interval, cancel).await?;

            if session.is_expired() {
                error!(poll_count, "Device code expired before authorization");
                return Err(AuthError::Timeout(
                    "device code expired before authorization".to_string(),
                ));
            }

            poll_count += 1;
            debug!(poll_count, "Polling for token");

            let reply = self
                .post_token(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("device_code", session.device_code.as_str()),
                    ("client_id", self.config.auth_client_id.as_str()),
                ])
                .await?;

            match reply {
                TokenReply::Issued(token) => {
                    info!(poll_count, "Device authorized");
                    return Ok(token.into());
                }
                TokenReply::Rejected(err) => match err.error.as_str() {
                    "authorization_pending" => {
                        debug!(poll_count, "Authorization still pending");
                    }
                    "slow_down" => {
                        debug!(poll_count, "Provider requested slow down");
                        sleep_or_cancel(session.poll_interval, cancel).await?;
                    }
                    code => {
                        warn!(
                            poll_count,
                            error_code = %code,
                            description = ?err.error_description,
                            "Device authorization failed"
                        );
                        return Err(AuthError::from_provider_code(
                            code,
                            err.error_description.as_deref(),
                        ));
                    }
                },
            }
        }
    }

    /// Exchange the code delivered to the callback listener.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<Credential> {
        debug!(redirect_uri = %redirect_uri, "Exchanging authorization code");
        self.one_shot_grant(&[
            ("grant_type", "authorization_code"),
            ("client_id", self.config.auth_client_id.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
        ])
        .await
    }

    /// Exchange a refresh token directly with the identity provider.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<Credential> {
        debug!("Refreshing access token with identity provider");
        self.one_shot_grant(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.config.auth_client_id.as_str()),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// Check signature, issuer, audience and expiry against the cached JWKS.
    pub async fn validate_access_token(&self, token: &str) -> Result<AccessClaims> {
        self.validator.validate(token).await
    }

    /// URL that starts the browser login.
    pub fn authorize_url(
        &self,
        scopes: &[&str],
        state: &str,
        redirect_uri: &str,
        pkce: &PkceChallenge,
    ) -> String {
        format!(
            "{}?audience={}&scope={}&response_type=code&client_id={}&redirect_uri={}&state={}&code_challenge={}&code_challenge_method={}",
            self.endpoint("/authorize"),
            urlencoding::encode(&self.config.api_audience),
            urlencoding::encode(&scopes.join(" ")),
            urlencoding::encode(&self.config.auth_client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(&pkce.challenge),
            PkceChallenge::METHOD,
        )
    }

    /// URL that ends the identity provider's browser session.
    pub fn logout_url(&self) -> String {
        format!(
            "{}?client_id={}&returnTo={}",
            self.endpoint("/v2/logout"),
            urlencoding::encode(&self.config.auth_client_id),
            urlencoding::encode(LOGOUT_RETURN_TO),
        )
    }

    async fn one_shot_grant(&self, form: &[(&str, &str)]) -> Result<Credential> {
        match self.post_token(form).await? {
            TokenReply::Issued(token) => Ok(token.into()),
            TokenReply::Rejected(err) => {
                warn!(error_code = %err.error, "Token request rejected");
                Err(AuthError::from_provider_code(
                    &err.error,
                    err.error_description.as_deref(),
                ))
            }
        }
    }

    async fn post_token(&self, form: &[(&str, &str)]) -> Result<TokenReply> {
        let response = self
            .client
            .post(self.endpoint("/oauth/token"))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
                error!(error = %e, "Failed to parse token response JSON");
                AuthError::ProtocolError(format!("failed to parse token response: {e}"))
            })?;
            if token.access_token.is_empty() {
                return Err(AuthError::ProtocolError(
                    "token response without access_token".to_string(),
                ));
            }
            debug!(
                token_type = ?token.token_type,
                expires_in = ?token.expires_in,
                has_refresh_token = token.refresh_token.is_some(),
                "Token received"
            );
            return Ok(TokenReply::Issued(token));
        }

        match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => Ok(TokenReply::Rejected(err)),
            Err(_) => {
                error!(status = %status, body = %body, "Unexpected token response");
                Err(AuthError::ProtocolError(format!(
                    "unexpected token response: {status}"
                )))
            }
        }
    }
}

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(AuthError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
