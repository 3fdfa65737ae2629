//! Type definitions for credentials and login flow state.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::{AuthError, Result};
use crate::utils::mask_token;

/// The locally persisted login: an access token plus optional refresh and ID tokens.
///
/// Serialized as the YAML credential file (`accessToken`, `refreshToken`, `idToken`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &mask_token(&self.access_token))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Credential {
    /// Create a credential, treating empty optional tokens as absent.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        id_token: Option<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            id_token: id_token.filter(|t| !t.is_empty()),
        }
    }

    /// Credential holding only an access token (service accounts).
    pub fn access_only(access_token: impl Into<String>) -> Self {
        Self::new(access_token, None, None)
    }

    /// An empty record is equivalent to being logged out.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty()
    }

    /// Refresh token, if one was issued.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Replace this credential with a refreshed one, keeping the current refresh
    /// token when the provider did not rotate it.
    pub fn merge_refreshed(&self, refreshed: Credential) -> Credential {
        let refresh_token = refreshed
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| self.refresh_token.clone());
        Credential {
            access_token: refreshed.access_token,
            refresh_token,
            id_token: refreshed.id_token,
        }
    }
}

/// Device code response from the authorization server.
#[derive(Debug, Deserialize)]
pub(crate) struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_interval() -> u64 {
    5
}

/// One in-flight device authorization attempt.
#[derive(Debug, Clone)]
pub struct DeviceSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Verification URI with the user code embedded, when the provider supplies one.
    pub verification_uri_complete: Option<String>,
    pub expires_at: Instant,
    pub poll_interval: Duration,
}

impl DeviceSession {
    /// The poll interval never drops below `min_interval`.
    pub(crate) fn from_response(resp: DeviceCodeResponse, min_interval: Duration) -> Result<Self> {
        let expires_at = Instant::now()
            .checked_add(Duration::from_secs(resp.expires_in))
            .ok_or_else(|| {
                AuthError::ProtocolError(format!(
                    "device code expires_in out of range: {}",
                    resp.expires_in
                ))
            })?;
        Ok(Self {
            device_code: resp.device_code,
            user_code: resp.user_code,
            verification_uri: resp.verification_uri,
            verification_uri_complete: resp.verification_uri_complete.filter(|u| !u.is_empty()),
            expires_at,
            poll_interval: Duration::from_secs(resp.interval).max(min_interval),
        })
    }

    /// URL to show the user, preferring the one with the code embedded.
    pub fn browser_url(&self) -> &str {
        self.verification_uri_complete
            .as_deref()
            .unwrap_or(&self.verification_uri)
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Token response from the token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl From<TokenResponse> for Credential {
    fn from(resp: TokenResponse) -> Self {
        Credential::new(resp.access_token, resp.refresh_token, resp.id_token)
    }
}

/// Error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// What the browser redirect delivered to the callback listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResult {
    /// The provider issued an authorization code.
    Authorized { code: String, state: String },
    /// The provider reported an error (`error` / `error_description`).
    ProviderError { error: String, description: String },
    /// The redirect was missing `code` or `state`.
    Malformed(String),
}
