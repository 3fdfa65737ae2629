//! Error types for authentication and credential handling.

use thiserror::Error;

/// Errors produced by the login flows, the credential store and token resolution.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity provider or backend answered with something we could not interpret.
    #[error("Malformed response from identity provider: {0}")]
    ProtocolError(String),

    /// The user declined the authorization request.
    #[error("Access denied by user")]
    AccessDenied,

    /// The device code expired according to the provider.
    #[error("Device code expired, please try logging in again")]
    ExpiredToken,

    /// The provider returned an error code we do not recognize.
    #[error("Unable to authenticate: {code} - {description}")]
    UnknownAuthError { code: String, description: String },

    /// The callback `state` did not match the value generated for this attempt.
    #[error("CSRF check failed: state parameter mismatch")]
    StateMismatch,

    /// The access token failed signature, issuer, audience or expiry checks.
    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    /// No usable credential is stored.
    #[error("Error retrieving auth information. Try logging in via 'nucleus login'")]
    MustLogin,

    /// Refreshing failed and the stored credential was erased.
    #[error("Unable to refresh token, please try logging in again via 'nucleus login'")]
    MustReauthenticate,

    /// The provider reported an error on the browser callback.
    #[error("OAuth error from provider: {error} - {description}")]
    ProviderError { error: String, description: String },

    /// A wait ran past its deadline.
    #[error("Login timed out: {0}")]
    Timeout(String),

    /// The caller cancelled the operation.
    #[error("Login cancelled")]
    Cancelled,

    /// Network or HTTP client failure.
    #[error("Network error: {0}")]
    Transport(String),

    /// The credential file exists but is not a valid record.
    #[error("Credential file is corrupt: {0}")]
    CorruptCredentials(String),

    /// Invalid environment selection or URL.
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// The Nucleus API rejected a request.
    #[error("Nucleus API error: {0}")]
    Backend(String),

    /// Credential file read/write failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::ProtocolError(err.to_string())
        } else {
            AuthError::Transport(err.to_string())
        }
    }
}

impl AuthError {
    /// Map a provider error code from the token endpoint to the matching variant.
    pub fn from_provider_code(code: &str, description: Option<&str>) -> Self {
        match code {
            "expired_token" => AuthError::ExpiredToken,
            "access_denied" => AuthError::AccessDenied,
            other => AuthError::UnknownAuthError {
                code: other.to_string(),
                description: description.unwrap_or_default().to_string(),
            },
        }
    }
}

/// Result type for login operations.
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_provider_codes_map_to_variants() {
        assert_matches!(
            AuthError::from_provider_code("access_denied", None),
            AuthError::AccessDenied
        );
        assert_matches!(
            AuthError::from_provider_code("expired_token", Some("too late")),
            AuthError::ExpiredToken
        );
        assert_matches!(
            AuthError::from_provider_code("invalid_grant", Some("bad code")),
            AuthError::UnknownAuthError { code, description }
                if code == "invalid_grant" && description == "bad code"
        );
    }
}
