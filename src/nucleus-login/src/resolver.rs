//! Resolution of a currently valid bearer token from the stored credential.

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::Backend;
use crate::env::AuthVariant;
use crate::error::{AuthError, Result};
use crate::grant::Auth0GrantClient;
use crate::storage::TokenStore;
use crate::types::Credential;

/// Decides whether an access token is still usable.
#[async_trait]
pub trait AccessTokenValidator: Send + Sync {
    /// `Err(AuthError::InvalidToken)` means the token needs refreshing.
    async fn validate_access_token(&self, token: &str) -> Result<()>;
}

#[async_trait]
impl AccessTokenValidator for Auth0GrantClient {
    async fn validate_access_token(&self, token: &str) -> Result<()> {
        Auth0GrantClient::validate_access_token(self, token)
            .await
            .map(|_| ())
    }
}

/// Where refresh-token exchanges are sent, chosen once from the [`AuthVariant`].
#[derive(Clone)]
pub enum RefreshStrategy {
    IdentityProvider(Auth0GrantClient),
    /// Refresh through the Nucleus API on behalf of the provider client `client_id`.
    Backend {
        backend: Arc<dyn Backend>,
        client_id: String,
    },
}

impl RefreshStrategy {
    pub fn select(variant: AuthVariant, grant: Auth0GrantClient, backend: Arc<dyn Backend>) -> Self {
        match variant {
            AuthVariant::Managed => RefreshStrategy::IdentityProvider(grant),
            AuthVariant::OnPrem => RefreshStrategy::Backend {
                client_id: grant.config().auth_client_id.clone(),
                backend,
            },
        }
    }

    async fn exchange(&self, refresh_token: &str) -> Result<Credential> {
        match self {
            RefreshStrategy::IdentityProvider(grant) => {
                grant.refresh_access_token(refresh_token).await
            }
            RefreshStrategy::Backend { backend, client_id } => {
                backend.refresh_access_token(client_id, refresh_token).await
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            RefreshStrategy::IdentityProvider(_) => "identity_provider",
            RefreshStrategy::Backend { .. } => "backend",
        }
    }
}

/// Returns a valid access token, refreshing and persisting when the stored one expired.
pub struct AccessTokenResolver {
    store: TokenStore,
    validator: Arc<dyn AccessTokenValidator>,
    refresh: RefreshStrategy,
}

impl AccessTokenResolver {
    pub fn new(
        store: TokenStore,
        validator: Arc<dyn AccessTokenValidator>,
        refresh: RefreshStrategy,
    ) -> Self {
        Self {
            store,
            validator,
            refresh,
        }
    }

    /// Validation precedes refresh, refresh precedes the store update, and the store
    /// update precedes returning the new token. At most one refresh per call.
    pub async fn resolve(&self) -> Result<String> {
        let credential = match self.store.load() {
            Ok(Some(credential)) => credential,
            Ok(None) => return Err(AuthError::MustLogin),
            Err(AuthError::CorruptCredentials(reason)) => {
                tracing::warn!(reason = %reason, "Ignoring unreadable credential file");
                return Err(AuthError::MustLogin);
            }
            Err(e) => return Err(e),
        };

        let invalid = match self
            .validator
            .validate_access_token(&credential.access_token)
            .await
        {
            Ok(()) => return Ok(credential.access_token),
            Err(e @ AuthError::InvalidToken(_)) => e,
            Err(e) => return Err(e),
        };

        let Some(refresh_token) = credential.refresh_token() else {
            tracing::debug!(error = %invalid, "Access token invalid and no refresh token stored");
            return Err(invalid);
        };

        tracing::debug!(
            strategy = self.refresh.name(),
            reason = %invalid,
            "Access token invalid, refreshing"
        );

        match self.refresh.exchange(refresh_token).await {
            Ok(refreshed) => {
                let updated = credential.merge_refreshed(refreshed);
                self.store.save(&updated)?;
                tracing::info!("Access token refreshed");
                Ok(updated.access_token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Refresh failed, erasing stored credential");
                self.store.clear()?;
                Err(AuthError::MustReauthenticate)
            }
        }
    }
}
