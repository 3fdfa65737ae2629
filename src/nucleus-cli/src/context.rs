//! Collaborators shared by the commands of one CLI invocation.

use std::sync::Arc;

use anyhow::Result;
use nucleus_login::{
    AccessTokenResolver, Auth0GrantClient, AuthVariant, Backend, EnvironmentResolver,
    HttpBackend, LoginCoordinator, NucleusEnv, RefreshStrategy, SystemBrowser, TokenStore,
};

/// Environment, variant and clients, resolved once at startup.
pub struct AppContext {
    env: NucleusEnv,
    variant: AuthVariant,
    grant: Auth0GrantClient,
    backend: Arc<dyn Backend>,
    store: TokenStore,
}

impl AppContext {
    /// Build from `NUCLEUS_DEBUG_ENV`, `NUCLEUS_ON_PREM` and the default config directory.
    pub fn from_process_env(on_prem: bool) -> Result<Self> {
        let env = EnvironmentResolver::from_process_env().resolve()?;
        let variant = AuthVariant::from_process_env(on_prem);
        let grant = Auth0GrantClient::new(env.connection_config())?;
        let backend: Arc<dyn Backend> = Arc::new(HttpBackend::for_env(env)?);
        let store = TokenStore::from_default_location()?;
        tracing::debug!(
            env = %env,
            variant = ?variant,
            credentials = %store.path().display(),
            "CLI context ready"
        );
        Ok(Self {
            env,
            variant,
            grant,
            backend,
            store,
        })
    }

    pub fn env(&self) -> NucleusEnv {
        self.env
    }

    pub fn grant(&self) -> &Auth0GrantClient {
        &self.grant
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn login_coordinator(&self) -> LoginCoordinator {
        LoginCoordinator::new(
            self.grant.clone(),
            self.store.clone(),
            Arc::clone(&self.backend),
            Arc::new(SystemBrowser),
        )
    }

    pub fn token_resolver(&self) -> AccessTokenResolver {
        AccessTokenResolver::new(
            self.store.clone(),
            Arc::new(self.grant.clone()),
            RefreshStrategy::select(self.variant, self.grant.clone(), Arc::clone(&self.backend)),
        )
    }

    /// A valid access token for the next backend call.
    pub async fn access_token(&self) -> Result<String> {
        Ok(self.token_resolver().resolve().await?)
    }
}
