//! Target environment selection and per-environment connection settings.

use once_cell::sync::OnceCell;

use crate::constants::{
    API_AUDIENCE, AUTH0_PROD_BASE_URL, AUTH0_PROD_CLIENT_ID, AUTH0_STAGE_BASE_URL,
    AUTH0_STAGE_CLIENT_ID, DEBUG_ENV_VAR, DEV_API_URL, ON_PREM_ENV_VAR, PROD_API_URL,
    STAGE_API_URL,
};
use crate::error::{AuthError, Result};

/// Which Nucleus deployment the CLI talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NucleusEnv {
    #[default]
    Prod,
    Stage,
    Dev,
}

impl NucleusEnv {
    pub const ALL: [NucleusEnv; 3] = [NucleusEnv::Prod, NucleusEnv::Stage, NucleusEnv::Dev];

    /// Parse an environment name; empty selects prod.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "prod" => Ok(NucleusEnv::Prod),
            "stage" => Ok(NucleusEnv::Stage),
            "dev" => Ok(NucleusEnv::Dev),
            other => Err(AuthError::InvalidConfig(format!(
                "{DEBUG_ENV_VAR} can only be one of prod,stage,dev (got '{other}')"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NucleusEnv::Prod => "prod",
            NucleusEnv::Stage => "stage",
            NucleusEnv::Dev => "dev",
        }
    }

    /// Connection settings for this environment.
    pub fn connection_config(&self) -> ApiConnectionConfig {
        match self {
            NucleusEnv::Prod => ApiConnectionConfig {
                auth_base_url: AUTH0_PROD_BASE_URL.to_string(),
                auth_client_id: AUTH0_PROD_CLIENT_ID.to_string(),
                api_audience: API_AUDIENCE.to_string(),
                api_url: PROD_API_URL.to_string(),
            },
            NucleusEnv::Stage => ApiConnectionConfig {
                auth_base_url: AUTH0_STAGE_BASE_URL.to_string(),
                auth_client_id: AUTH0_STAGE_CLIENT_ID.to_string(),
                api_audience: API_AUDIENCE.to_string(),
                api_url: STAGE_API_URL.to_string(),
            },
            NucleusEnv::Dev => ApiConnectionConfig {
                auth_base_url: AUTH0_STAGE_BASE_URL.to_string(),
                auth_client_id: AUTH0_STAGE_CLIENT_ID.to_string(),
                api_audience: API_AUDIENCE.to_string(),
                api_url: DEV_API_URL.to_string(),
            },
        }
    }

    /// Transport security is required everywhere but dev.
    pub fn requires_tls(&self) -> bool {
        !matches!(self, NucleusEnv::Dev)
    }
}

impl std::fmt::Display for NucleusEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity provider and backend endpoints for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConnectionConfig {
    pub auth_base_url: String,
    pub auth_client_id: String,
    pub api_audience: String,
    pub api_url: String,
}

/// Where refresh-token exchanges are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthVariant {
    /// Refresh directly against the identity provider.
    #[default]
    Managed,
    /// Refresh through the Nucleus backend.
    OnPrem,
}

impl AuthVariant {
    /// `flag` wins; otherwise `NUCLEUS_ON_PREM` set to a truthy value selects on-prem.
    pub fn select(flag: bool, env_value: Option<&str>) -> Self {
        let from_env = env_value
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        if flag || from_env {
            AuthVariant::OnPrem
        } else {
            AuthVariant::Managed
        }
    }

    pub fn from_process_env(flag: bool) -> Self {
        Self::select(flag, std::env::var(ON_PREM_ENV_VAR).ok().as_deref())
    }
}

/// Resolves the target environment once per process and announces a non-default
/// selection exactly once.
#[derive(Debug, Default)]
pub struct EnvironmentResolver {
    raw: Option<String>,
    resolved: OnceCell<NucleusEnv>,
}

impl EnvironmentResolver {
    /// Resolver reading `NUCLEUS_DEBUG_ENV`.
    pub fn from_process_env() -> Self {
        Self::with_value(std::env::var(DEBUG_ENV_VAR).ok())
    }

    /// Resolver over an explicit value.
    pub fn with_value(raw: Option<String>) -> Self {
        Self {
            raw,
            resolved: OnceCell::new(),
        }
    }

    /// The selected environment.
    pub fn resolve(&self) -> Result<NucleusEnv> {
        self.resolved
            .get_or_try_init(|| {
                let env = NucleusEnv::parse(self.raw.as_deref().unwrap_or_default())?;
                if env != NucleusEnv::Prod {
                    tracing::info!(env = %env, "{DEBUG_ENV_VAR}={env}");
                }
                Ok(env)
            })
            .copied()
    }

    /// Whether `resolve` has already succeeded.
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }
}
