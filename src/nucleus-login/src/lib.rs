//! Nucleus Login - identity layer for the Nucleus CLI.
//!
//! Provides:
//! - Device code and browser (authorization code + PKCE) login flows
//! - Credential file storage with atomic replacement
//! - Access token validation against the provider's JWKS
//! - Token resolution with refresh through the provider or the Nucleus API

// Core modules
pub mod constants;
pub mod env;
pub mod error;
pub mod types;
mod utils;

// Storage
mod storage;

// Remote collaborators
pub mod backend;
pub mod browser;
mod grant;
mod jwks;

// Flows
mod callback;
mod login;
pub mod pkce;
mod resolver;

pub use backend::{Backend, HttpBackend};
pub use browser::{BrowserLauncher, SystemBrowser, is_headless_environment};
pub use callback::CallbackListener;
pub use env::{ApiConnectionConfig, AuthVariant, EnvironmentResolver, NucleusEnv};
pub use error::{AuthError, Result};
pub use grant::Auth0GrantClient;
pub use jwks::{AccessClaims, JwksValidator};
pub use login::LoginCoordinator;
pub use resolver::{AccessTokenResolver, AccessTokenValidator, RefreshStrategy};
pub use storage::{TokenStore, default_config_dir, resolve_config_dir};
pub use types::{CallbackResult, Credential, DeviceSession};
pub use utils::mask_token;
