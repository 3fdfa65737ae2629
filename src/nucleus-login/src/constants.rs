//! Constants for the nucleus-login crate.

use std::time::Duration;

/// Identity provider tenant for production.
pub const AUTH0_PROD_BASE_URL: &str = "https://auth.nucleuscloud.com";

/// Identity provider client ID for production.
pub const AUTH0_PROD_CLIENT_ID: &str = "6zk97YDDj9YplY9jqOaHmKYojhEXquD8";

/// Identity provider tenant for stage and dev.
pub const AUTH0_STAGE_BASE_URL: &str = "https://auth.stage.nucleuscloud.com";

/// Identity provider client ID for stage and dev.
pub const AUTH0_STAGE_CLIENT_ID: &str = "IHJD9fSlrH4p9WhPYp6uJe0yFNr26ZLy";

/// Audience of the Nucleus API access tokens.
pub const API_AUDIENCE: &str = "https://api.usenucleus.cloud";

/// Where the identity provider sends the browser after logout.
pub const LOGOUT_RETURN_TO: &str = "https://nucleuscloud.com";

/// Management API base URLs.
pub const PROD_API_URL: &str = "https://mgmt-api-nucleus.svcs.nucleuscloud.com";
pub const STAGE_API_URL: &str = "https://mgmt-api-nucleus.svcs.stage.nucleuscloud.com";
pub const DEV_API_URL: &str = "http://localhost:50051";

/// Scopes requested by both login flows.
pub const SCOPES: &[&str] = &[
    "openid",
    "profile",
    "offline_access",
    "deploy:service",
    "read:service",
];

/// Environment variable selecting the target environment (prod, stage, dev).
pub const DEBUG_ENV_VAR: &str = "NUCLEUS_DEBUG_ENV";

/// Environment variable selecting the on-prem auth variant.
pub const ON_PREM_ENV_VAR: &str = "NUCLEUS_ON_PREM";

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV_VAR: &str = "NUCLEUS_CONFIG_DIR";

/// Name of the credential file inside the config directory.
pub const AUTH_FILE_NAME: &str = "auth.yaml";

/// Host and port the browser callback listener binds to.
pub const CALLBACK_HOST_PORT: &str = "localhost:4242";

/// Path of the browser callback route.
pub const CALLBACK_PATH: &str = "/api/auth/callback";

/// Floor for the device flow poll interval (RFC 8628 default).
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Timeout applied to every HTTP request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time to wait for the browser redirect.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// How long fetched signing keys stay cached.
pub const JWKS_CACHE_TTL: Duration = Duration::from_secs(300);

/// Clock skew tolerated when validating token expiry.
pub const TOKEN_LEEWAY_SECS: u64 = 60;

/// User-Agent string for HTTP requests
pub const USER_AGENT: &str = concat!("nucleus-cli/", env!("CARGO_PKG_VERSION"));
