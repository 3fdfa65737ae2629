//! CLI argument structures and parsing.
//!
//! Defines all command-line argument structures using clap.

use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;

/// Log verbosity level for CLI output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// Only show errors
    Error,
    /// Show warnings and errors (default)
    #[default]
    Warn,
    /// Show informational messages, warnings, and errors
    Info,
    /// Show debug messages and above
    Debug,
    /// Show all messages including trace-level details
    Trace,
}

impl LogLevel {
    /// Convert to tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Parse from string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<LogLevel> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Color output mode for CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorMode {
    /// Automatically detect if output is a terminal
    #[default]
    Auto,
    /// Always output with colors
    Always,
    /// Never output with colors
    Never,
}

/// A deployment environment of a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TargetEnvironment {
    Dev,
    Stage,
    #[default]
    Prod,
}

impl TargetEnvironment {
    pub const ALL: [TargetEnvironment; 3] = [
        TargetEnvironment::Dev,
        TargetEnvironment::Stage,
        TargetEnvironment::Prod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetEnvironment::Dev => "dev",
            TargetEnvironment::Stage => "stage",
            TargetEnvironment::Prod => "prod",
        }
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, TargetEnvironment::Prod)
    }
}

impl std::fmt::Display for TargetEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nucleus CLI
#[derive(Parser, Debug)]
#[command(name = "nucleus")]
#[command(author, version)]
#[command(about = "Nucleus - deploy and configure services on Nucleus Cloud", long_about = None)]
pub struct Cli {
    /// Enable verbose output (same as NUCLEUS_LOG_LEVEL=debug)
    #[arg(long = "verbose", short = 'v', global = true)]
    pub verbose: bool,

    /// Enable trace-level logging for debugging
    #[arg(long = "trace", global = true)]
    pub trace: bool,

    /// Refresh tokens through the Nucleus API instead of the identity provider
    #[arg(long = "on-prem", global = true)]
    pub on_prem: bool,

    /// Control color output: auto (default), always, or never
    #[arg(long = "color", global = true, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in to Nucleus Cloud
    Login(LoginCommand),

    /// Log out and remove stored credentials
    Logout,

    /// Inspect the stored login
    Auth(AuthCommand),

    /// Manage encrypted service secrets
    Secrets(SecretsCommand),

    /// Manage environments
    Environments(EnvironmentsCommand),
}

/// Login command.
#[derive(Args, Debug)]
pub struct LoginCommand {
    /// Use device code authentication flow
    #[arg(long = "device-code", conflicts_with = "client_id")]
    pub device_code: bool,

    /// Service account client id
    #[arg(long = "client-id", value_name = "CLIENT_ID", requires = "client_secret")]
    pub client_id: Option<String>,

    /// Service account client secret
    #[arg(
        long = "client-secret",
        value_name = "SECRET",
        env = "NUCLEUS_CLIENT_SECRET",
        hide_env_values = true
    )]
    pub client_secret: Option<SecretString>,
}

/// Auth command.
#[derive(Args, Debug)]
pub struct AuthCommand {
    #[command(subcommand)]
    pub action: AuthSubcommand,
}

/// Auth subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthSubcommand {
    /// Show login status
    Status,
}

/// Secrets command.
#[derive(Args, Debug)]
pub struct SecretsCommand {
    #[command(subcommand)]
    pub action: SecretsSubcommand,
}

/// Secrets subcommands.
#[derive(Subcommand, Debug)]
pub enum SecretsSubcommand {
    /// Encrypt a secret value and store it in nucleus.yaml
    Set(SecretsSetArgs),
}

/// Arguments for `secrets set`.
#[derive(Args, Debug)]
pub struct SecretsSetArgs {
    /// Name of the secret
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Environment the secret belongs to
    #[arg(short = 'e', long = "env", value_enum, default_value_t = TargetEnvironment::Prod)]
    pub env: TargetEnvironment,

    /// Skip the production confirmation
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,
}

/// Environments command.
#[derive(Args, Debug)]
pub struct EnvironmentsCommand {
    #[command(subcommand)]
    pub action: EnvironmentsSubcommand,
}

/// Environments subcommands.
#[derive(Subcommand, Debug)]
pub enum EnvironmentsSubcommand {
    /// Link environments to an admission API
    Link(EnvironmentsLinkArgs),
}

/// Arguments for `environments link`.
#[derive(Args, Debug)]
pub struct EnvironmentsLinkArgs {
    /// Admission API URL
    #[arg(value_name = "URL")]
    pub url: String,

    /// Environments to link (repeatable; all when omitted)
    #[arg(short = 'e', long = "env", value_enum)]
    pub envs: Vec<TargetEnvironment>,

    /// Skip the production confirmation
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,
}

impl EnvironmentsLinkArgs {
    /// Requested environments, deduplicated in order; all when none were given.
    pub fn environments(&self) -> Vec<TargetEnvironment> {
        if self.envs.is_empty() {
            return TargetEnvironment::ALL.to_vec();
        }
        let mut envs = Vec::with_capacity(self.envs.len());
        for env in &self.envs {
            if !envs.contains(env) {
                envs.push(*env);
            }
        }
        envs
    }
}
