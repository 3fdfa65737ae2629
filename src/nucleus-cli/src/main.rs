//! Nucleus CLI - Main entry point.
//!
//! - `login` / `logout` / `auth status` - authentication
//! - `secrets set` - seal a secret into `nucleus.yaml`
//! - `environments link` - point environments at an admission API

use clap::Parser;

use nucleus_cli::cli::{Cli, LogLevel, dispatch_command};
use nucleus_cli::styled_output::{print_error, set_color_mode};

/// Level precedence: `--trace`, then `--verbose`, then `NUCLEUS_LOG_LEVEL`, then warn.
fn init_logging(cli: &Cli) {
    let log_level = if cli.trace {
        LogLevel::Trace
    } else if cli.verbose {
        LogLevel::Debug
    } else if let Ok(env_level) = std::env::var("NUCLEUS_LOG_LEVEL") {
        LogLevel::from_str_loose(&env_level).unwrap_or_default()
    } else {
        LogLevel::default()
    };

    let filter_str = if std::env::var("RUST_LOG").is_ok() {
        let level = log_level.as_filter_str();
        format!(
            "error,nucleus={level},nucleus_cli={level},nucleus_login={level},nucleus_secrets={level}"
        )
    } else {
        log_level.as_filter_str().to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(&filter_str)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    set_color_mode(cli.color);

    init_logging(&cli);

    if let Err(e) = dispatch_command(cli).await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
