//! Command dispatch and execution handlers.

use anyhow::Result;

use super::args::*;
use crate::context::AppContext;
use crate::environments_cmd::run_environments_link;
use crate::login_cmd::{run_auth_status, run_login, run_logout};
use crate::secrets_cmd::run_secrets_set;

/// Dispatch a CLI command to its handler.
pub async fn dispatch_command(cli: Cli) -> Result<()> {
    let ctx = AppContext::from_process_env(cli.on_prem)?;
    match cli.command {
        Commands::Login(login_cli) => run_login(&ctx, login_cli).await,
        Commands::Logout => run_logout(&ctx),
        Commands::Auth(AuthCommand {
            action: AuthSubcommand::Status,
        }) => run_auth_status(&ctx).await,
        Commands::Secrets(SecretsCommand {
            action: SecretsSubcommand::Set(args),
        }) => run_secrets_set(&ctx, args).await,
        Commands::Environments(EnvironmentsCommand {
            action: EnvironmentsSubcommand::Link(args),
        }) => run_environments_link(&ctx, args).await,
    }
}
