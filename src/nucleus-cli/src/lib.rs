//! Nucleus CLI library module.
//!
//! This module provides the pieces behind the `nucleus` binary:
//! - Login, logout and auth status
//! - Sealing secrets into the service manifest
//! - Linking environments to an admission API
//!
//! # Module Organization
//!
//! - `cli/` - CLI argument parsing and command dispatch
//! - `context` - Collaborators built once per invocation
//! - Command modules - Individual CLI commands (`*_cmd.rs`)
//! - `fanout` - Concurrent per-item dispatch
//! - `styled_output` - Themed terminal output formatting

pub mod cli;
pub mod context;
pub mod environments_cmd;
pub mod fanout;
pub mod login_cmd;
pub mod prompt;
pub mod secrets_cmd;
pub mod styled_output;

use tokio_util::sync::CancellationToken;

/// A token that fires on the first Ctrl+C, so long-running login flows can stop cleanly.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupt received");
            child.cancel();
        }
    });
    token
}
