//! Login, logout and auth status handlers.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use nucleus_login::{AuthError, is_headless_environment, mask_token};
use secrecy::ExposeSecret;

use crate::cancel_on_ctrl_c;
use crate::cli::args::LoginCommand;
use crate::context::AppContext;
use crate::styled_output::{MessageType, print_dim, print_info, print_success, print_warning, styled_label};

/// Run `nucleus login`, choosing the flow from the flags and the terminal.
pub async fn run_login(ctx: &AppContext, args: LoginCommand) -> Result<()> {
    let coordinator = ctx.login_coordinator();

    if let (Some(client_id), Some(client_secret)) = (&args.client_id, &args.client_secret) {
        coordinator
            .login_with_client_credentials(client_id, client_secret.expose_secret())
            .await?;
        print_success("Service account logged in successfully.");
        return Ok(());
    }

    let cancel = cancel_on_ctrl_c();
    let use_device_code = args.device_code || is_headless_environment();
    let result = if use_device_code {
        coordinator.login_with_device_code(&cancel).await
    } else {
        print_info("Waiting for the browser login to complete...");
        coordinator.login_with_browser(&cancel).await
    };

    match result {
        Ok(_) => {
            print_success("Logged in successfully.");
            Ok(())
        }
        Err(AuthError::Cancelled) => {
            print_warning("Login cancelled.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Run `nucleus logout`.
pub fn run_logout(ctx: &AppContext) -> Result<()> {
    let had_credential = matches!(ctx.store().load(), Ok(Some(_)));
    ctx.login_coordinator().logout()?;
    if had_credential {
        print_success("Logged out.");
    } else {
        print_info("No stored login was found.");
    }
    Ok(())
}

/// Run `nucleus auth status`.
pub async fn run_auth_status(ctx: &AppContext) -> Result<()> {
    let credential = match ctx.store().load() {
        Ok(Some(credential)) => credential,
        Ok(None) => {
            print_warning("Not logged in. Run 'nucleus login' to authenticate.");
            return Ok(());
        }
        Err(AuthError::CorruptCredentials(reason)) => {
            print_warning(&format!(
                "Stored credentials are unreadable ({reason}). Run 'nucleus login' again."
            ));
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    print_dim(&format!("Environment: {}", ctx.env()));
    print_dim(&format!("Credentials: {}", ctx.store().path().display()));
    print_dim(&format!("Access token: {}", mask_token(&credential.access_token)));

    match ctx.grant().validate_access_token(&credential.access_token).await {
        Ok(claims) => {
            if let Some(subject) = &claims.sub {
                print_dim(&format!("Subject: {subject}"));
            }
            print_success(&format!(
                "Logged in ({})",
                styled_label(MessageType::Success, &describe_expiry(claims.exp, unix_now()))
            ));
        }
        Err(AuthError::InvalidToken(reason)) => {
            tracing::debug!(reason = %reason, "Stored access token did not validate");
            if credential.refresh_token().is_some() {
                print_warning("Access token is no longer valid; it will be refreshed on next use.");
            } else {
                print_warning("Access token is no longer valid. Run 'nucleus login' again.");
            }
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn describe_expiry(exp: u64, now: u64) -> String {
    let Some(remaining) = exp.checked_sub(now) else {
        return "expired".to_string();
    };
    match remaining {
        0..60 => "expires in less than a minute".to_string(),
        60..3600 => format!("expires in {}m", remaining / 60),
        _ => format!("expires in {}h {}m", remaining / 3600, (remaining % 3600) / 60),
    }
}
