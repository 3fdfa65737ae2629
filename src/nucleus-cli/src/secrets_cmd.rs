//! `nucleus secrets set`: seal a value and store it in the service manifest.

use std::io;

use anyhow::{Context, Result, bail};
use nucleus_secrets::{MANIFEST_FILE, SecretCipher, ServiceManifest, validate_service_name};

use crate::cli::args::{SecretsSetArgs, TargetEnvironment};
use crate::context::AppContext;
use crate::prompt::{confirm, read_line, read_piped_value, stdin_is_piped};
use crate::styled_output::{print_info, print_success};

/// Where the secret value comes from and whether production was confirmed.
fn read_secret_value(env: TargetEnvironment, yes: bool) -> Result<Option<String>> {
    if stdin_is_piped() {
        if env.is_prod() && !yes {
            bail!("must provide -y when piping in secret value to production environment");
        }
        return read_piped_value(io::stdin().lock()).map(Some);
    }

    let value = read_line("Enter secret value: ", io::stdin().lock())?;
    if value.is_empty() {
        bail!("secret length must be greater than 0");
    }
    if env.is_prod()
        && !yes
        && !confirm(
            "You are about to set a secret in the production environment. Continue?",
            io::stdin().lock(),
        )?
    {
        return Ok(None);
    }
    Ok(Some(value))
}

/// Seal `value` under `public_key_der` and record it as `spec.secrets[env][name]`.
pub fn seal_into_manifest(
    manifest: &mut ServiceManifest,
    env: TargetEnvironment,
    name: &str,
    value: &str,
    public_key_der: &[u8],
) -> Result<()> {
    let cipher = SecretCipher::from_der(public_key_der)?;
    cipher.check_plaintext_len(value.as_bytes())?;
    let sealed = cipher.encrypt(value.as_bytes())?;
    manifest.set_secret(env.as_str(), name, &sealed)?;
    Ok(())
}

/// Run `nucleus secrets set`.
pub async fn run_secrets_set(ctx: &AppContext, args: SecretsSetArgs) -> Result<()> {
    let mut manifest = ServiceManifest::load(MANIFEST_FILE)
        .with_context(|| format!("unable to read {MANIFEST_FILE} in the current directory"))?;
    let service_name = manifest.service_name()?.to_string();
    validate_service_name(&service_name)?;

    let Some(value) = read_secret_value(args.env, args.yes)? else {
        print_info("Secret not set.");
        return Ok(());
    };

    let access_token = ctx.access_token().await?;
    let public_key = ctx
        .backend()
        .get_public_secret_key(&access_token, args.env.as_str(), &service_name)
        .await?;

    seal_into_manifest(&mut manifest, args.env, &args.name, &value, &public_key)?;
    manifest.save()?;
    tracing::info!(service = %service_name, env = %args.env, secret = %args.name, "Secret sealed");
    print_success(&format!(
        "Secret '{}' set for {} in {}",
        args.name,
        args.env,
        manifest.path().display()
    ));
    Ok(())
}
