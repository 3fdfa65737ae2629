//! `nucleus environments link`: point environments at an admission API.

use std::io;

use anyhow::{Result, anyhow, bail};
use url::Url;

use crate::cli::args::EnvironmentsLinkArgs;
use crate::context::AppContext;
use crate::fanout::dispatch_first_error;
use crate::prompt::{confirm, stdin_is_piped};
use crate::styled_output::{print_info, print_success};

/// Accept only absolute http(s) URLs with a host.
pub fn validate_admission_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| anyhow!("invalid URL '{raw}': {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("invalid URL '{raw}': scheme must be http or https");
    }
    if url.host_str().is_none_or(str::is_empty) {
        bail!("invalid URL '{raw}': missing host");
    }
    Ok(url)
}

/// Run `nucleus environments link`.
pub async fn run_environments_link(ctx: &AppContext, args: EnvironmentsLinkArgs) -> Result<()> {
    let url = validate_admission_url(&args.url)?;
    let envs = args.environments();

    if envs.iter().any(|env| env.is_prod()) && !args.yes {
        if stdin_is_piped() {
            bail!("must provide -y to link the production environment non-interactively");
        }
        if !confirm(
            &format!("Link the production environment to {url}?"),
            io::stdin().lock(),
        )? {
            print_info("No environments were linked.");
            return Ok(());
        }
    }

    let access_token = ctx.access_token().await?;
    let backend = ctx.backend();
    let names: Vec<&'static str> = envs.iter().map(|env| env.as_str()).collect();
    tracing::info!(url = %url, environments = ?names, "Linking environments");

    let link = url.to_string();
    dispatch_first_error(names.clone(), names.len(), move |env| {
        let backend = backend.clone();
        let access_token = access_token.clone();
        let link = link.clone();
        async move {
            backend
                .set_admission_api_link(&access_token, env, &link)
                .await
                .map_err(|e| anyhow!("failed to link {env}: {e}"))?;
            tracing::debug!(env, "Environment linked");
            Ok::<(), anyhow::Error>(())
        }
    })
    .await?;

    print_success(&format!("Linked {} to {url}", names.join(", ")));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validate_admission_url() {
        let url = validate_admission_url("https://admission.example.com/hooks").unwrap();
        assert_eq!(url.host_str(), Some("admission.example.com"));
        validate_admission_url(" http://localhost:8080 ").unwrap();

        assert!(validate_admission_url("admission.example.com").is_err());
        assert!(validate_admission_url("ftp://admission.example.com").is_err());
        assert!(validate_admission_url("file:///etc/passwd").is_err());
        assert!(validate_admission_url("").is_err());
    }
}
