//! Opening URLs in the user's browser.

use std::process::{Command, Stdio};

use crate::error::{AuthError, Result};

/// Something that can show a URL to the user in a browser.
pub trait BrowserLauncher: Send + Sync {
    /// Open `url`. Failure is reported, never fatal to the calling flow.
    fn open(&self, url: &str) -> Result<()>;

    /// Whether launching should be skipped entirely.
    fn is_headless(&self) -> bool {
        false
    }
}

/// Launches the platform's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        let safe_url = validate_browser_url(url)?;
        tracing::debug!(url = %safe_url, "Opening browser");
        spawn_opener(&safe_url)
    }

    fn is_headless(&self) -> bool {
        is_headless_environment()
    }
}

/// Only plain http(s) URLs without credentials or shell metacharacters are opened.
fn validate_browser_url(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)
        .map_err(|e| AuthError::InvalidConfig(format!("invalid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AuthError::InvalidConfig(format!(
                "refusing to open URL with scheme '{scheme}'"
            )));
        }
    }

    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(AuthError::InvalidConfig(
            "refusing to open URL with embedded credentials".to_string(),
        ));
    }

    const DANGEROUS_CHARS: &[char] = &['`', '$', '|', ';', '<', '>', '\n', '\r'];
    if url.chars().any(|c| DANGEROUS_CHARS.contains(&c)) {
        return Err(AuthError::InvalidConfig(
            "URL contains shell metacharacters".to_string(),
        ));
    }

    Ok(parsed.to_string())
}

fn spawn_opener(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    let mut command = {
        let mut c = Command::new("open");
        c.arg("--").arg(url);
        c
    };

    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", "", url]);
        c
    };

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = {
        let mut c = Command::new("xdg-open");
        c.arg(url);
        c
    };

    command
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(AuthError::Io)
}

/// No display or browser is reachable: SSH without forwarding, containers or CI.
pub fn is_headless_environment() -> bool {
    headless_from(
        |name| std::env::var_os(name).is_some(),
        std::path::Path::new("/.dockerenv").exists(),
        cfg!(target_os = "linux"),
    )
}

fn headless_from(is_set: impl Fn(&str) -> bool, in_container: bool, linux: bool) -> bool {
    let has_display = is_set("DISPLAY");

    if (is_set("SSH_CLIENT") || is_set("SSH_TTY")) && !has_display {
        return true;
    }
    if linux && !has_display && !is_set("WAYLAND_DISPLAY") {
        return true;
    }
    in_container || is_set("CI") || is_set("GITHUB_ACTIONS")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn vars(set: &'static [&'static str]) -> impl Fn(&str) -> bool {
        move |name| set.contains(&name)
    }

    #[test]
    fn test_headless_detection() {
        assert!(headless_from(vars(&["SSH_TTY"]), false, false));
        assert!(!headless_from(vars(&["SSH_TTY", "DISPLAY"]), false, true));
        assert!(headless_from(vars(&[]), false, true));
        assert!(!headless_from(vars(&["WAYLAND_DISPLAY"]), false, true));
        assert!(headless_from(vars(&["DISPLAY"]), true, true));
        assert!(headless_from(vars(&["DISPLAY", "CI"]), false, true));
        assert!(!headless_from(vars(&[]), false, false));
    }

    #[test]
    fn test_url_validation() {
        assert!(validate_browser_url("https://auth.nucleuscloud.com/activate?user_code=AB-CD").is_ok());
        assert_matches!(
            validate_browser_url("file:///etc/passwd"),
            Err(AuthError::InvalidConfig(_))
        );
        assert_matches!(
            validate_browser_url("https://user:pw@example.com"),
            Err(AuthError::InvalidConfig(_))
        );
        assert_matches!(
            validate_browser_url("https://example.com/$(rm)"),
            Err(AuthError::InvalidConfig(_))
        );
    }
}
