//! Credential file storage.
//!
//! The credential lives in a single YAML file beneath the per-user config
//! directory. Writes go through a temp file and rename so a crash never leaves a
//! half-written record behind.

use std::path::{Path, PathBuf};

use crate::constants::{AUTH_FILE_NAME, CONFIG_DIR_ENV_VAR};
use crate::error::{AuthError, Result};
use crate::types::Credential;
use crate::utils::atomic_write;

/// Persists, loads and erases the [`Credential`] record.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Store rooted at `config_dir`; the directory is created on first save.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: config_dir.into().join(AUTH_FILE_NAME),
        }
    }

    /// Store at the default per-user location, creating the directory if needed.
    pub fn from_default_location() -> Result<Self> {
        let dir = default_config_dir()?;
        std::fs::create_dir_all(&dir)?;
        Ok(Self::new(dir))
    }

    /// Path of the credential file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored credential.
    ///
    /// Returns `Ok(None)` when no file exists or the record is empty.
    pub fn load(&self) -> Result<Option<Credential>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No credential file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        let credential: Credential = serde_yaml::from_str(&content).map_err(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Credential file is not a valid record");
            AuthError::CorruptCredentials(e.to_string())
        })?;

        if credential.is_empty() {
            return Ok(None);
        }
        Ok(Some(credential))
    }

    /// Save the credential, replacing any previous record atomically.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        let yaml = serde_yaml::to_string(credential)
            .map_err(|e| AuthError::Io(std::io::Error::other(e)))?;
        atomic_write(&self.path, yaml.as_bytes())?;
        tracing::debug!(
            path = %self.path.display(),
            has_refresh_token = credential.refresh_token.is_some(),
            has_id_token = credential.id_token.is_some(),
            "Credential saved"
        );
        Ok(())
    }

    /// Remove the credential file. Clearing an absent file is not an error.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Credential file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Resolve the per-user config directory from the process environment.
pub fn default_config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AuthError::InvalidConfig("could not determine home directory".into()))?;
    Ok(resolve_config_dir(
        std::env::var(CONFIG_DIR_ENV_VAR).ok().as_deref(),
        std::env::var("XDG_CONFIG_HOME").ok().as_deref(),
        &home,
        cfg!(any(
            target_os = "linux",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd"
        )),
    ))
}

/// Config directory precedence:
/// 1. `NUCLEUS_CONFIG_DIR` (with `~/` expansion)
/// 2. `$XDG_CONFIG_HOME/nucleus`
/// 3. `~/.config/nucleus` on Linux and the BSDs
/// 4. `~/.nucleus`
pub fn resolve_config_dir(
    config_dir: Option<&str>,
    xdg_config_home: Option<&str>,
    home: &Path,
    xdg_platform: bool,
) -> PathBuf {
    if let Some(dir) = config_dir.filter(|d| !d.is_empty()) {
        return match dir.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => PathBuf::from(dir),
        };
    }

    match xdg_config_home.filter(|d| !d.is_empty()) {
        Some(xdg) => PathBuf::from(xdg).join("nucleus"),
        None if xdg_platform => home.join(".config").join("nucleus"),
        None => home.join(".nucleus"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn store() -> (tempfile::TempDir, TokenStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("nucleus"));
        (dir, store)
    }

    #[test]
    fn test_round_trip_full_credential() {
        let (_dir, store) = store();
        let cred = Credential::new(
            "access",
            Some("refresh".to_string()),
            Some("id".to_string()),
        );
        store.save(&cred).unwrap();
        assert_eq!(store.load().unwrap(), Some(cred));
    }

    #[test]
    fn test_round_trip_access_only_credential() {
        let (_dir, store) = store();
        let cred = Credential::access_only("access");
        store.save(&cred).unwrap();
        assert_eq!(store.load().unwrap(), Some(cred));
    }

    #[test]
    fn test_load_missing_returns_none() {
        let (_dir, store) = store();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_clear_then_load_is_none_and_clear_is_idempotent() {
        let (_dir, store) = store();
        store.save(&Credential::access_only("access")).unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn test_empty_file_means_logged_out() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "").unwrap();
        assert_eq!(store.load().unwrap(), None);

        std::fs::write(store.path(), "accessToken: \"\"\n").unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "- not\n- a\n- record\n").unwrap();
        assert_matches!(store.load(), Err(AuthError::CorruptCredentials(_)));
    }

    #[test]
    fn test_file_uses_camel_case_keys() {
        let (_dir, store) = store();
        store
            .save(&Credential::new("a", Some("r".to_string()), None))
            .unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("accessToken: a"));
        assert!(raw.contains("refreshToken: r"));
        assert!(!raw.contains("idToken"));
    }

    #[test]
    fn test_config_dir_precedence() {
        let home = Path::new("/home/op");
        assert_eq!(
            resolve_config_dir(Some("~/custom"), Some("/xdg"), home, true),
            PathBuf::from("/home/op/custom")
        );
        assert_eq!(
            resolve_config_dir(Some("/abs/dir"), None, home, false),
            PathBuf::from("/abs/dir")
        );
        assert_eq!(
            resolve_config_dir(None, Some("/xdg"), home, false),
            PathBuf::from("/xdg/nucleus")
        );
        assert_eq!(
            resolve_config_dir(None, None, home, true),
            PathBuf::from("/home/op/.config/nucleus")
        );
        assert_eq!(
            resolve_config_dir(Some(""), None, home, false),
            PathBuf::from("/home/op/.nucleus")
        );
    }
}
