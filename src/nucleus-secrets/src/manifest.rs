//! The `spec.secrets` block of the service manifest (`nucleus.yaml`).
//!
//! The manifest is edited by hand, so it is handled as a YAML document and only the
//! secrets block is touched; every other field round-trips unchanged.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Value};

use crate::error::{Result, SecretError};

/// Manifest file name, looked up in the working directory.
pub const MANIFEST_FILE: &str = "nucleus.yaml";

/// Environment name to secret name to base64 ciphertext.
pub type SecretRecord = BTreeMap<String, BTreeMap<String, String>>;

static SERVICE_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z1-9-]*$").expect("Invalid service name regex"));

/// Check a service name before any secret operation refers to it.
pub fn validate_service_name(name: &str) -> Result<()> {
    if SERVICE_NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(SecretError::InvalidServiceName(name.to_string()))
    }
}

/// A loaded service manifest.
#[derive(Debug, Clone)]
pub struct ServiceManifest {
    path: PathBuf,
    document: Value,
}

impl ServiceManifest {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SecretError::Manifest(format!("no manifest found at {}", path.display()))
            } else {
                SecretError::Io(e)
            }
        })?;

        let document: Value = serde_yaml::from_str(&content)?;
        if !document.is_mapping() {
            return Err(SecretError::Manifest(
                "top level must be a mapping".to_string(),
            ));
        }
        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn spec(&self) -> Option<&Mapping> {
        self.document.get("spec").and_then(Value::as_mapping)
    }

    /// `spec.serviceName`.
    pub fn service_name(&self) -> Result<&str> {
        self.spec()
            .and_then(|spec| spec.get("serviceName"))
            .and_then(Value::as_str)
            .ok_or_else(|| SecretError::Manifest("spec.serviceName is not set".to_string()))
    }

    /// The current secrets block; empty when absent.
    pub fn secrets(&self) -> Result<SecretRecord> {
        match self.spec().and_then(|spec| spec.get("secrets")) {
            None | Some(Value::Null) => Ok(SecretRecord::new()),
            Some(value) => Ok(serde_yaml::from_value(value.clone())?),
        }
    }

    /// Insert or replace `spec.secrets[environment][name]`.
    pub fn set_secret(&mut self, environment: &str, name: &str, ciphertext: &str) -> Result<()> {
        if name.is_empty() {
            return Err(SecretError::Manifest("secret name must not be empty".to_string()));
        }
        let environment = environment.to_lowercase();

        let root = self
            .document
            .as_mapping_mut()
            .ok_or_else(|| SecretError::Manifest("top level must be a mapping".to_string()))?;
        let spec = child_mapping(root, "spec")?;
        let secrets = child_mapping(spec, "secrets")?;
        let env_secrets = child_mapping(secrets, &environment)?;
        let replaced = env_secrets
            .insert(Value::from(name), Value::from(ciphertext))
            .is_some();

        tracing::debug!(environment = %environment, secret = %name, replaced, "Secret stored in manifest");
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&self.document)?;
        std::fs::write(&self.path, yaml)?;
        Ok(())
    }
}

fn child_mapping<'a>(parent: &'a mut Mapping, key: &str) -> Result<&'a mut Mapping> {
    let value = parent.entry(Value::from(key)).or_insert(Value::Null);
    if value.is_null() {
        *value = Value::Mapping(Mapping::new());
    }
    value
        .as_mapping_mut()
        .ok_or_else(|| SecretError::Manifest(format!("'{key}' must be a mapping")))
}
