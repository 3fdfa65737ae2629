//! Error types for secret sealing and manifest updates.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecretError {
    /// The supplied public key is not an RSA key.
    #[error("Key type is not RSA: {0}")]
    UnsupportedKeyType(String),

    /// The public key bytes are not a DER SubjectPublicKeyInfo.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// The plaintext exceeds what one OAEP block can carry.
    #[error("Secret is {len} bytes, but this key can seal at most {max} bytes")]
    PlaintextTooLong { len: usize, max: usize },

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Service names must start with a lowercase letter.
    #[error("Invalid service name '{0}': must match ^[a-z][a-z1-9-]*$")]
    InvalidServiceName(String),

    /// The manifest is missing or has an unexpected shape.
    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for SecretError {
    fn from(err: serde_yaml::Error) -> Self {
        SecretError::Manifest(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SecretError>;
