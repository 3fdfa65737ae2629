//! Nucleus Secrets - sealing of service secrets for the Nucleus CLI.
//!
//! Secret values are encrypted client-side with RSA-OAEP (SHA-256) under a public key
//! served per environment and service, then stored as base64 ciphertext in the
//! manifest's `spec.secrets` block. Nothing here ever decrypts.

pub mod cipher;
pub mod error;
pub mod manifest;

pub use cipher::{SecretCipher, encrypt};
pub use error::{Result, SecretError};
pub use manifest::{MANIFEST_FILE, SecretRecord, ServiceManifest, validate_service_name};
