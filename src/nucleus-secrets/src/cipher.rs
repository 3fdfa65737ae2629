//! RSA-OAEP (SHA-256) sealing of secret values.
//!
//! Ciphertext is opaque to the CLI: it is produced here, base64-encoded and written
//! to the manifest, and only the platform holding the private key ever opens it.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rsa::pkcs1::ALGORITHM_OID as RSA_ENCRYPTION_OID;
use rsa::pkcs8::DecodePublicKey;
use rsa::pkcs8::der::Decode;
use rsa::pkcs8::spki::SubjectPublicKeyInfoRef;
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;

use crate::error::{Result, SecretError};

/// OAEP overhead for SHA-256: two digests plus two bytes.
const OAEP_SHA256_OVERHEAD: usize = 2 * 32 + 2;

/// Seals secret values under one environment's public key.
#[derive(Debug, Clone)]
pub struct SecretCipher {
    key: RsaPublicKey,
}

impl SecretCipher {
    /// Parse a DER SubjectPublicKeyInfo, rejecting anything but RSA.
    pub fn from_der(public_key_der: &[u8]) -> Result<Self> {
        let spki = SubjectPublicKeyInfoRef::from_der(public_key_der)
            .map_err(|e| SecretError::InvalidPublicKey(e.to_string()))?;
        if spki.algorithm.oid != RSA_ENCRYPTION_OID {
            return Err(SecretError::UnsupportedKeyType(format!(
                "algorithm {}",
                spki.algorithm.oid
            )));
        }

        let key = RsaPublicKey::from_public_key_der(public_key_der)
            .map_err(|e| SecretError::InvalidPublicKey(e.to_string()))?;
        tracing::debug!(modulus_bits = key.size() * 8, "Loaded secret sealing key");
        Ok(Self { key })
    }

    /// Largest plaintext one OAEP block can carry under this key.
    pub fn max_plaintext_len(&self) -> usize {
        self.key.size().saturating_sub(OAEP_SHA256_OVERHEAD)
    }

    /// Fail early when `plaintext` will not fit.
    pub fn check_plaintext_len(&self, plaintext: &[u8]) -> Result<()> {
        let max = self.max_plaintext_len();
        if plaintext.len() > max {
            return Err(SecretError::PlaintextTooLong {
                len: plaintext.len(),
                max,
            });
        }
        Ok(())
    }

    /// Seal `plaintext`. OAEP is randomized, so sealing twice never repeats.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let ciphertext = self
            .key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| SecretError::Encryption(e.to_string()))?;
        Ok(STANDARD.encode(ciphertext))
    }
}

/// Seal `secret_value` under the DER-encoded `public_key_der`.
pub fn encrypt(secret_value: &str, public_key_der: &[u8]) -> Result<String> {
    SecretCipher::from_der(public_key_der)?.encrypt(secret_value.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::EncodePublicKey;

    fn keypair() -> (RsaPrivateKey, Vec<u8>) {
        let private = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let der = private
            .to_public_key()
            .to_public_key_der()
            .unwrap()
            .as_bytes()
            .to_vec();
        (private, der)
    }

    fn open(private: &RsaPrivateKey, sealed: &str) -> String {
        let bytes = STANDARD.decode(sealed).unwrap();
        String::from_utf8(private.decrypt(Oaep::new::<Sha256>(), &bytes).unwrap()).unwrap()
    }

    #[test]
    fn test_sealing_is_randomized_and_opens() {
        let (private, der) = keypair();
        let first = encrypt("hello", &der).unwrap();
        let second = encrypt("hello", &der).unwrap();

        assert_ne!(first, second);
        assert_eq!(open(&private, &first), "hello");
        assert_eq!(open(&private, &second), "hello");
    }

    #[test]
    fn test_non_rsa_key_is_rejected() {
        let ed25519 = hex::decode(format!("302a300506032b6570032100{}", "11".repeat(32))).unwrap();
        assert_matches!(encrypt("hello", &ed25519), Err(SecretError::UnsupportedKeyType(_)));
    }

    #[test]
    fn test_garbage_key_is_invalid() {
        assert_matches!(
            SecretCipher::from_der(b"not a key"),
            Err(SecretError::InvalidPublicKey(_))
        );
    }

    #[test]
    fn test_plaintext_bound() {
        let (_private, der) = keypair();
        let cipher = SecretCipher::from_der(&der).unwrap();
        assert_eq!(cipher.max_plaintext_len(), 128 - 66);

        let fits = vec![b'a'; cipher.max_plaintext_len()];
        cipher.check_plaintext_len(&fits).unwrap();
        assert!(cipher.encrypt(&fits).is_ok());

        let too_long = vec![b'a'; cipher.max_plaintext_len() + 1];
        assert_matches!(
            cipher.check_plaintext_len(&too_long),
            Err(SecretError::PlaintextTooLong { len: 63, max: 62 })
        );
    }
}
