//! Access token validation against the identity provider's published signing keys.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::constants::{JWKS_CACHE_TTL, TOKEN_LEEWAY_SECS};
use crate::error::{AuthError, Result};

/// Claims read from a validated access token.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessClaims {
    #[serde(default)]
    pub sub: Option<String>,
    pub exp: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Clone)]
struct CachedJwks {
    jwks: JwkSet,
    expires_at: Instant,
}

/// Validates RS256 access tokens, caching the JWKS for a fixed TTL.
#[derive(Clone)]
pub struct JwksValidator {
    jwks_url: String,
    issuer: String,
    audience: String,
    cache_ttl: Duration,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    client: reqwest::Client,
}

impl JwksValidator {
    /// Validator for tokens issued by `tenant_url` for `audience`.
    pub fn new(tenant_url: &str, audience: &str, client: reqwest::Client) -> Self {
        let tenant = tenant_url.trim_end_matches('/');
        Self {
            jwks_url: format!("{tenant}/.well-known/jwks.json"),
            issuer: format!("{tenant}/"),
            audience: audience.to_string(),
            cache_ttl: JWKS_CACHE_TTL,
            cache: Arc::new(RwLock::new(None)),
            client,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    async fn fetch_jwks(&self) -> Result<JwkSet> {
        tracing::debug!(url = %self.jwks_url, "Fetching JWKS");
        let response = self.client.get(&self.jwks_url).send().await?;
        if !response.status().is_success() {
            return Err(AuthError::Transport(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }
        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::ProtocolError(format!("invalid JWKS document: {e}")))
    }

    /// Return the cached key set, fetching when the cache is empty, stale or `force`d.
    async fn get_jwks(&self, force: bool) -> Result<JwkSet> {
        if !force {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.jwks.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        if !force {
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.jwks.clone());
                }
            }
        }

        let jwks = self.fetch_jwks().await?;
        *cache = Some(CachedJwks {
            jwks: jwks.clone(),
            expires_at: Instant::now() + self.cache_ttl,
        });
        Ok(jwks)
    }

    fn decoding_key(jwks: &JwkSet, kid: &str) -> Option<Result<DecodingKey>> {
        let jwk = jwks.find(kid)?;
        Some(match &jwk.algorithm {
            AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|e| AuthError::InvalidToken(format!("invalid signing key: {e}"))),
            _ => Err(AuthError::InvalidToken(
                "signing key is not an RSA key".to_string(),
            )),
        })
    }

    /// Check signature, issuer, audience and expiry.
    ///
    /// Any failed check is reported as [`AuthError::InvalidToken`]; failing to fetch
    /// the key set is a transport error.
    pub async fn validate(&self, token: &str) -> Result<AccessClaims> {
        let header =
            decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken(format!(
                "unexpected signing algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("token missing 'kid' header".to_string()))?;

        // An unknown kid may mean the provider rotated keys; refetch once.
        let key = match Self::decoding_key(&self.get_jwks(false).await?, &kid) {
            Some(key) => key?,
            None => {
                tracing::debug!(kid = %kid, "Signing key not in cached JWKS, refetching");
                Self::decoding_key(&self.get_jwks(true).await?, &kid).ok_or_else(|| {
                    AuthError::InvalidToken("no matching key found in JWKS".to_string())
                })??
            }
        };

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = true;
        validation.leeway = TOKEN_LEEWAY_SECS;

        let data = decode::<AccessClaims>(token, &key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(data.claims)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{AUDIENCE, KID, SigningKey};
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(key: &SigningKey, expected_fetches: u64) -> (MockServer, JwksValidator) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(key.jwks(KID)))
            .expect(expected_fetches)
            .mount(&server)
            .await;
        let validator = JwksValidator::new(&server.uri(), AUDIENCE, reqwest::Client::new());
        (server, validator)
    }

    #[tokio::test]
    async fn test_valid_token_passes_and_jwks_is_cached() {
        let key = SigningKey::generate();
        let (server, validator) = setup(&key, 1).await;
        let token = key.sign(KID, &format!("{}/", server.uri()), AUDIENCE, 3600);

        let claims = validator.validate(&token).await.unwrap();
        assert_eq!(claims.sub.as_deref(), Some("auth0|operator"));
        validator.validate(&token).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_token_is_invalid() {
        let key = SigningKey::generate();
        let (server, validator) = setup(&key, 1).await;
        let token = key.sign(KID, &format!("{}/", server.uri()), AUDIENCE, -3600);

        assert_matches!(validator.validate(&token).await, Err(AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_wrong_audience_and_issuer_are_invalid() {
        let key = SigningKey::generate();
        let (server, validator) = setup(&key, 1).await;
        let issuer = format!("{}/", server.uri());

        let wrong_aud = key.sign(KID, &issuer, "https://someone-else", 3600);
        assert_matches!(validator.validate(&wrong_aud).await, Err(AuthError::InvalidToken(_)));

        let wrong_iss = key.sign(KID, "https://evil.example.com/", AUDIENCE, 3600);
        assert_matches!(validator.validate(&wrong_iss).await, Err(AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_foreign_signature_is_invalid() {
        let key = SigningKey::generate();
        let other = SigningKey::generate();
        let (server, validator) = setup(&key, 1).await;
        let forged = other.sign(KID, &format!("{}/", server.uri()), AUDIENCE, 3600);

        assert_matches!(validator.validate(&forged).await, Err(AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_unknown_kid_refetches_once() {
        let key = SigningKey::generate();
        let (server, validator) = setup(&key, 2).await;
        let token = key.sign("rotated-away", &format!("{}/", server.uri()), AUDIENCE, 3600);

        assert_matches!(validator.validate(&token).await, Err(AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_garbage_token_is_invalid_without_fetching() {
        let key = SigningKey::generate();
        let (_server, validator) = setup(&key, 0).await;
        assert_matches!(
            validator.validate("not-a-jwt").await,
            Err(AuthError::InvalidToken(_))
        );
    }
}
