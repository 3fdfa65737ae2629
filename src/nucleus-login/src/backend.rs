//! Client seam for the Nucleus management API.
//!
//! Calls that act on behalf of the user carry `authorization: bearer <token>`.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::env::NucleusEnv;
use crate::error::{AuthError, Result};
use crate::types::Credential;
use crate::utils::http_client;

/// Operations the login layer and the CLI need from the management API.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Exchange a refresh token issued to `client_id` through the backend.
    async fn refresh_access_token(&self, client_id: &str, refresh_token: &str)
    -> Result<Credential>;

    /// Bind the authenticated identity to its Nucleus account. Returns the user id.
    async fn set_user(&self, access_token: &str) -> Result<String>;

    /// Exchange service-account client credentials for an access token.
    async fn service_account_token(&self, client_id: &str, client_secret: &str) -> Result<String>;

    /// Confirm the service account behind `access_token` belongs to an account.
    async fn verify_service_account(&self, access_token: &str) -> Result<()>;

    /// DER-encoded public key used to seal secrets for `service_name` in `environment`.
    async fn get_public_secret_key(
        &self,
        access_token: &str,
        environment: &str,
        service_name: &str,
    ) -> Result<Vec<u8>>;

    /// Point `environment` at the admission API hosted at `url`.
    async fn set_admission_api_link(
        &self,
        access_token: &str,
        environment: &str,
        url: &str,
    ) -> Result<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    client_id: &'a str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshReply {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetUserReply {
    user_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceAccountRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceAccountReply {
    access_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyRequest<'a> {
    environment_name: &'a str,
    service_name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyReply {
    /// Base64 of the DER SubjectPublicKeyInfo.
    public_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdmissionLinkRequest<'a> {
    environment_type: &'a str,
    admission_api_url: &'a str,
}

/// JSON-over-HTTP implementation of [`Backend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Client for `env`'s management API.
    pub fn for_env(env: NucleusEnv) -> Result<Self> {
        let config = env.connection_config();
        Self::new(&config.api_url, env.requires_tls(), http_client()?)
    }

    /// Client for `base_url`; plain http is refused when `require_tls` is set.
    pub fn new(base_url: &str, require_tls: bool, client: Client) -> Result<Self> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| AuthError::InvalidConfig(format!("invalid API URL '{base_url}': {e}")))?;
        if require_tls && parsed.scheme() != "https" {
            return Err(AuthError::InvalidConfig(format!(
                "API URL must use https outside the dev environment: {base_url}"
            )));
        }
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(format!("{}{path}", self.base_url))
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(path = %path, status = %status, "Nucleus API request failed");
            return Err(AuthError::Backend(format!("{path} returned {status}: {}", body.trim())));
        }
        Ok(response)
    }

    async fn call<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> Result<T> {
        self.send(path, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| AuthError::ProtocolError(format!("invalid reply from {path}: {e}")))
    }

    async fn call_empty(&self, path: &str, request: RequestBuilder) -> Result<()> {
        self.send(path, request).await.map(|_| ())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn refresh_access_token(
        &self,
        client_id: &str,
        refresh_token: &str,
    ) -> Result<Credential> {
        const PATH: &str = "/v1/auth/refresh";
        let reply: RefreshReply = self
            .call(
                PATH,
                self.post(PATH).json(&RefreshRequest {
                    client_id,
                    refresh_token,
                }),
            )
            .await?;
        if reply.access_token.is_empty() {
            return Err(AuthError::ProtocolError(
                "refresh reply without access token".to_string(),
            ));
        }
        Ok(Credential::new(reply.access_token, reply.refresh_token, reply.id_token))
    }

    async fn set_user(&self, access_token: &str) -> Result<String> {
        const PATH: &str = "/v1/users/set";
        let reply: SetUserReply = self
            .call(
                PATH,
                self.post(PATH)
                    .bearer_auth(access_token)
                    .json(&serde_json::json!({})),
            )
            .await?;
        tracing::debug!(user_id = %reply.user_id, "User bound to account");
        Ok(reply.user_id)
    }

    async fn service_account_token(&self, client_id: &str, client_secret: &str) -> Result<String> {
        const PATH: &str = "/v1/auth/service-account/token";
        let reply: ServiceAccountReply = self
            .call(
                PATH,
                self.post(PATH).json(&ServiceAccountRequest {
                    client_id,
                    client_secret,
                }),
            )
            .await?;
        Ok(reply.access_token)
    }

    async fn verify_service_account(&self, access_token: &str) -> Result<()> {
        const PATH: &str = "/v1/accounts/by-service-account";
        self.call_empty(
            PATH,
            self.post(PATH)
                .bearer_auth(access_token)
                .json(&serde_json::json!({})),
        )
        .await
    }

    async fn get_public_secret_key(
        &self,
        access_token: &str,
        environment: &str,
        service_name: &str,
    ) -> Result<Vec<u8>> {
        const PATH: &str = "/v1/secrets/public-key";
        let reply: PublicKeyReply = self
            .call(
                PATH,
                self.post(PATH).bearer_auth(access_token).json(&PublicKeyRequest {
                    environment_name: environment,
                    service_name,
                }),
            )
            .await?;
        STANDARD
            .decode(reply.public_key.trim())
            .map_err(|e| AuthError::ProtocolError(format!("public key is not base64: {e}")))
    }

    async fn set_admission_api_link(
        &self,
        access_token: &str,
        environment: &str,
        url: &str,
    ) -> Result<()> {
        const PATH: &str = "/v1/environments/admission-api-link";
        self.call_empty(
            PATH,
            self.post(PATH)
                .bearer_auth(access_token)
                .json(&AdmissionLinkRequest {
                    environment_type: environment,
                    admission_api_url: url,
                }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> HttpBackend {
        HttpBackend::new(&server.uri(), false, Client::new()).unwrap()
    }

    #[test]
    fn test_tls_required_outside_dev() {
        assert_matches!(
            HttpBackend::new("http://mgmt.example.com", true, Client::new()),
            Err(AuthError::InvalidConfig(_))
        );
        assert!(HttpBackend::new("https://mgmt.example.com/", true, Client::new()).is_ok());
        assert!(HttpBackend::new("http://localhost:50051", false, Client::new()).is_ok());
    }

    #[tokio::test]
    async fn test_refresh_maps_reply_to_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/refresh"))
            .and(body_json(serde_json::json!({
                "clientId": "client-123",
                "refreshToken": "r-1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "accessToken": "a-2",
                "refreshToken": "",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = backend(&server)
            .refresh_access_token("client-123", "r-1")
            .await
            .unwrap();
        assert_eq!(credential.access_token, "a-2");
        assert_eq!(credential.refresh_token, None);
    }

    #[tokio::test]
    async fn test_set_user_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/users/set"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"userId": "user-9"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(backend(&server).set_user("access-1").await.unwrap(), "user-9");
    }

    #[tokio::test]
    async fn test_public_key_is_base64_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/secrets/public-key"))
            .and(body_json(serde_json::json!({
                "environmentName": "stage",
                "serviceName": "billing",
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"publicKey": STANDARD.encode([1u8, 2, 3])})),
            )
            .mount(&server)
            .await;

        let key = backend(&server)
            .get_public_secret_key("access-1", "stage", "billing")
            .await
            .unwrap();
        assert_eq!(key, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_rejection_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/environments/admission-api-link"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let result = backend(&server)
            .set_admission_api_link("access-1", "prod", "https://admission.example.com")
            .await;
        assert_matches!(result, Err(AuthError::Backend(message)) if message.contains("403"));
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory [`Backend`] that records calls.

    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct FakeBackend {
        pub refresh_reply: Mutex<Option<Result<Credential>>>,
        pub refresh_calls: AtomicUsize,
        pub refresh_client_ids: Mutex<Vec<String>>,
        pub set_user_calls: Mutex<Vec<String>>,
        pub service_account_token: Option<String>,
    }

    impl FakeBackend {
        pub fn refreshing_to(credential: Credential) -> Self {
            Self {
                refresh_reply: Mutex::new(Some(Ok(credential))),
                ..Self::default()
            }
        }

        pub fn failing_refresh() -> Self {
            Self {
                refresh_reply: Mutex::new(Some(Err(AuthError::Backend(
                    "refresh token revoked".to_string(),
                )))),
                ..Self::default()
            }
        }

        pub fn refresh_calls(&self) -> usize {
            self.refresh_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn refresh_access_token(
            &self,
            client_id: &str,
            _refresh_token: &str,
        ) -> Result<Credential> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.refresh_client_ids
                .lock()
                .unwrap()
                .push(client_id.to_string());
            self.refresh_reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(AuthError::Backend("no refresh reply".to_string())))
        }

        async fn set_user(&self, access_token: &str) -> Result<String> {
            self.set_user_calls
                .lock()
                .unwrap()
                .push(access_token.to_string());
            Ok("user-1".to_string())
        }

        async fn service_account_token(&self, _client_id: &str, _secret: &str) -> Result<String> {
            self.service_account_token
                .clone()
                .ok_or_else(|| AuthError::Backend("unknown client".to_string()))
        }

        async fn verify_service_account(&self, _access_token: &str) -> Result<()> {
            Ok(())
        }

        async fn get_public_secret_key(&self, _: &str, _: &str, _: &str) -> Result<Vec<u8>> {
            Err(AuthError::Backend("not used".to_string()))
        }

        async fn set_admission_api_link(&self, _: &str, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
    }
}
