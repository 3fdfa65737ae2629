//! Local HTTP listener for the browser login redirect.
//!
//! The listener serves a single route, delivers the first redirect it receives as a
//! [`CallbackResult`] and is shut down once that result, a timeout or a cancellation
//! arrives.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::Query;
use axum::response::Html;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::{AuthError, Result};
use crate::types::CallbackResult;

/// How long teardown waits for in-flight responses to flush.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Nucleus CLI</title></head>
<body>
    <h1>Authentication complete!</h1>
    <p>You can close this window and return to the terminal.</p>
    <script>window.close();</script>
</body>
</html>"#;

const ERROR_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Nucleus CLI - Error</title></head>
<body>
    <h1>Authentication Failed</h1>
    <p>Please check the terminal for details and try again.</p>
</body>
</html>"#;

type ResultSender = Arc<Mutex<Option<oneshot::Sender<CallbackResult>>>>;

/// A bound, not yet serving, redirect listener.
pub struct CallbackListener {
    listener: TcpListener,
    path: String,
    redirect_uri: String,
}

impl CallbackListener {
    /// Bind `host_port` (port 0 picks a free port) and prepare the route at `path`.
    pub async fn bind(host_port: &str, path: &str) -> Result<Self> {
        let listener = TcpListener::bind(host_port).await.map_err(|e| {
            tracing::error!(address = %host_port, error = %e, "Failed to bind callback listener");
            AuthError::Io(e)
        })?;
        let port = listener.local_addr()?.port();
        let host = host_port
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(host_port);
        let redirect_uri = format!("http://{host}:{port}{path}");
        tracing::debug!(redirect_uri = %redirect_uri, "Callback listener bound");

        Ok(Self {
            listener,
            path: path.to_string(),
            redirect_uri,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The redirect URI to register on the authorize URL.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Serve until the first redirect arrives, then tear the listener down.
    ///
    /// `timeout` of `None` waits until `cancel` fires.
    pub async fn wait(
        self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<CallbackResult> {
        let Self { listener, path, .. } = self;
        let (tx, rx) = oneshot::channel::<CallbackResult>();
        let tx: ResultSender = Arc::new(Mutex::new(Some(tx)));

        let app = Router::new().route(
            &path,
            get(move |Query(params): Query<HashMap<String, String>>| {
                let tx = tx.clone();
                async move { handle_callback(params, tx).await }
            }),
        );

        let shutdown = CancellationToken::new();
        let server_shutdown = shutdown.clone();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                .await
        });

        let deadline = async {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        let outcome = tokio::select! {
            result = rx => result.map_err(|_| {
                AuthError::ProtocolError("callback handler dropped".to_string())
            }),
            _ = cancel.cancelled() => Err(AuthError::Cancelled),
            _ = deadline => Err(AuthError::Timeout(format!(
                "no browser redirect received within {} seconds",
                timeout.map(|d| d.as_secs()).unwrap_or_default()
            ))),
        };

        shutdown.cancel();
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
            Ok(Ok(Ok(()))) => tracing::debug!("Callback listener shut down"),
            Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Callback listener error"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Callback listener task failed"),
            Err(_) => {
                tracing::debug!("Callback listener shutdown timed out, aborting");
                server.abort();
            }
        }

        outcome
    }
}

async fn handle_callback(params: HashMap<String, String>, tx: ResultSender) -> Html<&'static str> {
    let result = classify(&params);
    let page = match &result {
        CallbackResult::Authorized { .. } => SUCCESS_HTML,
        CallbackResult::ProviderError { error, description } => {
            tracing::error!(error = %error, description = %description, "OAuth provider returned an error");
            ERROR_HTML
        }
        CallbackResult::Malformed(reason) => {
            tracing::error!(reason = %reason, "Malformed OAuth callback");
            ERROR_HTML
        }
    };

    match tx.lock().await.take() {
        Some(tx) => {
            let _ = tx.send(result);
        }
        None => tracing::debug!("Ignoring repeated callback request"),
    }

    Html(page)
}

fn classify(params: &HashMap<String, String>) -> CallbackResult {
    let error = params.get("error").filter(|v| !v.is_empty());
    let description = params.get("error_description").filter(|v| !v.is_empty());
    if error.is_some() || description.is_some() {
        return CallbackResult::ProviderError {
            error: error.cloned().unwrap_or_else(|| "unknown_error".to_string()),
            description: description.cloned().unwrap_or_default(),
        };
    }

    let code = params.get("code").filter(|v| !v.is_empty());
    let state = params.get("state").filter(|v| !v.is_empty());
    match (code, state) {
        (Some(code), Some(state)) => CallbackResult::Authorized {
            code: code.clone(),
            state: state.clone(),
        },
        (None, _) => CallbackResult::Malformed("missing 'code' parameter".to_string()),
        (_, None) => CallbackResult::Malformed("missing 'state' parameter".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    async fn start(timeout: Option<Duration>) -> (String, tokio::task::JoinHandle<Result<CallbackResult>>) {
        let listener = CallbackListener::bind("127.0.0.1:0", "/api/auth/callback")
            .await
            .unwrap();
        let uri = listener.redirect_uri().to_string();
        let handle =
            tokio::spawn(async move { listener.wait(timeout, &CancellationToken::new()).await });
        (uri, handle)
    }

    #[test]
    fn test_classify_cases() {
        let params = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>()
        };

        assert_eq!(
            classify(&params(&[("code", "c"), ("state", "s")])),
            CallbackResult::Authorized {
                code: "c".to_string(),
                state: "s".to_string()
            }
        );
        assert_eq!(
            classify(&params(&[("error", "access_denied"), ("error_description", "nope"), ("code", "c")])),
            CallbackResult::ProviderError {
                error: "access_denied".to_string(),
                description: "nope".to_string()
            }
        );
        assert_matches!(classify(&params(&[("state", "s")])), CallbackResult::Malformed(_));
        assert_matches!(classify(&params(&[("code", "c")])), CallbackResult::Malformed(_));
    }

    #[tokio::test]
    async fn test_redirect_delivers_code_and_state() {
        let (uri, handle) = start(Some(Duration::from_secs(10))).await;
        let response = reqwest::get(format!("{uri}?code=abc&state=xyz")).await.unwrap();
        assert!(response.status().is_success());
        assert!(response.text().await.unwrap().contains("Authentication complete"));

        assert_eq!(
            handle.await.unwrap().unwrap(),
            CallbackResult::Authorized {
                code: "abc".to_string(),
                state: "xyz".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_provider_error_is_delivered() {
        let (uri, handle) = start(Some(Duration::from_secs(10))).await;
        let response = reqwest::get(format!("{uri}?error=access_denied&error_description=denied"))
            .await
            .unwrap();
        assert!(response.text().await.unwrap().contains("Authentication Failed"));

        assert_matches!(
            handle.await.unwrap().unwrap(),
            CallbackResult::ProviderError { error, .. } if error == "access_denied"
        );
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let (_uri, handle) = start(Some(Duration::from_millis(50))).await;
        assert_matches!(handle.await.unwrap(), Err(AuthError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_wait_honors_cancellation() {
        let listener = CallbackListener::bind("127.0.0.1:0", "/api/auth/callback")
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_matches!(listener.wait(None, &cancel).await, Err(AuthError::Cancelled));
    }

    #[tokio::test]
    async fn test_listener_is_torn_down_after_delivery() {
        let (uri, handle) = start(Some(Duration::from_secs(10))).await;
        reqwest::get(format!("{uri}?code=abc&state=xyz")).await.unwrap();
        handle.await.unwrap().unwrap();

        let client = reqwest::Client::builder().pool_max_idle_per_host(0).build().unwrap();
        assert!(client.get(format!("{uri}?code=again&state=xyz")).send().await.is_err());
    }
}
