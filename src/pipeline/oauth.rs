//! OAuth2 installed-app flow for read-only Google Drive access.
//!
//! Token resolution, in order:
//!
//! 1. a cached token in `token.json` that has not expired;
//! 2. a refresh of that token when it carries a refresh token;
//! 3. an interactive consent flow: the user opens the printed URL, Google
//!    redirects the browser to a one-shot HTTP listener on `127.0.0.1`, and
//!    the authorization code is exchanged for tokens.
//!
//! Step 3 needs the OAuth client secrets (`credentials.json`, "Desktop app"
//! type) from the Google Cloud Console. Fresh tokens are written back to
//! `token.json`.

use crate::config::ConversionConfig;
use crate::error::Pdf2MdError;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// The only scope requested.
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens within this many seconds of expiry are treated as expired.
const EXPIRY_SKEW_SECS: u64 = 60;

/// OAuth client secrets for one Google Cloud OAuth client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Top level of a downloaded client secrets file.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

/// Cached credentials as stored in `token.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    /// The access token.
    pub token: String,
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Expiry as seconds since the Unix epoch, when known.
    #[serde(default)]
    pub expires_at: Option<u64>,
}

impl StoredToken {
    /// `true` when the access token can be used at `now` (Unix seconds).
    ///
    /// A token without a recorded expiry is never trusted.
    pub fn is_valid_at(&self, now: u64) -> bool {
        self.expires_at
            .is_some_and(|exp| exp > now.saturating_add(EXPIRY_SKEW_SECS))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
}

/// What the browser redirect carried back.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Redirect {
    Code { code: String, state: Option<String> },
    Denied(String),
}

/// Return an access token for the Drive API, running whichever of the
/// three resolution steps is needed.
pub async fn access_token(config: &ConversionConfig) -> Result<String, Pdf2MdError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.metadata_timeout_secs))
        .build()
        .map_err(|e| auth_failed(format!("could not build HTTP client: {e}")))?;

    if let Some(stored) = load_token(&config.token_file)? {
        if stored.is_valid_at(now_secs()) {
            debug!("Using cached token from {}", config.token_file.display());
            return Ok(stored.token);
        }
        if let Some(refresh) = stored.refresh_token.clone() {
            match refresh_token(&client, &stored, &refresh).await {
                Ok(fresh) => {
                    info!("Refreshed Google Drive access token");
                    save_token(&config.token_file, &fresh)?;
                    return Ok(fresh.token);
                }
                Err(e) => warn!("Token refresh failed, starting a new consent flow: {}", e),
            }
        }
    }

    let secrets = load_client_secrets(&config.credentials_file)?;
    let fresh = run_consent_flow(&client, &secrets, config.auth_timeout_secs).await?;
    save_token(&config.token_file, &fresh)?;
    info!("Saved Google Drive token to {}", config.token_file.display());
    Ok(fresh.token)
}

/// Load a cached token; `Ok(None)` when the file does not exist.
pub fn load_token(path: &Path) -> Result<Option<StoredToken>, Pdf2MdError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).map_err(|e| invalid(path, e))?;
    serde_json::from_str(&raw).map(Some).map_err(|e| invalid(path, e))
}

fn save_token(path: &Path, token: &StoredToken) -> Result<(), Pdf2MdError> {
    let json = serde_json::to_string_pretty(token)
        .map_err(|e| Pdf2MdError::Internal(format!("could not serialise token: {e}")))?;
    std::fs::write(path, json).map_err(|source| Pdf2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse the `installed` (or `web`) client from a client secrets file.
pub fn load_client_secrets(path: &Path) -> Result<ClientSecrets, Pdf2MdError> {
    if !path.exists() {
        return Err(Pdf2MdError::CredentialsMissing {
            path: path.to_path_buf(),
        });
    }
    let raw = std::fs::read_to_string(path).map_err(|e| invalid(path, e))?;
    parse_client_secrets(&raw).map_err(|detail| Pdf2MdError::InvalidCredentials {
        path: path.to_path_buf(),
        detail,
    })
}

fn parse_client_secrets(raw: &str) -> Result<ClientSecrets, String> {
    let file: ClientSecretsFile = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    file.installed
        .or(file.web)
        .ok_or_else(|| "expected an \"installed\" or \"web\" client".to_string())
}

async fn refresh_token(
    client: &Client,
    stored: &StoredToken,
    refresh: &str,
) -> Result<StoredToken, Pdf2MdError> {
    let response = post_token_request(
        client,
        &stored.token_uri,
        &[
            ("client_id", stored.client_id.as_str()),
            ("client_secret", stored.client_secret.as_str()),
            ("refresh_token", refresh),
            ("grant_type", "refresh_token"),
        ],
    )
    .await?;
    Ok(StoredToken {
        token: response.access_token,
        refresh_token: response.refresh_token.or_else(|| Some(refresh.to_string())),
        expires_at: response.expires_in.map(|s| now_secs() + s),
        ..stored.clone()
    })
}

async fn run_consent_flow(
    client: &Client,
    secrets: &ClientSecrets,
    timeout_secs: u64,
) -> Result<StoredToken, Pdf2MdError> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|e| auth_failed(format!("could not open local redirect listener: {e}")))?;
    let port = listener
        .local_addr()
        .map_err(|e| auth_failed(e.to_string()))?
        .port();
    let redirect_uri = format!("http://127.0.0.1:{port}/");
    let state = new_state();

    let auth_url = Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("scope", DRIVE_READONLY_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state.as_str()),
        ],
    )
    .map_err(|e| auth_failed(format!("invalid auth_uri {:?}: {e}", secrets.auth_uri)))?;

    // The user has to act on this, whatever the log level.
    eprintln!("Please visit this URL to authorize read-only access to Google Drive:\n\n  {auth_url}\n");
    info!("Waiting for the OAuth redirect on {}", redirect_uri);

    let code = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        wait_for_code(listener, state.clone()),
    )
    .await
    .map_err(|_| auth_failed(format!("no browser redirect within {timeout_secs}s")))??;

    let response = post_token_request(
        client,
        &secrets.token_uri,
        &[
            ("code", code.as_str()),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ],
    )
    .await?;

    Ok(StoredToken {
        token: response.access_token,
        refresh_token: response.refresh_token,
        token_uri: secrets.token_uri.clone(),
        client_id: secrets.client_id.clone(),
        client_secret: secrets.client_secret.clone(),
        scopes: vec![DRIVE_READONLY_SCOPE.to_string()],
        expires_at: response.expires_in.map(|s| now_secs() + s),
    })
}

async fn post_token_request(
    client: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, Pdf2MdError> {
    let response = client
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| auth_failed(format!("token endpoint unreachable: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(auth_failed(format!("token endpoint answered {status}: {}", body.trim())));
    }
    response
        .json()
        .await
        .map_err(|e| auth_failed(format!("unexpected token response: {e}")))
}

/// Unguessable value echoed back by the redirect.
fn new_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

type CodeSender = oneshot::Sender<Result<String, Pdf2MdError>>;

#[derive(Clone)]
struct RedirectState {
    expected_state: Arc<str>,
    result: Arc<Mutex<Option<CodeSender>>>,
}

impl RedirectState {
    fn deliver(&self, outcome: Result<String, Pdf2MdError>) {
        if let Some(tx) = self.result.lock().ok().and_then(|mut slot| slot.take()) {
            let _ = tx.send(outcome);
        }
    }
}

/// Serve `/` on `listener` until a request carries the authorization code
/// or an error, then shut the server down.
async fn wait_for_code(listener: TcpListener, expected_state: String) -> Result<String, Pdf2MdError> {
    let (result_tx, result_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app = Router::new()
        .route("/", get(redirect_handler))
        .with_state(RedirectState {
            expected_state: expected_state.into(),
            result: Arc::new(Mutex::new(Some(result_tx))),
        });

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = result_rx
        .await
        .unwrap_or_else(|_| Err(auth_failed("redirect listener stopped".to_string())));
    let _ = shutdown_tx.send(());
    match server.await {
        Ok(Err(e)) => debug!("redirect listener ended with error: {}", e),
        Err(e) => debug!("redirect listener task failed: {}", e),
        Ok(Ok(())) => {}
    }
    outcome
}

async fn redirect_handler(
    State(state): State<RedirectState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    match parse_redirect(&params) {
        Some(Redirect::Code { code, state: returned }) => {
            if returned.as_deref() != Some(&*state.expected_state) {
                state.deliver(Err(auth_failed("OAuth state mismatch in redirect".to_string())));
                return (StatusCode::BAD_REQUEST, "Authentication failed: state mismatch.");
            }
            state.deliver(Ok(code));
            (StatusCode::OK, "Authentication complete. You may close this window.")
        }
        Some(Redirect::Denied(reason)) => {
            state.deliver(Err(auth_failed(format!("authorization denied: {reason}"))));
            (StatusCode::OK, "Authorization was not granted. You may close this window.")
        }
        None => (StatusCode::BAD_REQUEST, "Missing authorization code."),
    }
}

fn parse_redirect(params: &HashMap<String, String>) -> Option<Redirect> {
    if let Some(err) = params.get("error") {
        return Some(Redirect::Denied(err.clone()));
    }
    params.get("code").map(|code| Redirect::Code {
        code: code.clone(),
        state: params.get("state").cloned(),
    })
}

fn invalid(path: &Path, e: impl std::fmt::Display) -> Pdf2MdError {
    Pdf2MdError::InvalidCredentials {
        path: path.to_path_buf(),
        detail: e.to_string(),
    }
}

fn auth_failed(detail: String) -> Pdf2MdError {
    Pdf2MdError::AuthFailed { detail }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_at: Option<u64>) -> StoredToken {
        StoredToken {
            token: "ya29.access".into(),
            refresh_token: Some("1//refresh".into()),
            token_uri: DEFAULT_TOKEN_URI.into(),
            client_id: "client.apps.googleusercontent.com".into(),
            client_secret: "secret".into(),
            scopes: vec![DRIVE_READONLY_SCOPE.into()],
            expires_at,
        }
    }

    #[test]
    fn token_validity_respects_skew() {
        let now = 1_000_000;
        assert!(token(Some(now + 3600)).is_valid_at(now));
        assert!(!token(Some(now + 30)).is_valid_at(now));
        assert!(!token(Some(now - 1)).is_valid_at(now));
        assert!(!token(None).is_valid_at(now));
    }

    #[test]
    fn token_file_without_expiry_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(
            &path,
            r#"{"token":"abc","refresh_token":"r","token_uri":"https://oauth2.googleapis.com/token",
                "client_id":"id","client_secret":"s","scopes":["x"],"expiry":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let loaded = load_token(&path).unwrap().unwrap();
        assert_eq!(loaded.token, "abc");
        assert_eq!(loaded.expires_at, None);
    }

    #[test]
    fn saved_token_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let t = token(Some(42));
        save_token(&path, &t).unwrap();
        assert_eq!(load_token(&path).unwrap(), Some(t));
    }

    #[test]
    fn missing_token_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_token(&dir.path().join("token.json")).unwrap(), None);
    }

    #[test]
    fn corrupt_token_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_token(&path), Err(Pdf2MdError::InvalidCredentials { .. })));
    }

    #[test]
    fn missing_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        assert!(matches!(
            load_client_secrets(&path),
            Err(Pdf2MdError::CredentialsMissing { .. })
        ));
    }

    #[test]
    fn client_secrets_installed_and_web() {
        let installed = r#"{"installed":{"client_id":"a","client_secret":"b","redirect_uris":["http://localhost"]}}"#;
        let s = parse_client_secrets(installed).unwrap();
        assert_eq!(s.client_id, "a");
        assert_eq!(s.token_uri, DEFAULT_TOKEN_URI);

        let web = r#"{"web":{"client_id":"c","client_secret":"d","auth_uri":"https://example.test/auth","token_uri":"https://example.test/token"}}"#;
        let s = parse_client_secrets(web).unwrap();
        assert_eq!(s.auth_uri, "https://example.test/auth");

        assert!(parse_client_secrets(r#"{"other":{}}"#).is_err());
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn redirect_with_code() {
        assert_eq!(
            parse_redirect(&query(&[("state", "abc"), ("code", "4/0Ab"), ("scope", "drive")])),
            Some(Redirect::Code {
                code: "4/0Ab".into(),
                state: Some("abc".into())
            })
        );
    }

    #[test]
    fn redirect_with_error_or_nothing() {
        assert_eq!(
            parse_redirect(&query(&[("error", "access_denied"), ("state", "abc")])),
            Some(Redirect::Denied("access_denied".into()))
        );
        assert_eq!(parse_redirect(&query(&[])), None);
    }

    #[test]
    fn states_are_random_and_opaque() {
        let a = new_state();
        let b = new_state();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    async fn bound_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        (listener, base)
    }

    #[tokio::test]
    async fn listener_returns_code_from_browser_request() {
        let (listener, base) = bound_listener().await;
        let waiting = tokio::spawn(wait_for_code(listener, "st".to_string()));
        let browser = Client::new();

        let favicon = browser.get(format!("{base}/favicon.ico")).send().await.unwrap();
        assert_eq!(favicon.status(), StatusCode::NOT_FOUND);
        let bare = browser.get(format!("{base}/")).send().await.unwrap();
        assert_eq!(bare.status(), StatusCode::BAD_REQUEST);

        let reply = browser
            .get(format!("{base}/?code=4%2F0Ab&state=st"))
            .send()
            .await
            .unwrap();
        assert_eq!(reply.status(), StatusCode::OK);
        assert!(reply.text().await.unwrap().contains("Authentication complete"));

        assert_eq!(waiting.await.unwrap().unwrap(), "4/0Ab");
    }

    #[tokio::test]
    async fn listener_rejects_foreign_state() {
        let (listener, base) = bound_listener().await;
        let waiting = tokio::spawn(wait_for_code(listener, "expected".to_string()));

        let reply = Client::new()
            .get(format!("{base}/?code=stolen&state=forged"))
            .send()
            .await
            .unwrap();
        assert_eq!(reply.status(), StatusCode::BAD_REQUEST);

        let err = waiting.await.unwrap().unwrap_err();
        assert!(matches!(err, Pdf2MdError::AuthFailed { ref detail } if detail.contains("state mismatch")));
    }

    #[tokio::test]
    async fn listener_reports_denied_consent() {
        let (listener, base) = bound_listener().await;
        let waiting = tokio::spawn(wait_for_code(listener, "st".to_string()));

        let reply = Client::new()
            .get(format!("{base}/?error=access_denied&state=st"))
            .send()
            .await
            .unwrap();
        assert_eq!(reply.status(), StatusCode::OK);

        let err = waiting.await.unwrap().unwrap_err();
        assert!(matches!(err, Pdf2MdError::AuthFailed { ref detail } if detail.contains("access_denied")));
    }
}
