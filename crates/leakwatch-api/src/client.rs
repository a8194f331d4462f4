// Backend HTTP client
//
// Wraps `reqwest::Client` with base-URL resolution, bearer-token injection,
// and the refresh-on-401 policy. Endpoint groups (auth, devices, control,
// readings, leaks) are inherent methods in separate files so this module
// stays focused on transport mechanics.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::models::TokenPair;
use crate::session::{AuthState, LOGIN_ROUTE, Session, SessionStore};
use crate::transport::TransportConfig;

const REFRESH_PATH: &str = "auth/token/refresh/";
const ERROR_PREVIEW_CHARS: usize = 200;

/// HTTP client for the leak-monitoring backend.
///
/// Every request goes through [`execute`](Self::execute), which attaches
/// the stored access token and, on a 401, performs at most one refresh and
/// one replay. Concurrent 401s share a single refresh: whoever holds the
/// refresh gate rotates the tokens, later holders replay with the rotated
/// access token instead of refreshing again.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    store: Arc<dyn SessionStore>,
    refresh_gate: Mutex<()>,
    auth_state: watch::Sender<AuthState>,
    login_route: String,
    timeout: Option<Duration>,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the fixed API root (e.g. `https://api.example.rw/api/`);
    /// a trailing slash is added if missing so endpoint paths join under it.
    pub fn new(
        base_url: Url,
        store: Arc<dyn SessionStore>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let mut client = Self::with_client(http, base_url, store);
        client.timeout = Some(transport.timeout);
        Ok(client)
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, store: Arc<dyn SessionStore>) -> Self {
        let initial = match store.load() {
            Ok(Some(session)) if session.is_authenticated() => AuthState::SignedIn,
            Ok(_) => AuthState::SignedOut,
            Err(e) => {
                warn!(error = %e, "could not read stored session, starting signed out");
                AuthState::SignedOut
            }
        };
        let (auth_state, _) = watch::channel(initial);

        Self {
            http,
            base_url: normalize_base(base_url),
            store,
            refresh_gate: Mutex::new(()),
            auth_state,
            login_route: LOGIN_ROUTE.to_owned(),
            timeout: None,
        }
    }

    /// Override the route reported in [`AuthState::Expired`].
    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    /// The API root all endpoint paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Session accessors ────────────────────────────────────────────

    /// The stored session, if any.
    pub fn session(&self) -> Result<Option<Session>, Error> {
        self.store.load()
    }

    /// Current authentication state.
    pub fn auth_state(&self) -> AuthState {
        self.auth_state.borrow().clone()
    }

    /// Watch authentication state changes (sign-in, sign-out, expiry).
    pub fn subscribe_auth(&self) -> watch::Receiver<AuthState> {
        self.auth_state.subscribe()
    }

    /// `Authorization` header value for the stored session, for the
    /// realtime channel's upgrade request.
    pub fn bearer_header(&self) -> Result<Option<String>, Error> {
        Ok(self
            .store
            .load()?
            .and_then(|s| s.access_token().map(|t| format!("Bearer {t}"))))
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    pub(crate) fn set_auth_state(&self, state: AuthState) {
        self.auth_state.send_replace(state);
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Resolve an endpoint path against the base URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// `{collection}/{id}/{action}/` with `id` pushed as one encoded path
    /// segment, so ids containing `/`, `?` or `#` cannot reach another route.
    pub(crate) fn resource_url(
        &self,
        field: &'static str,
        collection: &str,
        id: &str,
        action: &str,
    ) -> Result<Url, Error> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::validation(field, "is required"));
        }
        if id == "." || id == ".." {
            return Err(Error::validation(field, "is not a valid identifier"));
        }
        let mut url = self.url(collection)?;
        url.path_segments_mut()
            .map_err(|()| Error::validation(field, "base URL cannot carry a path"))?
            .pop_if_empty()
            .push(id)
            .push(action)
            .push("");
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON response.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.get_url(self.url(path)?).await
    }

    pub(crate) async fn get_url<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let request = self.http.request(Method::GET, url).build()?;
        let resp = self.execute(request).await?;
        self.parse_json(resp).await
    }

    /// Send a GET request with query parameters and decode the JSON response.
    pub(crate) async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, Error>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let request = self
            .http
            .request(Method::GET, self.url(path)?)
            .query(query)
            .build()?;
        let resp = self.execute(request).await?;
        self.parse_json(resp).await
    }

    /// Send a POST request with a JSON body and decode the JSON response.
    pub(crate) async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.post_url(self.url(path)?, body).await
    }

    pub(crate) async fn post_url<T, B>(&self, url: Url, body: &B) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.http.request(Method::POST, url).json(body).build()?;
        let resp = self.execute(request).await?;
        self.parse_json(resp).await
    }

    /// POST without session handling: no bearer header, no refresh.
    ///
    /// Used by the pre-login flows (login, registration, password reset).
    pub(crate) async fn post_public<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, Error> {
        let url = self.url(path)?;
        debug!("POST {}", url);
        self.http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))
    }

    /// Send a request with the stored bearer token, refreshing once on 401.
    ///
    /// The replay copy is taken before the first send and consumed by the
    /// retry, so a request can never be retried twice.
    pub(crate) async fn execute(&self, mut request: reqwest::Request) -> Result<reqwest::Response, Error> {
        let replay = request.try_clone();
        let sent_with = self.store.load()?.and_then(|s| s.access_token);
        if let Some(ref token) = sent_with {
            set_bearer(&mut request, token.expose_secret())?;
        }

        debug!("{} {}", request.method(), request.url());
        let resp = self
            .http
            .execute(request)
            .await
            .map_err(|e| self.transport_error(e))?;

        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        let Some(mut replay) = replay else {
            return Err(Error::Authentication {
                message: "unauthorized, and the request body cannot be replayed".into(),
            });
        };

        let token = self.recover_from_unauthorized(sent_with.as_ref()).await?;
        set_bearer(&mut replay, token.expose_secret())?;

        debug!("replaying {} {} with refreshed token", replay.method(), replay.url());
        let resp = self
            .http
            .execute(replay)
            .await
            .map_err(|e| self.transport_error(e))?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "still unauthorized after token refresh".into(),
            });
        }
        Ok(resp)
    }

    // ── Refresh policy ───────────────────────────────────────────────

    /// Handle a 401 for a request that was sent with `sent_with`.
    ///
    /// Returns the access token the request should be replayed with.
    async fn recover_from_unauthorized(
        &self,
        sent_with: Option<&SecretString>,
    ) -> Result<SecretString, Error> {
        let _gate = self.refresh_gate.lock().await;

        let Some(session) = self.store.load()? else {
            // A concurrent refresh failed and tore the session down while this
            // request waited; leave the state it settled on.
            if sent_with.is_some() {
                debug!("session cleared while waiting for refresh gate");
                return Err(match self.auth_state() {
                    AuthState::Expired { .. } => Error::RefreshFailed {
                        message: "session expired during a concurrent refresh".into(),
                    },
                    _ => Error::Unauthorized,
                });
            }
            self.set_auth_state(AuthState::SignedOut);
            return Err(Error::Unauthorized);
        };

        // Another request rotated the token while this one waited for the gate.
        if let Some(current) = session.access_token() {
            let stale = sent_with.map(|t| t.expose_secret());
            if stale != Some(current) {
                debug!("access token already rotated, replaying without refresh");
                return Ok(SecretString::from(current.to_owned()));
            }
        }

        if session.refresh_token.is_none() {
            warn!("unauthorized with no refresh token, clearing session");
            self.clear_session();
            self.set_auth_state(AuthState::SignedOut);
            return Err(Error::Unauthorized);
        }

        let renewed = self.rotate(session).await?;
        renewed
            .access_token
            .ok_or_else(|| Error::RefreshFailed {
                message: "refresh response carried no access token".into(),
            })
    }

    /// Exchange the session's refresh token for a new token pair and persist it.
    ///
    /// On failure every stored field is cleared and the auth state moves to
    /// [`AuthState::Expired`].
    pub(crate) async fn rotate(&self, session: Session) -> Result<Session, Error> {
        let Some(refresh_token) = session.refresh_token.clone() else {
            return Err(Error::Unauthorized);
        };

        match self.request_refresh(&refresh_token).await {
            Ok(pair) => {
                let renewed = Session {
                    access_token: Some(SecretString::from(pair.access)),
                    refresh_token: pair.refresh.map(SecretString::from).or(Some(refresh_token)),
                    user: pair.user.or(session.user),
                };
                self.store.save(&renewed)?;
                self.set_auth_state(AuthState::SignedIn);
                debug!("access token refreshed");
                Ok(renewed)
            }
            Err(e) => {
                warn!(error = %e, redirect = %self.login_route, "token refresh failed, signing out");
                self.clear_session();
                self.set_auth_state(AuthState::Expired {
                    redirect_to: self.login_route.clone(),
                });
                Err(Error::RefreshFailed {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Call the refresh endpoint. Deliberately bypasses [`execute`](Self::execute):
    /// no bearer header, no retry.
    async fn request_refresh(&self, refresh_token: &SecretString) -> Result<TokenPair, Error> {
        let url = self.url(REFRESH_PATH)?;
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(&json!({ "refresh": refresh_token.expose_secret() }))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.parse_json(resp).await
    }

    pub(crate) fn clear_session(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear stored session");
        }
    }

    // ── Response handling ────────────────────────────────────────────

    /// Decode a JSON body, or turn a non-success status into [`Error::Api`].
    ///
    /// An empty success body decodes as `{}`.
    pub(crate) async fn parse_json<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        let text = if body.trim().is_empty() { "{}" } else { body.as_str() };

        serde_json::from_str(text).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        match self.timeout {
            Some(timeout) if err.is_timeout() => Error::Timeout {
                timeout_secs: timeout.as_secs(),
            },
            _ => Error::Transport(err),
        }
    }
}

fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn set_bearer(request: &mut reqwest::Request, token: &str) -> Result<(), Error> {
    let mut value =
        HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| Error::Authentication {
            message: "stored access token is not a valid header value".into(),
        })?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

fn preview(body: &str) -> String {
    body.chars().take(ERROR_PREVIEW_CHARS).collect()
}

/// Build an [`Error::Api`], preferring the backend's own message field.
fn api_error(status: StatusCode, body: &str) -> Error {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["detail", "message", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(|m| m.as_str()).map(String::from))
        });

    let message = from_json.unwrap_or_else(|| {
        let text = preview(body.trim());
        if text.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_owned()
        } else {
            text
        }
    });

    Error::Api {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = normalize_base(Url::parse("https://api.example.rw/api").unwrap());
        assert_eq!(url.as_str(), "https://api.example.rw/api/");
        assert_eq!(url.join("leaks/").unwrap().as_str(), "https://api.example.rw/api/leaks/");
    }

    #[test]
    fn api_error_prefers_detail_field() {
        let err = api_error(StatusCode::BAD_REQUEST, r#"{"detail": "Valve is offline"}"#);
        assert!(matches!(err, Error::Api { status: 400, ref message } if message == "Valve is offline"));
    }

    #[test]
    fn api_error_falls_back_to_body_then_reason() {
        let err = api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, Error::Api { status: 502, ref message } if message == "upstream down"));

        let err = api_error(StatusCode::NOT_FOUND, "");
        assert!(matches!(err, Error::Api { status: 404, ref message } if message == "Not Found"));
    }
}
