use thiserror::Error;

/// Top-level error type for the `leakwatch-api` crate.
///
/// Covers every failure mode of the network access layer:
/// authentication, transport, backend responses, realtime channel,
/// and client-side form validation. The CLI maps these into
/// user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected, or a replayed request was still unauthorized.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The backend answered 401 and no refresh token was available.
    /// The stored session has been cleared.
    #[error("Not signed in -- the backend rejected the request (HTTP 401)")]
    Unauthorized,

    /// The refresh endpoint rejected the refresh token.
    /// The stored session has been cleared.
    #[error("Session expired -- token refresh failed: {message}")]
    RefreshFailed { message: String },

    /// Reading or writing the persisted session failed.
    #[error("Session storage error: {0}")]
    SessionStore(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Backend API ─────────────────────────────────────────────────
    /// Non-success response from the backend, with its message if any.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Realtime ────────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Forms ───────────────────────────────────────────────────────
    /// Client-side validation rejected a form; nothing was sent.
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
}

impl Error {
    /// Returns `true` if the user has to sign in again.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::Unauthorized | Self::RefreshFailed { .. }
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::WebSocketConnect(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }

    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}
