//! CLI error types with miette diagnostics.
//!
//! Maps `leakwatch_api::Error` and `ConfigError` into user-facing errors
//! with actionable help text and per-class exit codes.

use miette::Diagnostic;
use thiserror::Error;

use leakwatch_config::ConfigError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the backend at {url}")]
    #[diagnostic(
        code(leakwatch::connection_failed),
        help(
            "Check that the backend is running and the API URL is right.\n\
             URL: {url}\n\
             Show the active settings with: leakwatch config show"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("TLS setup failed: {message}")]
    #[diagnostic(
        code(leakwatch::tls_error),
        help(
            "For staging backends with self-signed certificates use --insecure (-k),\n\
             or set ca_cert in your profile."
        )
    )]
    TlsError { message: String },

    #[error("Realtime alert channel unavailable: {message}")]
    #[diagnostic(
        code(leakwatch::realtime),
        help("Check ws_url in your profile, or pass --ws-url.")
    )]
    Realtime { message: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(leakwatch::auth_failed),
        help("Check your email and password, then run: leakwatch login")
    )]
    AuthFailed { message: String },

    #[error("Not signed in")]
    #[diagnostic(code(leakwatch::not_signed_in), help("Run: leakwatch login"))]
    NotSignedIn,

    #[error("Session expired")]
    #[diagnostic(
        code(leakwatch::session_expired),
        help("The stored session was cleared. Sign in again at {redirect_to}: leakwatch login")
    )]
    SessionExpired { redirect_to: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(leakwatch::no_credentials),
        help(
            "Store one with: leakwatch config set-password --profile {profile}\n\
             Or set the LEAKWATCH_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    #[error("Permission denied: {message}")]
    #[diagnostic(
        code(leakwatch::permission_denied),
        help("Your account role does not allow this operation.")
    )]
    PermissionDenied { message: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("Not found: {message}")]
    #[diagnostic(code(leakwatch::not_found))]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    #[diagnostic(code(leakwatch::conflict))]
    Conflict { message: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error (HTTP {status}): {message}")]
    #[diagnostic(code(leakwatch::api_error))]
    ApiError { status: u16, message: String },

    #[error("Unexpected response from the backend: {message}")]
    #[diagnostic(
        code(leakwatch::unexpected_response),
        help("Re-run with -vv to log the raw response.")
    )]
    UnexpectedResponse { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(leakwatch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(leakwatch::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: leakwatch config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No backend configured")]
    #[diagnostic(
        code(leakwatch::no_config),
        help(
            "Create a profile with: leakwatch config init\n\
             Or pass --api-url. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(leakwatch::config))]
    Config { message: String },

    #[error("Session storage error: {message}")]
    #[diagnostic(
        code(leakwatch::session_store),
        help("Remove the session with: leakwatch logout")
    )]
    SessionStore { message: String },

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Operation '{action}' requires confirmation")]
    #[diagnostic(
        code(leakwatch::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(leakwatch::timeout),
        help("Increase timeout with --timeout or check backend responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO ───────────────────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TlsError { .. } | Self::Realtime { .. } => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. }
            | Self::NotSignedIn
            | Self::SessionExpired { .. }
            | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::PermissionDenied { .. } => exit_code::PERMISSION,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::ProfileNotFound { .. }
            | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── leakwatch_api::Error → CliError ──────────────────────────────────

impl From<leakwatch_api::Error> for CliError {
    fn from(err: leakwatch_api::Error) -> Self {
        use leakwatch_api::Error as ApiErr;

        match err {
            ApiErr::Authentication { message } => CliError::AuthFailed { message },
            ApiErr::Unauthorized => CliError::NotSignedIn,
            ApiErr::RefreshFailed { .. } => CliError::SessionExpired {
                redirect_to: leakwatch_api::session::LOGIN_ROUTE.into(),
            },
            ApiErr::SessionStore(message) => CliError::SessionStore { message },

            ApiErr::Transport(e) => {
                let url = e
                    .url()
                    .map_or_else(|| "(unknown)".into(), ToString::to_string);
                CliError::ConnectionFailed {
                    url,
                    source: Box::new(e),
                }
            }
            ApiErr::InvalidUrl(e) => CliError::Validation {
                field: "url".into(),
                reason: e.to_string(),
            },
            ApiErr::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            ApiErr::Tls(message) => CliError::TlsError { message },

            ApiErr::Api { status, message } => match status {
                403 => CliError::PermissionDenied { message },
                404 => CliError::NotFound { message },
                409 => CliError::Conflict { message },
                _ => CliError::ApiError { status, message },
            },

            ApiErr::WebSocketConnect(message) => CliError::Realtime { message },
            ApiErr::Deserialization { message, .. } => CliError::UnexpectedResponse { message },
            ApiErr::Validation { field, reason } => CliError::Validation {
                field: field.into(),
                reason,
            },
        }
    }
}

// ── ConfigError → CliError ───────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "(see: leakwatch config profiles)".into(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            ConfigError::Session { path, message } => CliError::SessionStore {
                message: format!("{}: {message}", path.display()),
            },
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
