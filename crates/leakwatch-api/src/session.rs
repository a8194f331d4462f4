// Session access control
//
// The session is the single piece of shared mutable state in the client.
// It is owned by one `SessionStore` and only `ApiClient` writes to it:
// on login, on refresh, and on teardown (logout or failed refresh).

use std::fmt;
use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::User;

/// Route the application falls back to when the session cannot be recovered.
pub const LOGIN_ROUTE: &str = "/login";

/// Bearer credentials plus the signed-in user.
#[derive(Clone, Default)]
pub struct Session {
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub user: Option<User>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("user", &self.user)
            .finish()
    }
}

impl Session {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: Some(SecretString::from(access_token.into())),
            refresh_token: refresh_token.map(SecretString::from),
            user: None,
        }
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_ref().map(|t| t.expose_secret())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|t| t.expose_secret())
    }

    /// Flatten into the persisted key layout.
    pub fn to_stored(&self) -> StoredSession {
        StoredSession {
            access_token: self.access_token().map(String::from),
            refresh_token: self.refresh_token().map(String::from),
            user: self.user.clone(),
            is_authenticated: self.is_authenticated(),
        }
    }
}

/// On-disk shape of a session: one key per stored field.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub is_authenticated: bool,
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Self {
            access_token: stored.access_token.map(SecretString::from),
            refresh_token: stored.refresh_token.map(SecretString::from),
            user: stored.user,
        }
    }
}

/// Where the session lives between calls.
///
/// Implementations must tolerate `clear()` on an empty store.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>, Error>;
    fn save(&self, session: &Session) -> Result<(), Error>;
    fn clear(&self) -> Result<(), Error>;
}

/// Process-local store. Used by tests and by embedders that do not persist.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            inner: RwLock::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, Error> {
        Ok(self
            .inner
            .read()
            .expect("session lock poisoned")
            .clone())
    }

    fn save(&self, session: &Session) -> Result<(), Error> {
        *self.inner.write().expect("session lock poisoned") = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        *self.inner.write().expect("session lock poisoned") = None;
        Ok(())
    }
}

/// Authentication state as seen by the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No session, or the session was cleared after an unauthorized response.
    SignedOut,
    /// A session with an access token is in place.
    SignedIn,
    /// The refresh token was rejected; the user must sign in at `redirect_to`.
    Expired { redirect_to: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_tokens() {
        let session = Session::new("access-abc", Some("refresh-xyz".into()));
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("access-abc"));
        assert!(!rendered.contains("refresh-xyz"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn stored_layout_uses_storage_keys() {
        let session = Session::new("a1", Some("r1".into()));
        let json = serde_json::to_value(session.to_stored()).unwrap();
        assert_eq!(json["accessToken"], "a1");
        assert_eq!(json["refreshToken"], "r1");
        assert_eq!(json["isAuthenticated"], true);
        assert!(json["user"].is_null());
    }

    #[test]
    fn stored_layout_carries_profile() {
        let user: User = serde_json::from_value(serde_json::json!({
            "email": "ops@wasac.rw",
            "role": "engineer"
        }))
        .unwrap();
        let session = Session::new("a1", None).with_user(user);
        let json = serde_json::to_value(session.to_stored()).unwrap();
        assert_eq!(json["user"]["email"], "ops@wasac.rw");
        assert_eq!(json["user"]["role"], "engineer");
        assert!(json["refreshToken"].is_null());
    }

    #[test]
    fn memory_store_clear_is_idempotent() {
        let store = MemorySessionStore::new();
        store.clear().unwrap();
        store.save(&Session::new("a", None)).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
