// Session persistence on disk
//
// One JSON file per profile, holding the `StoredSession` key layout
// (`accessToken`, `refreshToken`, `user`, `isAuthenticated`). Concurrent
// processes sharing a profile are last-writer-wins.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use leakwatch_api::{Session, SessionStore, StoredSession};

use crate::{ConfigError, sessions_dir};

/// [`SessionStore`] backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for `profile` under the platform data directory.
    pub fn for_profile(profile: &str) -> Self {
        Self::new(sessions_dir().join(format!("{profile}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<StoredSession>, ConfigError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| ConfigError::Session {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }

    fn write(&self, stored: &StoredSession) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(stored).map_err(|e| ConfigError::Session {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        let mut file = open_private(&self.path)?;
        // A file left by an older build may still be group-readable.
        restrict_permissions(&self.path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    fn remove(&self) -> Result<(), ConfigError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Open for writing, creating the file owner-only so tokens are never
/// readable by others, even briefly.
fn open_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn store_error(err: &ConfigError) -> leakwatch_api::Error {
    leakwatch_api::Error::SessionStore(err.to_string())
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, leakwatch_api::Error> {
        let stored = self.read().map_err(|e| store_error(&e))?;
        Ok(stored
            .filter(|s| s.is_authenticated || s.access_token.is_some())
            .map(Session::from))
    }

    fn save(&self, session: &Session) -> Result<(), leakwatch_api::Error> {
        tracing::debug!(path = %self.path.display(), "saving session");
        self.write(&session.to_stored()).map_err(|e| store_error(&e))
    }

    fn clear(&self) -> Result<(), leakwatch_api::Error> {
        tracing::debug!(path = %self.path.display(), "clearing session");
        self.remove().map_err(|e| store_error(&e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> (tempfile::TempDir, FileSessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("sessions").join("default.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_loads_as_signed_out() {
        let (_dir, store) = store();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn save_writes_camel_case_keys() {
        let (_dir, store) = store();
        store
            .save(&Session::new("access-1", Some("refresh-1".into())))
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({
                "accessToken": "access-1",
                "refreshToken": "refresh-1",
                "user": null,
                "isAuthenticated": true
            })
        );

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.access_token(), Some("access-1"));
        assert_eq!(loaded.refresh_token(), Some("refresh-1"));
    }

    #[test]
    fn clear_removes_the_file() {
        let (_dir, store) = store();
        store.save(&Session::new("access-1", None)).unwrap();
        store.clear().unwrap();
        assert!(!store.path().exists());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_a_store_error() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(
            store.load(),
            Err(leakwatch_api::Error::SessionStore(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = store();
        store.save(&Session::new("access-1", None)).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_owner_only_before_any_token_is_written() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.json");
        let _file = open_private(&path).unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.len(), 0);
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn loose_existing_file_is_tightened_on_save() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{}").unwrap();
        std::fs::set_permissions(store.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        store.save(&Session::new("access-1", None)).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
