//! Persistence for the access token, refresh token and current user.
//!
//! Values live under three fixed keys. The file store keeps one file per key
//! in the data directory so a session survives restarts.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use taski_core::{Session, User};
use tracing::warn;

pub const ACCESS_TOKEN_KEY: &str = "taski_access_token";
pub const REFRESH_TOKEN_KEY: &str = "taski_refresh_token";
pub const USER_KEY: &str = "taski_user";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store error: {0}")]
    Io(String),

    #[error("lock poisoned")]
    LockPoisoned,
}

impl From<StoreError> for crate::ClientError {
    fn from(e: StoreError) -> Self {
        crate::ClientError::Storage(e.to_string())
    }
}

/// Storage for the current session. No network access.
pub trait TokenStore: Send + Sync {
    /// Read the stored session. Both tokens must be present for a session
    /// to exist; a missing or unreadable user record yields `user: None`.
    fn load(&self) -> Result<Option<Session>, StoreError>;

    fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Replace only the access token, after a refresh.
    fn save_access_token(&self, token: &str) -> Result<(), StoreError>;

    /// Remove all three keys. Absent keys are not an error.
    fn clear(&self) -> Result<(), StoreError>;
}

fn assemble(
    access: Option<String>,
    refresh: Option<String>,
    user_json: Option<String>,
) -> Option<Session> {
    let (access, refresh) = (access?, refresh?);
    if access.is_empty() || refresh.is_empty() {
        return None;
    }
    let user = user_json.and_then(|raw| match serde_json::from_str::<User>(&raw) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!("ignoring unreadable stored user: {e}");
            None
        }
    });
    Some(Session {
        access_token: access,
        refresh_token: refresh,
        user,
    })
}

fn user_json(session: &Session) -> Result<Option<String>, StoreError> {
    session
        .user
        .as_ref()
        .map(|u| serde_json::to_string(u).map_err(|e| StoreError::Io(format!("encode user: {e}"))))
        .transpose()
}

pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$XDG_DATA_HOME/taski`, else `~/.local/share/taski`.
    pub fn open_default() -> Self {
        Self::new(default_data_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path(key);
        match std::fs::read_to_string(&path) {
            Ok(data) => Ok(Some(data.trim_end().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(format!("read {}: {e}", path.display()))),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| StoreError::Io(format!("mkdir {}: {e}", self.dir.display())))?;
        let path = self.path(key);
        std::fs::write(&path, value)
            .map_err(|e| StoreError::Io(format!("write {}: {e}", path.display())))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(format!("delete {}: {e}", path.display()))),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<Session>, StoreError> {
        Ok(assemble(
            self.read(ACCESS_TOKEN_KEY)?,
            self.read(REFRESH_TOKEN_KEY)?,
            self.read(USER_KEY)?,
        ))
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.write(ACCESS_TOKEN_KEY, &session.access_token)?;
        self.write(REFRESH_TOKEN_KEY, &session.refresh_token)?;
        match user_json(session)? {
            Some(json) => self.write(USER_KEY, &json),
            None => self.remove(USER_KEY),
        }
    }

    fn save_access_token(&self, token: &str) -> Result<(), StoreError> {
        self.write(ACCESS_TOKEN_KEY, token)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.remove(ACCESS_TOKEN_KEY)?;
        self.remove(REFRESH_TOKEN_KEY)?;
        self.remove(USER_KEY)
    }
}

fn default_data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("taski")
}

/// In-process store; nothing survives the process.
#[derive(Default)]
pub struct MemoryTokenStore {
    values: Mutex<[Option<String>; 3]>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: &Session) -> Self {
        let store = Self::new();
        // A fresh store cannot be poisoned and encoding a User cannot fail.
        let _ = store.save(session);
        store
    }

    /// Raw value for one of the three keys, for assertions.
    pub fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().ok()?;
        slot(key).and_then(|i| values[i].clone())
    }
}

fn slot(key: &str) -> Option<usize> {
    match key {
        ACCESS_TOKEN_KEY => Some(0),
        REFRESH_TOKEN_KEY => Some(1),
        USER_KEY => Some(2),
        _ => None,
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<Session>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::LockPoisoned)?;
        let [access, refresh, user] = values.clone();
        Ok(assemble(access, refresh, user))
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        let user = user_json(session)?;
        let mut values = self.values.lock().map_err(|_| StoreError::LockPoisoned)?;
        *values = [
            Some(session.access_token.clone()),
            Some(session.refresh_token.clone()),
            user,
        ];
        Ok(())
    }

    fn save_access_token(&self, token: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::LockPoisoned)?;
        values[0] = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::LockPoisoned)?;
        *values = [None, None, None];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            access_token: "acc".into(),
            refresh_token: "ref".into(),
            user: Some(User {
                id: 4,
                username: "dana".into(),
                email: Some("dana@example.com".into()),
            }),
        }
    }

    #[test]
    fn file_store_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(tmp.path().join("taski"));

        assert!(store.load().unwrap().is_none());
        store.save(&session()).unwrap();
        assert_eq!(store.load().unwrap(), Some(session()));
        assert!(tmp.path().join("taski").join(USER_KEY).exists());
    }

    #[test]
    fn file_store_refresh_replaces_access_only() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(tmp.path());
        store.save(&session()).unwrap();

        store.save_access_token("acc2").unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "acc2");
        assert_eq!(loaded.refresh_token, "ref");
        assert_eq!(loaded.user, session().user);
    }

    #[test]
    fn file_store_clear_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(tmp.path());
        store.save(&session()).unwrap();

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(!tmp.path().join(ACCESS_TOKEN_KEY).exists());
    }

    #[test]
    fn corrupt_user_is_treated_as_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(tmp.path());
        store.save(&session()).unwrap();
        std::fs::write(tmp.path().join(USER_KEY), "{not json").unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "acc");
        assert!(loaded.user.is_none());
    }

    #[test]
    fn missing_refresh_token_means_no_session() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(tmp.path());
        store.save(&session()).unwrap();
        std::fs::remove_file(tmp.path().join(REFRESH_TOKEN_KEY)).unwrap();

        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn memory_store_round_trip_and_clear() {
        let store = MemoryTokenStore::with_session(&session());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).as_deref(), Some("acc"));
        store.save_access_token("acc9").unwrap();
        assert_eq!(store.load().unwrap().unwrap().access_token, "acc9");

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(store.get(USER_KEY).is_none());
    }
}
