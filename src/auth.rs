//! Credential persistence and the social-login authorization URL.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};
use crate::model::UserProfile;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";

/// Minimal key/value persistence for credentials.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> ReportResult<()>;
    fn remove(&self, key: &str) -> ReportResult<()>;
}

fn lock(entries: &Mutex<BTreeMap<String, String>>) -> MutexGuard<'_, BTreeMap<String, String>> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-local storage, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> ReportResult<()> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ReportResult<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

/// Storage backed by a JSON object on disk. Every change rewrites the file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Opens the file at `path`. A missing file starts empty; an unreadable one is an error.
    pub fn open(path: impl Into<PathBuf>) -> ReportResult<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("Credential file {} does not exist yet", path.display());
                BTreeMap::new()
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> ReportResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_vec_pretty(entries)?)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> ReportResult<()> {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> ReportResult<()> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

/// Tokens and profile returned by a successful login.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: UserProfile,
}

/// The three credential entries. There is no expiry metadata; a 401 is the only signal.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn access_token(&self) -> Option<String> {
        self.storage
            .get(ACCESS_TOKEN_KEY)
            .filter(|token| !token.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.storage.get(REFRESH_TOKEN_KEY)
    }

    /// The stored profile. A corrupt entry is logged and treated as absent.
    pub fn user(&self) -> Option<UserProfile> {
        let raw = self.storage.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                warn!("Ignoring unreadable stored user profile: {err}");
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn store_session(&self, session: &Session) -> ReportResult<()> {
        self.storage.set(ACCESS_TOKEN_KEY, &session.access_token)?;
        match &session.refresh_token {
            Some(token) => self.storage.set(REFRESH_TOKEN_KEY, token)?,
            None => self.storage.remove(REFRESH_TOKEN_KEY)?,
        }
        self.storage
            .set(USER_KEY, &serde_json::to_string(&session.user)?)
    }

    /// Removes all three entries, attempting each even if an earlier removal fails.
    pub fn clear(&self) -> ReportResult<()> {
        let mut first_error = None;
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(err) = self.storage.remove(key) {
                warn!("Failed to remove stored credential {key}: {err}");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Identity provider settings for the authorization-code login.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub authorize_url: String,
    pub client_id: String,
    pub redirect_uri: String,
}

impl OAuthSettings {
    /// URL the user opens to sign in; the provider redirects back with `?code=...`.
    pub fn authorization_url(&self, state: Option<&str>) -> ReportResult<Url> {
        if self.client_id.trim().is_empty() {
            return Err(ReportError::Config("OAuth client_id is not configured".into()));
        }

        let mut params = vec![
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        if let Some(state) = state {
            params.push(("state", state));
        }

        Url::parse_with_params(&self.authorize_url, &params).map_err(|err| {
            ReportError::Config(format!(
                "invalid OAuth authorize_url {:?}: {err}",
                self.authorize_url
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    fn session() -> Session {
        Session {
            access_token: "access".into(),
            refresh_token: Some("refresh".into()),
            user: UserProfile {
                id: 7,
                name: "김선생".into(),
                email: None,
                role: Role::Teacher,
            },
        }
    }

    #[test]
    fn session_round_trips_through_the_store() {
        let store = CredentialStore::in_memory();
        assert!(!store.is_authenticated());

        store.store_session(&session()).expect("store");
        assert_eq!(store.access_token().as_deref(), Some("access"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh"));
        assert_eq!(store.user().map(|user| user.id), Some(7));

        store.clear().expect("clear");
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
        assert!(store.user().is_none());
    }

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("credentials.json");

        let store = CredentialStore::new(Arc::new(FileStorage::open(&path).expect("open")));
        store.store_session(&session()).expect("store");

        let reopened = CredentialStore::new(Arc::new(FileStorage::open(&path).expect("reopen")));
        assert_eq!(reopened.access_token().as_deref(), Some("access"));

        reopened.clear().expect("clear");
        let contents = fs::read_to_string(&path).expect("read");
        assert!(!contents.contains("access"));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("credentials.json");
        fs::write(&path, "{not json").expect("write");
        assert!(matches!(
            FileStorage::open(&path),
            Err(ReportError::Serialization(_))
        ));
    }

    #[test]
    fn authorization_url_uses_code_grant() {
        let settings = OAuthSettings {
            authorize_url: "https://kauth.example.com/oauth/authorize".into(),
            client_id: "client-1".into(),
            redirect_uri: "http://localhost:3000/auth/callback".into(),
        };
        let url = settings.authorization_url(Some("xyz")).expect("url");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("client_id".into(), "client-1".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "http://localhost:3000/auth/callback".into()
        )));
        assert!(pairs.contains(&("state".into(), "xyz".into())));
    }

    #[test]
    fn missing_client_id_is_a_config_error() {
        let settings = OAuthSettings::default();
        assert!(matches!(
            settings.authorization_url(None),
            Err(ReportError::Config(_))
        ));
    }
}
