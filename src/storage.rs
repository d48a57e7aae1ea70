use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// JSON object file of fixed string keys to JSON blobs.
#[derive(Clone)]
pub struct LocalStore {
    path: PathBuf,
    entries: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl LocalStore {
    pub fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<BTreeMap<String, Value>>(&contents) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(
                        target: "storage",
                        error = ?err,
                        path = %path.display(),
                        "failed to parse storage file; starting empty"
                    );
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(AppError::Io(err)),
        };

        let store = Self {
            path,
            entries: Arc::new(Mutex::new(entries)),
        };
        store.persist(&store.entries.lock())?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A stored value that no longer matches `T` reads as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.entries.lock().get(key).cloned()?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                debug!(target: "storage", key, ?err, "stored value has an unexpected shape");
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        let value = serde_json::to_value(value)?;
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value);
        self.persist(&entries)
    }

    pub fn remove(&self, key: &str) -> AppResult<()> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    fn persist(&self, entries: &BTreeMap<String, Value>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, serialized)?;
        Ok(())
    }
}

/// Bearer token persistence on top of [`LocalStore`].
#[derive(Clone)]
pub struct SessionStore {
    store: LocalStore,
}

impl SessionStore {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub fn token(&self) -> Option<SecretString> {
        self.store
            .get::<String>(ACCESS_TOKEN_KEY)
            .filter(|token| !token.is_empty())
            .map(SecretString::from)
    }

    pub fn has_token(&self) -> bool {
        self.token().is_some()
    }

    pub fn set_token(&self, token: &SecretString) -> AppResult<()> {
        self.store.set(ACCESS_TOKEN_KEY, &token.expose_secret())
    }

    pub fn clear(&self) -> AppResult<()> {
        self.store.remove(ACCESS_TOKEN_KEY)
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }
}

pub fn storage_path(data_dir: &Path, file_name: &str) -> PathBuf {
    data_dir.join(file_name)
}
