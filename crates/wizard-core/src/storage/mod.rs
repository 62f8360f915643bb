//! Local key-value persistence for the wizard session.
//!
//! The session keeps a handful of values between steps: the chosen
//! locale, the portal address and session key handed out by the account
//! backend, and the properties entered during custom setup. Values are
//! plain strings; structured values are stored as serialized JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Raw string store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Values stored in a single JSON file.
///
/// Every write loads the file, applies the change and saves atomically
/// (tmp + rename), so separate processes see each other's writes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub const FILE_NAME: &'static str = "session.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store at `<state_dir>/session.json`.
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> anyhow::Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let bytes = fs::read(&self.path)
            .with_context(|| format!("Failed to read session state: {}", self.path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse session state: {}", self.path.display()))
    }

    fn save(&self, values: &BTreeMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create state directory: {}", parent.display())
            })?;
        }

        let bytes = serde_json::to_vec_pretty(values).context("Failed to serialize session state")?;
        let tmp_path = self.path.with_extension(format!("json.{}.tmp", std::process::id()));
        fs::write(&tmp_path, bytes)
            .with_context(|| format!("Failed to write tmp state: {}", tmp_path.display()))?;

        if self.path.exists() {
            fs::remove_file(&self.path).with_context(|| {
                format!("Failed to remove existing state: {}", self.path.display())
            })?;
        }
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to rename tmp state: {}", tmp_path.display()))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let _guard = self.guard();
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let _guard = self.guard();
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let _guard = self.guard();
        let mut values = self.load()?;
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }
}

/// Process-local store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.values().remove(key);
        Ok(())
    }
}

/// Values the session persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKey {
    Language,
    Environment,
    PortalAddress,
    SessionKey,
    AuthenticationProperties,
    DataSourceProperties,
    PlatformBasePath,
    LastAttemptFailed,
}

impl StorageKey {
    /// Locale keys are namespaced by app name; the rest are shared with the
    /// premium app itself and keep their fixed names.
    pub fn storage_name(&self, app_name: &str) -> String {
        match self {
            StorageKey::Language => format!("{app_name}:language"),
            StorageKey::Environment => format!("{app_name}:environment"),
            StorageKey::PortalAddress => "portal_address".to_string(),
            StorageKey::SessionKey => "key".to_string(),
            StorageKey::AuthenticationProperties => "authentication_properties".to_string(),
            StorageKey::DataSourceProperties => "data_source_properties".to_string(),
            StorageKey::PlatformBasePath => "genesysBasePath".to_string(),
            StorageKey::LastAttemptFailed => format!("{app_name}:failed"),
        }
    }
}

/// Typed view over a [`KeyValueStore`].
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<dyn KeyValueStore>,
    app_name: String,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("app_name", &self.app_name)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(inner: Arc<dyn KeyValueStore>, app_name: impl Into<String>) -> Self {
        Self {
            inner,
            app_name: app_name.into(),
        }
    }

    /// Session store backed by [`MemoryStore`].
    pub fn in_memory(app_name: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), app_name)
    }

    pub fn get(&self, key: StorageKey) -> anyhow::Result<Option<String>> {
        self.inner.get(&key.storage_name(&self.app_name))
    }

    pub fn set(&self, key: StorageKey, value: &str) -> anyhow::Result<()> {
        self.inner.set(&key.storage_name(&self.app_name), value)
    }

    pub fn remove(&self, key: StorageKey) -> anyhow::Result<()> {
        self.inner.remove(&key.storage_name(&self.app_name))
    }

    /// Like [`get`](Self::get) but a missing value is an error.
    pub fn require(&self, key: StorageKey) -> anyhow::Result<String> {
        self.get(key)?.with_context(|| {
            format!(
                "'{}' is not set; run the setup step first",
                key.storage_name(&self.app_name)
            )
        })
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: StorageKey) -> anyhow::Result<Option<T>> {
        let Some(raw) = self.get(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&raw).with_context(|| {
            format!(
                "Stored '{}' is not valid JSON",
                key.storage_name(&self.app_name)
            )
        })?;
        Ok(Some(value))
    }

    pub fn set_json<T: Serialize>(&self, key: StorageKey, value: &T) -> anyhow::Result<()> {
        let raw = serde_json::to_string(value).context("Failed to serialize stored value")?;
        self.set(key, &raw)
    }

    pub fn flag(&self, key: StorageKey) -> anyhow::Result<bool> {
        Ok(self.get(key)?.is_some_and(|value| value == "true"))
    }

    pub fn set_flag(&self, key: StorageKey, value: bool) -> anyhow::Result<()> {
        if value {
            self.set(key, "true")
        } else {
            self.remove(key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();

        let store = FileStore::in_dir(dir.path());
        store.set("portal_address", "https://acme.example.com").unwrap();
        store.set("key", "abc").unwrap();
        store.remove("key").unwrap();

        let reopened = FileStore::in_dir(dir.path());
        assert_eq!(
            reopened.get("portal_address").unwrap().as_deref(),
            Some("https://acme.example.com")
        );
        assert_eq!(reopened.get("key").unwrap(), None);
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("state.json"));
        assert_eq!(store.get("anything").unwrap(), None);
    }

    #[test]
    fn test_storage_names() {
        assert_eq!(
            StorageKey::Language.storage_name("premium-app-example"),
            "premium-app-example:language"
        );
        assert_eq!(StorageKey::SessionKey.storage_name("x"), "key");
        assert_eq!(StorageKey::PlatformBasePath.storage_name("x"), "genesysBasePath");
    }

    #[test]
    fn test_session_store_json_and_flags() {
        let store = SessionStore::in_memory("app");
        store
            .set_json(StorageKey::DataSourceProperties, &json!({ "fetch_interval": 30 }))
            .unwrap();
        let value: Value = store
            .get_json(StorageKey::DataSourceProperties)
            .unwrap()
            .unwrap();
        assert_eq!(value["fetch_interval"], 30);

        assert!(!store.flag(StorageKey::LastAttemptFailed).unwrap());
        store.set_flag(StorageKey::LastAttemptFailed, true).unwrap();
        assert!(store.flag(StorageKey::LastAttemptFailed).unwrap());
        store.set_flag(StorageKey::LastAttemptFailed, false).unwrap();
        assert!(!store.flag(StorageKey::LastAttemptFailed).unwrap());
    }

    #[test]
    fn test_require_missing_value() {
        let store = SessionStore::in_memory("app");
        let err = store.require(StorageKey::SessionKey).unwrap_err();
        assert!(err.to_string().contains("'key' is not set"));
    }
}
