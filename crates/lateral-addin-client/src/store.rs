//! Session stores.
//!
//! Both file-backed stores keep a flat JSON object of string settings and only
//! touch the three session keys, so other settings in the same file survive a
//! logout.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lateral_addin_core::{AddinError, Session, SessionStore};
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

const KEY_TOKEN: &str = "token";
const KEY_NAME: &str = "name";
const KEY_SERVER: &str = "serverSettings";

const LOCAL_STORAGE_FILE: &str = "local_storage.json";
const DOCUMENT_SETTINGS_SUFFIX: &str = ".settings.json";

/// A JSON object of settings persisted at `path`.
#[derive(Debug, Clone)]
struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    async fn read(&self) -> Result<Map<String, Value>, AddinError> {
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AddinError::Storage(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(AddinError::Storage(format!("{}: {}", self.path.display(), e))),
        }
    }

    async fn write(&self, settings: &Map<String, Value>) -> Result<(), AddinError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AddinError::Storage(format!("{}: {}", parent.display(), e)))?;
        }
        let json = serde_json::to_vec_pretty(settings)
            .map_err(|e| AddinError::Storage(e.to_string()))?;
        fs::write(&self.path, json)
            .await
            .map_err(|e| AddinError::Storage(format!("{}: {}", self.path.display(), e)))
    }

    async fn load_session(&self) -> Result<Option<Session>, AddinError> {
        let settings = self.read().await?;
        let get = |key: &str| {
            settings
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let token = get(KEY_TOKEN);
        if token.is_empty() {
            return Ok(None);
        }
        Ok(Some(Session {
            token,
            name: get(KEY_NAME),
            server: get(KEY_SERVER),
        }))
    }

    async fn save_session(&self, session: &Session) -> Result<(), AddinError> {
        let mut settings = self.read().await?;
        settings.insert(KEY_TOKEN.to_string(), Value::from(session.token.as_str()));
        settings.insert(KEY_NAME.to_string(), Value::from(session.name.as_str()));
        settings.insert(KEY_SERVER.to_string(), Value::from(session.server.as_str()));
        self.write(&settings).await
    }

    async fn clear_session(&self) -> Result<(), AddinError> {
        let mut settings = self.read().await?;
        for key in [KEY_TOKEN, KEY_NAME, KEY_SERVER] {
            settings.remove(key);
        }
        self.write(&settings).await
    }
}

/// Per-user store, the counterpart of the browser's local storage.
#[derive(Debug, Clone)]
pub struct LocalStorageStore {
    file: SettingsFile,
}

impl LocalStorageStore {
    /// Store under `dir` (created on first save).
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            file: SettingsFile {
                path: dir.as_ref().join(LOCAL_STORAGE_FILE),
            },
        }
    }

    /// Store in the platform config directory, e.g. `~/.config/lateral-addin`.
    pub fn default_location() -> Result<Self, AddinError> {
        let dir = dirs::config_dir()
            .ok_or_else(|| AddinError::Storage("no config directory available".to_string()))?;
        Ok(Self::new(dir.join("lateral-addin")))
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }
}

#[async_trait]
impl SessionStore for LocalStorageStore {
    #[instrument(skip(self), level = "debug")]
    async fn load(&self) -> Result<Option<Session>, AddinError> {
        self.file.load_session().await
    }

    #[instrument(skip(self, session), level = "debug")]
    async fn save(&self, session: &Session) -> Result<(), AddinError> {
        self.file.save_session(session).await?;
        debug!("Saved session to {}", self.file.path.display());
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn clear(&self) -> Result<(), AddinError> {
        self.file.clear_session().await
    }
}

/// Settings bound to one document, kept next to it as
/// `<document>.settings.json`.
#[derive(Debug, Clone)]
pub struct DocumentSettingsStore {
    file: SettingsFile,
}

impl DocumentSettingsStore {
    pub fn for_document(document: impl AsRef<Path>) -> Self {
        let mut path = document.as_ref().as_os_str().to_owned();
        path.push(DOCUMENT_SETTINGS_SUFFIX);
        Self {
            file: SettingsFile {
                path: PathBuf::from(path),
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }
}

#[async_trait]
impl SessionStore for DocumentSettingsStore {
    #[instrument(skip(self), level = "debug")]
    async fn load(&self) -> Result<Option<Session>, AddinError> {
        self.file.load_session().await
    }

    #[instrument(skip(self, session), level = "debug")]
    async fn save(&self, session: &Session) -> Result<(), AddinError> {
        self.file.save_session(session).await?;
        debug!("Saved session to {}", self.file.path.display());
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn clear(&self) -> Result<(), AddinError> {
        self.file.clear_session().await
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: RwLock::new(Some(session)),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<Session>, AddinError> {
        Ok(self.session.read().await.clone())
    }

    async fn save(&self, session: &Session) -> Result<(), AddinError> {
        *self.session.write().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), AddinError> {
        *self.session.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session() -> Session {
        Session {
            token: "abc".to_string(),
            name: "Jo".to_string(),
            server: "https://acme.example.com/".to_string(),
        }
    }

    #[tokio::test]
    async fn test_local_storage_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStorageStore::new(temp_dir.path().join("profile"));

        assert_eq!(store.load().await.unwrap(), None);

        store.save(&session()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(session()));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_keeps_unrelated_settings() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStorageStore::new(temp_dir.path());
        tokio::fs::write(store.path(), br#"{"theme": "dark"}"#)
            .await
            .unwrap();

        store.save(&session()).await.unwrap();
        store.clear().await.unwrap();

        let raw: Value =
            serde_json::from_slice(&tokio::fs::read(store.path()).await.unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"theme": "dark"}));
    }

    #[tokio::test]
    async fn test_document_settings_path_and_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let document = temp_dir.path().join("letter.docx");
        let store = DocumentSettingsStore::for_document(&document);
        assert_eq!(store.path(), temp_dir.path().join("letter.docx.settings.json"));

        store.save(&session()).await.unwrap();
        let reopened = DocumentSettingsStore::for_document(&document);
        assert_eq!(reopened.load().await.unwrap(), Some(session()));

        reopened.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_settings_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStorageStore::new(temp_dir.path());
        tokio::fs::write(store.path(), b"not json").await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, AddinError::Storage(_)));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemorySessionStore::new();
        assert_eq!(store.load().await.unwrap(), None);
        store.save(&session()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(session()));
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
