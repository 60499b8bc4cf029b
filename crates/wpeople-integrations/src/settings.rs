use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use wpeople_core::error::{Result, WPeopleError};
use wpeople_core::types::new_id;

use crate::crypto::Encryptor;
use crate::storage;
use crate::SettingsStore;

const CLIENT_ID_KEY: &str = "the_client_id";
const CLIENT_SECRET_KEY: &str = "the_client_secret";
const AUTHORIZATION_TOKEN_KEY: &str = "authorization_token";
const INSTANCE_KEY: &str = "instance_prefix";
const OAUTH_STATE_KEY: &str = "oauth_state";

/// Settings kept in a single JSON object on disk.
pub struct FileSettingsStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                WPeopleError::Decode(format!("settings file {} is invalid: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(WPeopleError::Storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), value.to_string());
        storage::write_json(&self.path, &values).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        if values.remove(key).is_some() {
            storage::write_json(&self.path, &values).await?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

/// A submission of the settings form.
#[derive(Debug, Clone, Default)]
pub struct SettingsForm {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub authorization_token: Option<String>,
    /// "Update token only": keep the stored client id/secret untouched.
    pub token_only: bool,
}

/// Plugin settings: sealed client id/secret plus the bearer token that
/// inbound API callers must present.
pub struct AdminSettings {
    store: Arc<dyn SettingsStore>,
    encryptor: Encryptor,
}

impl AdminSettings {
    pub fn new(store: Arc<dyn SettingsStore>, encryption_key: &str) -> Self {
        Self {
            store,
            encryptor: Encryptor::new(encryption_key),
        }
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    pub async fn save(&self, form: &SettingsForm) -> Result<()> {
        if !form.token_only {
            if let Some(id) = form.client_id.as_deref() {
                let sealed = self.encryptor.encrypt(id.trim())?;
                self.store.set(CLIENT_ID_KEY, &sealed).await?;
            }
            if let Some(secret) = form.client_secret.as_deref() {
                let sealed = self.encryptor.encrypt(secret.trim())?;
                self.store.set(CLIENT_SECRET_KEY, &sealed).await?;
            }
        }

        if let Some(token) = form.authorization_token.as_deref() {
            self.store
                .set(AUTHORIZATION_TOKEN_KEY, token.trim())
                .await?;
        }

        tracing::info!(token_only = form.token_only, "settings saved");
        Ok(())
    }

    pub async fn client_id(&self) -> Result<Option<String>> {
        self.unseal(CLIENT_ID_KEY).await
    }

    pub async fn client_secret(&self) -> Result<Option<String>> {
        self.unseal(CLIENT_SECRET_KEY).await
    }

    async fn unseal(&self, key: &str) -> Result<Option<String>> {
        match self.store.get(key).await? {
            Some(sealed) if !sealed.is_empty() => self.encryptor.decrypt(&sealed).map(Some),
            _ => Ok(None),
        }
    }

    pub async fn authorization_token(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get(AUTHORIZATION_TOKEN_KEY)
            .await?
            .filter(|t| !t.is_empty()))
    }

    /// Check an inbound `Authorization` header value against the configured token.
    pub async fn verify_bearer(&self, header: Option<&str>) -> Result<()> {
        let expected = self
            .authorization_token()
            .await?
            .ok_or(WPeopleError::Unauthorized)?;
        let presented = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(WPeopleError::Unauthorized)?;

        if constant_time_eq(expected.as_bytes(), presented.as_bytes()) {
            Ok(())
        } else {
            Err(WPeopleError::Unauthorized)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// The instance identifier that namespaces the credential files.
pub struct Instance;

impl Instance {
    /// Return the bound identifier, binding a fresh one on first use.
    pub async fn resolve(store: &dyn SettingsStore) -> Result<String> {
        if let Some(id) = store.get(INSTANCE_KEY).await?.filter(|id| !id.is_empty()) {
            return Ok(id);
        }
        let id = new_id();
        store.set(INSTANCE_KEY, &id).await?;
        tracing::info!(instance = %id, "bound new instance");
        Ok(id)
    }

    pub async fn clear(store: &dyn SettingsStore) -> Result<()> {
        store.remove(INSTANCE_KEY).await
    }
}

/// The OAuth `state` value of the consent request currently in flight.
pub struct OAuthState;

impl OAuthState {
    /// Issue a fresh state, replacing any earlier pending one.
    pub async fn issue(store: &dyn SettingsStore) -> Result<String> {
        let state = new_id();
        store.set(OAUTH_STATE_KEY, &state).await?;
        Ok(state)
    }

    /// Accept `presented` once if it matches the pending state. A mismatch
    /// leaves the pending state in place.
    pub async fn consume(store: &dyn SettingsStore, presented: Option<&str>) -> Result<()> {
        let expected = store
            .get(OAUTH_STATE_KEY)
            .await?
            .filter(|s| !s.is_empty())
            .ok_or(WPeopleError::StateMismatch)?;
        let presented = presented.ok_or(WPeopleError::StateMismatch)?;

        if !constant_time_eq(expected.as_bytes(), presented.as_bytes()) {
            tracing::warn!("oauth callback with unknown state");
            return Err(WPeopleError::StateMismatch);
        }
        store.remove(OAUTH_STATE_KEY).await
    }
}
