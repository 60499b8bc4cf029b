use std::path::{Path, PathBuf};
use std::sync::Arc;

use wpeople_core::error::{Result, WPeopleError};
use wpeople_core::types::{
    AuthorizationState, ClientCredentials, CredentialsFile, Redirect, TokenRecord,
};

use super::oauth::AuthCodeExchange;
use crate::settings::Instance;
use crate::storage;
use crate::SettingsStore;

/// Client credentials and the current token, persisted as two JSON files
/// namespaced by the instance identifier.
pub struct CredentialStore {
    instance: String,
    credentials_path: PathBuf,
    token_path: PathBuf,
    base_url: String,
    settings: Arc<dyn SettingsStore>,
}

impl CredentialStore {
    pub fn new(
        dir: impl AsRef<Path>,
        instance: impl Into<String>,
        base_url: impl Into<String>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        let instance = instance.into();
        let dir = dir.as_ref();
        Self {
            credentials_path: dir.join(format!("client_secret_{instance}.json")),
            token_path: dir.join(format!("access_token_{instance}.json")),
            instance,
            base_url: base_url.into(),
            settings,
        }
    }

    /// Build a store for the instance currently bound in `settings`.
    pub async fn for_bound_instance(
        dir: impl AsRef<Path>,
        base_url: impl Into<String>,
        settings: Arc<dyn SettingsStore>,
    ) -> Result<Self> {
        let instance = Instance::resolve(settings.as_ref()).await?;
        Ok(Self::new(dir, instance, base_url, settings))
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    fn redirect(&self) -> Redirect {
        Redirect {
            location: self.base_url.clone(),
        }
    }

    pub async fn store_client_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Redirect> {
        if client_id.trim().is_empty() {
            return Err(WPeopleError::MissingArgument("client_id"));
        }
        if client_secret.trim().is_empty() {
            return Err(WPeopleError::MissingArgument("client_secret"));
        }

        let file = CredentialsFile {
            web: ClientCredentials {
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
            },
        };
        storage::write_json(&self.credentials_path, &file).await?;
        tracing::info!(instance = %self.instance, "client credentials stored");
        Ok(self.redirect())
    }

    /// Whether the credentials file exists. Its contents are not checked.
    pub async fn has_valid_credentials_file(&self) -> bool {
        storage::is_file(&self.credentials_path).await
    }

    pub async fn load_client_credentials(&self) -> Result<ClientCredentials> {
        let text = match tokio::fs::read_to_string(&self.credentials_path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WPeopleError::CredentialsNotFound)
            }
            Err(e) => {
                return Err(WPeopleError::Storage(format!(
                    "failed to read {}: {e}",
                    self.credentials_path.display()
                )))
            }
        };

        let file: CredentialsFile = serde_json::from_str(&text).map_err(|e| {
            WPeopleError::Decode(format!("client secret file is invalid: {e}"))
        })?;
        Ok(file.web)
    }

    pub async fn exchange_authorization_code(
        &self,
        exchanger: &dyn AuthCodeExchange,
        code: &str,
    ) -> Result<Redirect> {
        if code.trim().is_empty() {
            return Err(WPeopleError::MissingArgument("code"));
        }
        let record = exchanger.exchange(code).await?;
        self.store_token(&record).await?;
        Ok(self.redirect())
    }

    pub async fn get_token(&self) -> Result<TokenRecord> {
        let text = match tokio::fs::read_to_string(&self.token_path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WPeopleError::TokenNotFound)
            }
            Err(_) => return Err(WPeopleError::TokenInvalid),
        };

        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|_| WPeopleError::TokenInvalid)?;
        if !json["access_token"].is_string() {
            return Err(WPeopleError::TokenInvalid);
        }
        serde_json::from_value(json).map_err(|_| WPeopleError::TokenInvalid)
    }

    /// Overwrite the token file, e.g. with an externally refreshed token.
    pub async fn store_token(&self, record: &TokenRecord) -> Result<()> {
        storage::write_json(&self.token_path, record).await?;
        tracing::info!(instance = %self.instance, "access token stored");
        Ok(())
    }

    /// Delete both files and unbind the instance. Nothing is removed unless
    /// both files are present.
    ///
    /// The credentials file goes first. If a later step fails the store is
    /// left without credentials, which reads as `Unconfigured`, and a stale
    /// token file may remain until the next successful authorization.
    pub async fn remove_authorization(&self) -> Result<Redirect> {
        if !storage::is_file(&self.token_path).await {
            return Err(WPeopleError::TokenNotFound);
        }
        if !storage::is_file(&self.credentials_path).await {
            return Err(WPeopleError::CredentialsNotFound);
        }

        for path in [&self.credentials_path, &self.token_path] {
            tokio::fs::remove_file(path).await.map_err(|e| {
                WPeopleError::Storage(format!("failed to remove {}: {e}", path.display()))
            })?;
        }
        Instance::clear(self.settings.as_ref()).await?;

        tracing::info!(instance = %self.instance, "authorization removed");
        Ok(self.redirect())
    }

    pub async fn authorization_state(&self) -> AuthorizationState {
        if !self.has_valid_credentials_file().await {
            AuthorizationState::Unconfigured
        } else if self.get_token().await.is_ok() {
            AuthorizationState::Authorized
        } else {
            AuthorizationState::CredentialsStored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettingsStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FixedExchange {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthCodeExchange for FixedExchange {
        async fn exchange(&self, code: &str) -> Result<TokenRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TokenRecord::new(format!("token-for-{code}")).with_refresh_token("refresh"))
        }
    }

    fn store(dir: &TempDir) -> (CredentialStore, Arc<MemorySettingsStore>) {
        let settings = Arc::new(MemorySettingsStore::new());
        let store = CredentialStore::new(
            dir.path(),
            "abc123",
            "https://example.com/settings",
            settings.clone(),
        );
        (store, settings)
    }

    #[test]
    fn test_file_names_are_namespaced() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(&dir);
        assert!(store.credentials_path().ends_with("client_secret_abc123.json"));
        assert!(store.token_path().ends_with("access_token_abc123.json"));
    }

    #[tokio::test]
    async fn test_store_client_credentials_writes_web_document() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(&dir);

        assert!(!store.has_valid_credentials_file().await);
        let redirect = store.store_client_credentials("cid", "csecret").await.unwrap();
        assert_eq!(redirect.location, "https://example.com/settings");
        assert!(store.has_valid_credentials_file().await);

        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.credentials_path()).unwrap())
                .unwrap();
        assert_eq!(
            on_disk,
            serde_json::json!({"web": {"client_id": "cid", "client_secret": "csecret"}})
        );
        assert_eq!(store.load_client_credentials().await.unwrap().client_id, "cid");
    }

    #[tokio::test]
    async fn test_store_client_credentials_requires_both() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(&dir);

        let err = store.store_client_credentials("", "secret").await.unwrap_err();
        assert!(matches!(err, WPeopleError::MissingArgument("client_id")));
        let err = store.store_client_credentials("id", " ").await.unwrap_err();
        assert!(matches!(err, WPeopleError::MissingArgument("client_secret")));
        assert!(!store.has_valid_credentials_file().await);
    }

    #[tokio::test]
    async fn test_get_token_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(&dir);
        assert!(matches!(store.get_token().await, Err(WPeopleError::TokenNotFound)));
    }

    #[tokio::test]
    async fn test_get_token_rejects_malformed_documents() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(&dir);

        for doc in [
            "",
            "not json",
            "[]",
            "null",
            r#"{"refresh_token":"r"}"#,
            r#"{"access_token":null}"#,
            r#"{"access_token":42}"#,
        ] {
            std::fs::write(store.token_path(), doc).unwrap();
            let err = store.get_token().await.unwrap_err();
            assert!(matches!(err, WPeopleError::TokenInvalid), "doc {doc:?} gave {err}");
        }
    }

    #[tokio::test]
    async fn test_exchange_persists_token() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(&dir);
        let exchanger = FixedExchange {
            calls: AtomicUsize::new(0),
        };

        store.exchange_authorization_code(&exchanger, "xyz").await.unwrap();
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 1);

        let token = store.get_token().await.unwrap();
        assert_eq!(token.access_token, "token-for-xyz");
        assert_eq!(token.refresh_token.as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn test_store_token_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(&dir);

        store
            .store_token(&TokenRecord::new("first").with_refresh_token("r"))
            .await
            .unwrap();
        store.store_token(&TokenRecord::new("second")).await.unwrap();

        let token = store.get_token().await.unwrap();
        assert_eq!(token.access_token, "second");
        assert_eq!(token.refresh_token, None);
    }

    #[tokio::test]
    async fn test_remove_authorization_requires_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(&dir);

        store.store_client_credentials("cid", "csecret").await.unwrap();
        assert!(store.remove_authorization().await.is_err());
        assert!(store.has_valid_credentials_file().await);
    }

    #[tokio::test]
    async fn test_remove_authorization_clears_everything() {
        let dir = tempfile::tempdir().unwrap();
        let settings: Arc<dyn SettingsStore> = Arc::new(MemorySettingsStore::new());
        let store =
            CredentialStore::for_bound_instance(dir.path(), "https://example.com", settings.clone())
                .await
                .unwrap();
        let bound = settings.get("instance_prefix").await.unwrap();
        assert_eq!(bound.as_deref(), Some(store.instance()));

        store.store_client_credentials("cid", "csecret").await.unwrap();
        store.store_token(&TokenRecord::new("t")).await.unwrap();
        assert_eq!(store.authorization_state().await, AuthorizationState::Authorized);

        store.remove_authorization().await.unwrap();
        assert!(!store.has_valid_credentials_file().await);
        assert!(matches!(store.get_token().await, Err(WPeopleError::TokenNotFound)));
        assert_eq!(settings.get("instance_prefix").await.unwrap(), None);
        assert_eq!(store.authorization_state().await, AuthorizationState::Unconfigured);
    }

    #[tokio::test]
    async fn test_authorization_state_progression() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(&dir);

        assert_eq!(store.authorization_state().await, AuthorizationState::Unconfigured);
        store.store_client_credentials("cid", "csecret").await.unwrap();
        assert_eq!(
            store.authorization_state().await,
            AuthorizationState::CredentialsStored
        );
        store.store_token(&TokenRecord::new("t")).await.unwrap();
        assert_eq!(store.authorization_state().await, AuthorizationState::Authorized);
    }

    struct UnclearableSettings(MemorySettingsStore);

    #[async_trait]
    impl SettingsStore for UnclearableSettings {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.0.set(key, value).await
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Err(WPeopleError::Storage("settings are read-only".to_string()))
        }
    }

    #[tokio::test]
    async fn test_remove_authorization_partial_failure_reads_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(UnclearableSettings(MemorySettingsStore::new()));
        let store = CredentialStore::new(dir.path(), "abc123", "https://example.com", settings);

        store.store_client_credentials("cid", "csecret").await.unwrap();
        store.store_token(&TokenRecord::new("t")).await.unwrap();

        let err = store.remove_authorization().await.unwrap_err();
        assert!(matches!(err, WPeopleError::Storage(_)));
        assert!(!store.has_valid_credentials_file().await);
        assert_eq!(store.authorization_state().await, AuthorizationState::Unconfigured);
    }
}
