use std::sync::Arc;

use wpeople_core::config::Config;
use wpeople_core::error::Result;

use crate::google::{ContactsClient, CredentialStore, GoogleAuth};
use crate::settings::{AdminSettings, FileSettingsStore, OAuthState};
use crate::SettingsStore;

/// Everything an operation needs, rebuilt per call so that a removed
/// authorization (and its cleared instance binding) takes effect at once.
pub struct Context {
    config: Config,
    settings: Arc<dyn SettingsStore>,
    admin: AdminSettings,
}

impl Context {
    pub fn new(config: Config, settings: Arc<dyn SettingsStore>) -> Self {
        let admin = AdminSettings::new(settings.clone(), &config.google.encryption_key);
        Self {
            config,
            settings,
            admin,
        }
    }

    /// Context backed by the settings file named in `config`.
    pub fn from_config(config: Config) -> Self {
        let settings = Arc::new(FileSettingsStore::new(&config.storage.settings_file));
        Self::new(config, settings)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    pub async fn credentials(&self) -> Result<Arc<CredentialStore>> {
        let store = CredentialStore::for_bound_instance(
            self.config.storage.dir_path(),
            self.config.google.redirect_url.clone(),
            self.settings.clone(),
        )
        .await?;
        Ok(Arc::new(store))
    }

    pub async fn google_auth(&self) -> Result<GoogleAuth> {
        let credentials = self.credentials().await?.load_client_credentials().await?;
        GoogleAuth::new(credentials, &self.config.google)
    }

    /// Consent URL carrying a freshly issued `state` for the callback to check.
    pub async fn authorization_url(&self) -> Result<String> {
        let auth = self.google_auth().await?;
        let state = OAuthState::issue(self.settings.as_ref()).await?;
        Ok(auth.auth_url(&state))
    }

    pub async fn contacts(&self) -> Result<ContactsClient> {
        ContactsClient::new(self.credentials().await?, &self.config.google)
    }
}
