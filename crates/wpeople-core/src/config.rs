use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, WPeopleError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `client_secret_<id>.json` and `access_token_<id>.json`.
    #[serde(default = "default_storage_dir")]
    pub dir: String,
    #[serde(default = "default_settings_file")]
    pub settings_file: String,
}

fn default_storage_dir() -> String {
    "config".to_string()
}

fn default_settings_file() -> String {
    "config/settings.json".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            settings_file: default_settings_file(),
        }
    }
}

impl StorageConfig {
    pub fn dir_path(&self) -> PathBuf {
        PathBuf::from(&self.dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// OAuth redirect URI, also where the user lands after a settings action.
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,
    #[serde(default = "default_people_api_url")]
    pub people_api_url: String,
    #[serde(default = "default_oauth_api_url")]
    pub oauth_api_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_encryption_key")]
    pub encryption_key: String,
}

fn default_redirect_url() -> String {
    "http://localhost:8080/oauth/callback".to_string()
}

fn default_people_api_url() -> String {
    "https://people.googleapis.com".to_string()
}

fn default_oauth_api_url() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_encryption_key() -> String {
    "BWpeople".to_string()
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            redirect_url: default_redirect_url(),
            people_api_url: default_people_api_url(),
            oauth_api_url: default_oauth_api_url(),
            token_url: default_token_url(),
            auth_url: default_auth_url(),
            timeout_secs: default_timeout_secs(),
            encryption_key: default_encryption_key(),
        }
    }
}

impl GoogleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
        }
    }
}

impl Config {
    /// Load config: defaults → wpeople.toml → env vars (env wins).
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| WPeopleError::Config(format!("failed to read config: {e}")))?;
            toml::from_str(&content)
                .map_err(|e| WPeopleError::Config(format!("failed to parse config: {e}")))?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = var("WPEOPLE_STORAGE_DIR") {
            self.storage.dir = v;
        }
        if let Some(v) = var("WPEOPLE_SETTINGS_FILE") {
            self.storage.settings_file = v;
        }
        if let Some(v) = var("WPEOPLE_REDIRECT_URL") {
            self.google.redirect_url = v;
        }
        if let Some(v) = var("WPEOPLE_PEOPLE_API_URL") {
            self.google.people_api_url = v;
        }
        if let Some(v) = var("WPEOPLE_OAUTH_API_URL") {
            self.google.oauth_api_url = v;
        }
        if let Some(v) = var("WPEOPLE_TOKEN_URL") {
            self.google.token_url = v;
        }
        if let Some(v) = var("WPEOPLE_ENCRYPTION_KEY") {
            self.google.encryption_key = v;
        }
        if let Some(v) = var("WPEOPLE_TIMEOUT_SECS") {
            self.google.timeout_secs = v.parse().map_err(|e| {
                WPeopleError::Config(format!("invalid WPEOPLE_TIMEOUT_SECS {v:?}: {e}"))
            })?;
        }
        if let Some(v) = var("WPEOPLE_SERVER_PORT") {
            self.server.port = v.parse().map_err(|e| {
                WPeopleError::Config(format!("invalid WPEOPLE_SERVER_PORT {v:?}: {e}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.google.timeout_secs == 0 {
            return Err(WPeopleError::Config(
                "google.timeout_secs must be greater than zero".to_string(),
            ));
        }

        let urls = [
            ("google.redirect_url", &self.google.redirect_url),
            ("google.people_api_url", &self.google.people_api_url),
            ("google.oauth_api_url", &self.google.oauth_api_url),
            ("google.token_url", &self.google.token_url),
            ("google.auth_url", &self.google.auth_url),
        ];
        for (name, value) in urls {
            if value.trim().is_empty() {
                return Err(WPeopleError::Config(format!("{name} must not be empty")));
            }
        }

        if self.storage.dir.trim().is_empty() {
            return Err(WPeopleError::Config("storage.dir must not be empty".to_string()));
        }
        Ok(())
    }
}
