pub mod context;
pub mod crypto;
pub mod google;
pub mod http;
pub mod settings;
pub mod storage;

use async_trait::async_trait;
use wpeople_core::error::Result;

/// Abstraction for the host's option storage (client secrets, the inbound
/// authorization token, the instance binding).
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}
