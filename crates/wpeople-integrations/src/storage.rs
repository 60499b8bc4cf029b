use std::path::Path;

use tokio::io::AsyncWriteExt;
use wpeople_core::error::{Result, WPeopleError};
use wpeople_core::types::new_id;

/// Replace `path` with `contents` via a sibling temp file and a rename, so a
/// concurrent reader sees either the old document or the new one.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            WPeopleError::Storage(format!("failed to create {}: {e}", parent.display()))
        })?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| WPeopleError::Storage(format!("invalid path {}", path.display())))?;
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", new_id()));

    if let Err(e) = write_private(&temp_path, contents).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(WPeopleError::Storage(format!(
            "failed to write {}: {e}",
            temp_path.display()
        )));
    }

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(WPeopleError::Storage(format!(
            "failed to finalize {}: {e}",
            path.display()
        )));
    }
    Ok(())
}

/// Create `path` (owner read/write only on unix) and fill it. The file must
/// not exist yet.
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

/// Serialize `value` as pretty JSON and write it atomically.
pub async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| WPeopleError::Storage(format!("failed to encode {}: {e}", path.display())))?;
    write_atomic(path, &json).await
}

pub async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
