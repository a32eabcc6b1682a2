use crate::errors::AppError;
use crate::models::SiteSnapshot;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::error;

/// Cache file for a site; `/` in the identity becomes `_`.
pub fn cache_path_for(cache_dir: &Path, site: &str) -> PathBuf {
    cache_dir.join(format!("{}.json", safe_name(site)))
}

pub fn safe_name(site: &str) -> String {
    site.replace('/', "_")
}

/// A missing or unreadable cache entry is treated as a miss.
pub async fn load_snapshot(path: &Path) -> Option<SiteSnapshot> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                error!("failed to parse cache file {}: {err}", path.display());
                None
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            error!("failed to read cache file {}: {err}", path.display());
            None
        }
    }
}

pub async fn persist_snapshot(path: &Path, snapshot: &SiteSnapshot) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let payload = serde_json::to_vec(snapshot).map_err(AppError::internal)?;
    fs::write(path, payload).await.map_err(AppError::internal)?;
    Ok(())
}
