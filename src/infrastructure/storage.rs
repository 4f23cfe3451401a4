use crate::config::AppConfig;
use crate::services::storage::LocalStorageService;
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

/// Creates the upload and merged-output directories and the blob store
/// rooted at the upload directory.
pub async fn setup_storage(config: &AppConfig) -> anyhow::Result<Arc<LocalStorageService>> {
    for dir in [&config.upload_dir, &config.merged_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    info!("📁 Local Storage: {}", config.upload_dir.display());
    Ok(Arc::new(LocalStorageService::new(config.upload_dir.clone())))
}
