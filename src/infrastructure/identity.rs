use crate::config::AppConfig;
use crate::services::identity::InMemoryIdentityProvider;
use anyhow::anyhow;
use std::sync::Arc;
use tracing::info;

/// Builds the identity provider and seeds the configured default account.
pub fn setup_identity(config: &AppConfig) -> anyhow::Result<Arc<InMemoryIdentityProvider>> {
    let identity = InMemoryIdentityProvider::new().map_err(|e| anyhow!(e))?;

    if config.default_username.is_empty() {
        info!("🔐 No default account configured");
    } else {
        identity
            .add_user(&config.default_username, &config.default_password)
            .map_err(|e| anyhow!(e))?;
        info!("🔐 Seeded account '{}'", config.default_username);
    }

    Ok(Arc::new(identity))
}
