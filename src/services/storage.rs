use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Blob storage for staged documents. Keys are relative, `/` separated.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn upload_file(&self, key: &str, data: &[u8]) -> Result<()>;
    async fn get_file(&self, key: &str) -> Result<Vec<u8>>;
    /// Returns `false` when there was nothing to delete.
    async fn delete_file(&self, key: &str) -> Result<bool>;
    /// Keys stored directly under `prefix`.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;
    async fn health_check(&self) -> Result<()>;
}

/// Stores blobs as plain files below a root directory.
pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key onto the filesystem, refusing anything that could escape
    /// the root directory.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        if key.is_empty() || key.contains('\\') {
            bail!("invalid storage key {:?}", key);
        }
        for component in relative.components() {
            if !matches!(component, Component::Normal(_)) {
                bail!("invalid storage key {:?}", key);
            }
        }
        Ok(self.root.join(relative))
    }

    /// Removes a now-empty key directory. Never touches the root itself.
    async fn prune_parent(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if parent != self.root && parent.starts_with(&self.root) {
                // Fails harmlessly while the directory still has entries.
                let _ = fs::remove_dir(parent).await;
            }
        }
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn upload_file(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename so readers never see a partial blob.
        let partial = path.with_extension(format!("{}.part", Uuid::new_v4().simple()));
        if let Err(e) = fs::write(&partial, data).await {
            let _ = fs::remove_file(&partial).await;
            return Err(anyhow!("failed to write {}: {}", partial.display(), e));
        }
        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(anyhow!("failed to commit {}: {}", path.display(), e));
        }

        tracing::debug!("Stored {} bytes at {}", data.len(), key);
        Ok(())
    }

    async fn get_file(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        fs::read(&path)
            .await
            .map_err(|e| anyhow!("failed to read {}: {}", path.display(), e))
    }

    async fn delete_file(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                self.prune_parent(&path).await;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(anyhow!("failed to delete {}: {}", path.display(), e)),
        }
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.trim_end_matches('/');
        let dir = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.resolve(prefix)?
        };

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(anyhow!("failed to list {}: {}", dir.display(), e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                keys.push(if prefix.is_empty() {
                    name.to_string()
                } else {
                    format!("{}/{}", prefix, name)
                });
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn health_check(&self) -> Result<()> {
        let metadata = fs::metadata(&self.root).await?;
        if !metadata.is_dir() {
            bail!("{} is not a directory", self.root.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path());

        storage.upload_file("s1/a.pdf", b"%PDF-1.4").await.unwrap();
        assert!(dir.path().join("s1/a.pdf").is_file());
        assert_eq!(storage.get_file("s1/a.pdf").await.unwrap(), b"%PDF-1.4");
        assert_eq!(storage.list_objects("s1/").await.unwrap(), vec!["s1/a.pdf"]);

        assert!(storage.delete_file("s1/a.pdf").await.unwrap());
        assert!(!storage.delete_file("s1/a.pdf").await.unwrap());
        assert!(storage.list_objects("s1").await.unwrap().is_empty());
        // Emptied key directory is pruned, the root stays.
        assert!(!dir.path().join("s1").exists());
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn test_no_partial_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path());
        storage.upload_file("s1/a.pdf", b"data").await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path().join("s1"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["a.pdf"]);
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path());

        for key in ["../evil.pdf", "/etc/passwd", "a/../../b", "a\\b", ""] {
            assert!(storage.upload_file(key, b"x").await.is_err(), "{key}");
        }
    }

    #[tokio::test]
    async fn test_health_check_requires_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalStorageService::new(dir.path()).health_check().await.is_ok());
        assert!(
            LocalStorageService::new(dir.path().join("missing"))
                .health_check()
                .await
                .is_err()
        );
    }
}
