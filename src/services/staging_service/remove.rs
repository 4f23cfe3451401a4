use crate::models::StagedFile;

use super::{StagingError, StagingService};

impl StagingService {
    /// Deletes one staged file. Ids from other sessions are simply not found.
    pub async fn remove_file(
        &self,
        session_id: &str,
        file_id: &str,
    ) -> Result<StagedFile, StagingError> {
        let _guard = self.session_lock.lock(session_id).await;
        let mut ledger = self.load_ledger(session_id).await?;

        let file = ledger.remove(file_id).ok_or(StagingError::NotFound)?;
        // A blob that cannot be deleted is logged and left for the session sweep.
        self.delete_blobs(std::slice::from_ref(&file)).await;
        self.store_ledger(session_id, ledger).await?;

        tracing::info!("Removed staged file {} from session {}", file.id, session_id);
        Ok(file)
    }

    /// Deletes every staged file of the session. Clearing an empty ledger is
    /// a no-op. Returns how many entries were dropped.
    pub async fn clear(&self, session_id: &str) -> Result<usize, StagingError> {
        let _guard = self.session_lock.lock(session_id).await;
        let mut ledger = self.load_ledger(session_id).await?;
        if ledger.is_empty() {
            return Ok(0);
        }

        let files = ledger.take_all();
        let failures = self.delete_blobs(&files).await;
        self.store_ledger(session_id, ledger).await?;

        if failures > 0 {
            tracing::warn!(
                "Cleared session {} with {} of {} blob deletions failing",
                session_id,
                failures,
                files.len()
            );
        } else {
            tracing::info!("Cleared {} staged files from session {}", files.len(), session_id);
        }
        Ok(files.len())
    }
}
