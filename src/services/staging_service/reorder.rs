use crate::models::StagedFile;

use super::{StagingError, StagingService};

impl StagingService {
    /// Sets the merge order. `order` must list every staged id exactly once.
    pub async fn reorder(
        &self,
        session_id: &str,
        order: &[String],
    ) -> Result<Vec<StagedFile>, StagingError> {
        let _guard = self.session_lock.lock(session_id).await;
        let mut ledger = self.load_ledger(session_id).await?;

        ledger
            .reorder(order)
            .map_err(|e| StagingError::Validation(e.to_string()))?;
        let files = ledger.entries().to_vec();
        self.store_ledger(session_id, ledger).await?;

        Ok(files)
    }
}
