use crate::models::StagedFile;
use crate::services::merge::{MergeInput, merge_documents};

use super::{MergedDocument, StagingError, StagingService};

impl StagingService {
    /// Merges the staged files in ledger order.
    ///
    /// Staged files are single-use: whether the merge succeeds or fails, every
    /// staged blob is deleted and the ledger emptied before returning.
    pub async fn merge(&self, session_id: &str) -> Result<MergedDocument, StagingError> {
        let _guard = self.session_lock.lock(session_id).await;
        let mut ledger = self.load_ledger(session_id).await?;
        if ledger.is_empty() {
            return Err(StagingError::Validation("No files to merge".to_string()));
        }

        let files = ledger.take_all();
        let result = self.merge_staged(&files).await;

        let failures = self.delete_blobs(&files).await;
        if failures > 0 {
            tracing::warn!(
                "{} staged blobs of session {} could not be deleted after merge",
                failures,
                session_id
            );
        }
        self.store_ledger(session_id, ledger).await?;

        match &result {
            Ok(merged) => tracing::info!(
                "Merged {} files into {} pages for session {}",
                merged.source_count,
                merged.page_count,
                session_id
            ),
            Err(e) => tracing::error!("Merge failed for session {}: {}", session_id, e),
        }
        result
    }

    async fn merge_staged(&self, files: &[StagedFile]) -> Result<MergedDocument, StagingError> {
        let mut inputs = Vec::with_capacity(files.len());
        for file in files {
            let bytes = self.storage.get_file(&file.storage_key).await.map_err(|e| {
                StagingError::MergeFailed(format!(
                    "could not read staged file {} ({}): {:#}",
                    file.id, file.display_name, e
                ))
            })?;
            inputs.push(MergeInput {
                label: format!("{} ({})", file.display_name, file.id),
                bytes,
            });
        }

        // lopdf parsing and serialization are CPU bound.
        let output = tokio::task::spawn_blocking(move || merge_documents(&inputs))
            .await
            .map_err(|e| StagingError::MergeFailed(format!("merge task aborted: {}", e)))?
            .map_err(|e| StagingError::MergeFailed(e.to_string()))?;

        Ok(MergedDocument {
            bytes: output.bytes,
            page_count: output.page_count,
            source_count: output.documents,
        })
    }
}
