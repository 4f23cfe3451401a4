use crate::models::StagedFile;
use crate::utils::validation::{
    file_extension, sanitize_filename, validate_extension, validate_file_size, verify_pdf_header,
};
use chrono::Utc;
use uuid::Uuid;

use super::{StagingError, StagingService, UploadCandidate};

/// A candidate that passed validation, with its storage location decided.
struct PreparedUpload {
    display_name: String,
    storage_key: String,
    candidate: UploadCandidate,
}

impl StagingService {
    /// Validates, stores and records a batch of uploads.
    ///
    /// The batch is all-or-nothing: every candidate is validated before any
    /// blob is written, and a failed write deletes the blobs already written
    /// for this batch before returning. The ledger is only touched once all
    /// writes succeeded.
    pub async fn stage_uploads(
        &self,
        session_id: &str,
        candidates: Vec<UploadCandidate>,
    ) -> Result<Vec<StagedFile>, StagingError> {
        let prepared = self.prepare_batch(session_id, candidates)?;

        let _guard = self.session_lock.lock(session_id).await;
        let mut ledger = self.load_ledger(session_id).await?;

        let mut staged: Vec<StagedFile> = Vec::with_capacity(prepared.len());
        for upload in prepared {
            if let Err(e) = self
                .storage
                .upload_file(&upload.storage_key, &upload.candidate.data)
                .await
            {
                tracing::error!(
                    "Failed to store upload {:?}, rolling back {} blobs from this batch: {:?}",
                    upload.display_name,
                    staged.len(),
                    e
                );
                self.delete_blobs(&staged).await;
                return Err(StagingError::UploadFailed(e));
            }

            staged.push(StagedFile {
                id: Uuid::new_v4().to_string(),
                display_name: upload.display_name,
                storage_key: upload.storage_key,
                size: upload.candidate.data.len() as u64,
                uploaded_at: Utc::now(),
            });
        }

        for file in &staged {
            ledger.push(file.clone());
        }
        if let Err(e) = self.store_ledger(session_id, ledger).await {
            self.delete_blobs(&staged).await;
            return Err(e);
        }

        tracing::info!(
            "Staged {} files for session {}",
            staged.len(),
            session_id
        );
        Ok(staged)
    }

    fn prepare_batch(
        &self,
        session_id: &str,
        candidates: Vec<UploadCandidate>,
    ) -> Result<Vec<PreparedUpload>, StagingError> {
        if candidates.is_empty() {
            return Err(StagingError::Validation("No files selected".to_string()));
        }
        if candidates.len() > self.config.max_files_per_upload {
            return Err(StagingError::Validation(format!(
                "At most {} files can be uploaded at once",
                self.config.max_files_per_upload
            )));
        }

        let mut prepared = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if candidate.filename.trim().is_empty() {
                return Err(StagingError::Validation("No files selected".to_string()));
            }
            validate_extension(&candidate.filename, &self.config.allowed_extensions)?;
            validate_file_size(candidate.data.len(), self.config.max_content_length)?;
            if self.config.verify_magic_bytes {
                verify_pdf_header(&candidate.data)?;
            }
            if let Some(content_type) = candidate.content_type.as_deref() {
                tracing::debug!("Upload {:?} declared as {}", candidate.filename, content_type);
            }

            let display_name = sanitize_filename(&candidate.filename)?;
            let extension =
                file_extension(&candidate.filename).unwrap_or_else(|| "pdf".to_string());
            // Random UUID per blob; display names never reach the filesystem.
            let storage_key = format!("{}/{}.{}", session_id, Uuid::new_v4().simple(), extension);

            prepared.push(PreparedUpload {
                display_name,
                storage_key,
                candidate,
            });
        }
        Ok(prepared)
    }
}
