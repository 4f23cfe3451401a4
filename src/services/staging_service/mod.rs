//! Session-scoped staging of uploaded PDFs and their consumption by merge.
//!
//! Every public operation takes the session's lock before reading the ledger
//! and releases it after writing the ledger back, so the ledger and the blobs
//! it references change together.

use crate::config::AppConfig;
use crate::models::{Principal, Session, StagedFile, StagingLedger};
use crate::services::{session_store::SessionStore, storage::StorageService};
use crate::utils::keyed_mutex::KeyedMutex;
use chrono::Utc;
use std::sync::Arc;

pub mod merge;
pub mod remove;
pub mod reorder;
pub mod types;
pub mod upload;

pub use types::{MergedDocument, StagingError, UploadCandidate};

pub struct StagingService {
    storage: Arc<dyn StorageService>,
    sessions: Arc<dyn SessionStore>,
    config: AppConfig,
    session_lock: KeyedMutex,
}

impl StagingService {
    pub fn new(
        storage: Arc<dyn StorageService>,
        sessions: Arc<dyn SessionStore>,
        config: AppConfig,
    ) -> Self {
        Self {
            storage,
            sessions,
            config,
            session_lock: KeyedMutex::new(),
        }
    }

    /// Opens a session living for the configured TTL. Sessions that expired
    /// without a logout are closed first so their blobs do not linger.
    pub async fn open_session(&self, principal: &Principal) -> Session {
        let reclaimed = self.close_expired_sessions().await;
        if reclaimed > 0 {
            tracing::info!("Reclaimed {} expired sessions", reclaimed);
        }
        let expires_at = Utc::now() + self.config.session_ttl();
        self.sessions.open(principal, expires_at).await
    }

    /// Closes every session past its expiry, deleting its staged blobs.
    pub async fn close_expired_sessions(&self) -> usize {
        let mut closed = 0;
        for session_id in self.sessions.expired(Utc::now()).await {
            if self.close_session(&session_id).await.is_some() {
                closed += 1;
            }
        }
        closed
    }

    /// Ends a session and deletes every blob it still owns, including any
    /// left behind by earlier failed deletions.
    pub async fn close_session(&self, session_id: &str) -> Option<Session> {
        let guard = self.session_lock.lock(session_id).await;
        let Some(session) = self.sessions.close(session_id).await else {
            drop(guard);
            self.session_lock.forget(session_id);
            return None;
        };

        let failed = self.delete_blobs(session.ledger.entries()).await;
        match self.storage.list_objects(session_id).await {
            Ok(orphans) => {
                for key in orphans {
                    if let Err(e) = self.storage.delete_file(&key).await {
                        tracing::error!("Failed to delete orphaned blob {}: {:?}", key, e);
                    }
                }
            }
            Err(e) => tracing::error!("Failed to list blobs of session {}: {:?}", session_id, e),
        }

        tracing::info!(
            "Session closed for {} ({} staged files discarded, {} delete failures)",
            session.username,
            session.ledger.len(),
            failed
        );

        drop(guard);
        self.session_lock.forget(session_id);
        Some(session)
    }

    /// Current ledger in merge order.
    pub async fn list(&self, session_id: &str) -> Result<Vec<StagedFile>, StagingError> {
        let _guard = self.session_lock.lock(session_id).await;
        let ledger = self.load_ledger(session_id).await?;
        Ok(ledger.entries().to_vec())
    }

    async fn load_ledger(&self, session_id: &str) -> Result<StagingLedger, StagingError> {
        self.sessions
            .get(session_id)
            .await
            .ok_or(StagingError::SessionClosed)
    }

    async fn store_ledger(
        &self,
        session_id: &str,
        ledger: StagingLedger,
    ) -> Result<(), StagingError> {
        if self.sessions.put(session_id, ledger).await {
            Ok(())
        } else {
            Err(StagingError::SessionClosed)
        }
    }

    /// Best-effort deletion of the blobs behind `files`. A missing blob is
    /// logged and skipped; other failures are logged and counted.
    async fn delete_blobs(&self, files: &[StagedFile]) -> usize {
        let mut failures = 0;
        for file in files {
            match self.storage.delete_file(&file.storage_key).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(
                        "Blob for staged file {} was already missing: {}",
                        file.id,
                        file.storage_key
                    );
                }
                Err(e) => {
                    failures += 1;
                    tracing::error!(
                        "Failed to delete blob for staged file {}: {:?}",
                        file.id,
                        e
                    );
                }
            }
        }
        failures
    }
}
