use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// One uploaded document waiting in a session's ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StagedFile {
    pub id: String,
    pub display_name: String,
    /// Key of the blob inside the storage backend. Never sent to clients.
    pub storage_key: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReorderError {
    #[error("Expected {expected} file ids but received {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("File id '{0}' is listed more than once")]
    Duplicate(String),
    #[error("File id '{0}' is not staged in this session")]
    Unknown(String),
}

/// Ordered list of staged files for one session. Position is merge order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagingLedger {
    entries: Vec<StagedFile>,
}

impl StagingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[StagedFile] {
        &self.entries
    }

    pub fn push(&mut self, file: StagedFile) {
        self.entries.push(file);
    }

    pub fn get(&self, id: &str) -> Option<&StagedFile> {
        self.entries.iter().find(|f| f.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<StagedFile> {
        let index = self.entries.iter().position(|f| f.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Empties the ledger, handing back everything it held in order.
    pub fn take_all(&mut self) -> Vec<StagedFile> {
        std::mem::take(&mut self.entries)
    }

    /// Rearranges entries to follow `order`, which must name every staged id
    /// exactly once. The ledger is left untouched on error.
    pub fn reorder(&mut self, order: &[String]) -> Result<(), ReorderError> {
        if order.len() != self.entries.len() {
            return Err(ReorderError::LengthMismatch {
                expected: self.entries.len(),
                actual: order.len(),
            });
        }

        let mut seen = HashSet::with_capacity(order.len());
        for id in order {
            if !seen.insert(id.as_str()) {
                return Err(ReorderError::Duplicate(id.clone()));
            }
            if self.get(id).is_none() {
                return Err(ReorderError::Unknown(id.clone()));
            }
        }

        let mut remaining = std::mem::take(&mut self.entries);
        for id in order {
            if let Some(index) = remaining.iter().position(|f| &f.id == id) {
                self.entries.push(remaining.swap_remove(index));
            }
        }
        Ok(())
    }
}

/// Identity returned by a successful credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
}

/// Server-side state bound to one login.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub username: String,
    pub ledger: StagingLedger,
    pub created_at: DateTime<Utc>,
    /// Matches the `exp` of the token issued for this session.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
