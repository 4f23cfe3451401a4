use crate::models::{Principal, Session, StagingLedger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// Server-side session records. Ledgers are read and written whole; callers
/// serialize read-modify-write cycles per session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Starts a session for `principal` with an empty ledger, valid until
    /// `expires_at`.
    async fn open(&self, principal: &Principal, expires_at: DateTime<Utc>) -> Session;
    /// `false` once the session was closed or has expired.
    async fn is_open(&self, session_id: &str) -> bool;
    /// Ids of sessions whose lifetime ended before `now` but which were
    /// never closed.
    async fn expired(&self, now: DateTime<Utc>) -> Vec<String>;
    /// `None` when the session does not exist (never opened or closed).
    async fn get(&self, session_id: &str) -> Option<StagingLedger>;
    /// Replaces the ledger. Returns `false` when the session is gone.
    async fn put(&self, session_id: &str, ledger: StagingLedger) -> bool;
    /// Ends the session and hands back its final state.
    async fn close(&self, session_id: &str) -> Option<Session>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn open(&self, principal: &Principal, expires_at: DateTime<Utc>) -> Session {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            username: principal.username.clone(),
            ledger: StagingLedger::new(),
            created_at: Utc::now(),
            expires_at,
        };
        self.sessions.insert(session.id.clone(), session.clone());
        tracing::info!(
            "Session opened for {} ({} active)",
            principal.username,
            self.sessions.len()
        );
        session
    }

    async fn is_open(&self, session_id: &str) -> bool {
        self.sessions
            .get(session_id)
            .is_some_and(|s| !s.is_expired(Utc::now()))
    }

    async fn expired(&self, now: DateTime<Utc>) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect()
    }

    async fn get(&self, session_id: &str) -> Option<StagingLedger> {
        self.sessions.get(session_id).map(|s| s.ledger.clone())
    }

    async fn put(&self, session_id: &str, ledger: StagingLedger) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                session.ledger = ledger;
                true
            }
            None => false,
        }
    }

    async fn close(&self, session_id: &str) -> Option<Session> {
        self.sessions.remove(session_id).map(|(_, session)| session)
    }
}
