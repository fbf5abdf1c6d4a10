//! Candidate and session persistence
//!
//! Sessions only need `persist` to be best effort: a failed write is logged by
//! the caller and never holds up the client. When the database cannot be
//! opened the service runs against [`DetachedSessionStore`].

pub mod sqlite;

pub use sqlite::SqliteSessionStore;

use async_trait::async_trait;
use icoach_common::models::{Candidate, NewCandidate, SessionRecord, SessionSummary};
use icoach_common::{Error, Result};
use uuid::Uuid;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// False when writes are known to be rejected
    fn is_online(&self) -> bool;

    /// Register a candidate, returning the new candidate id
    async fn save_candidate(&self, candidate: &NewCandidate) -> Result<String>;

    async fn get_candidate(&self, candidate_id: &str) -> Result<Option<Candidate>>;

    async fn persist(&self, record: &SessionRecord) -> Result<()>;

    async fn load_session(&self, session_id: Uuid) -> Result<Option<SessionRecord>>;

    /// Newest first
    async fn list_sessions(&self, limit: u32) -> Result<Vec<SessionSummary>>;
}

/// Store used when no database is reachable
#[derive(Debug, Clone, Default)]
pub struct DetachedSessionStore {
    reason: String,
}

impl DetachedSessionStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    fn unavailable(&self) -> Error {
        Error::Unavailable(format!("session store detached: {}", self.reason))
    }
}

#[async_trait]
impl SessionStore for DetachedSessionStore {
    fn is_online(&self) -> bool {
        false
    }

    async fn save_candidate(&self, _candidate: &NewCandidate) -> Result<String> {
        Err(self.unavailable())
    }

    async fn get_candidate(&self, _candidate_id: &str) -> Result<Option<Candidate>> {
        Err(self.unavailable())
    }

    async fn persist(&self, _record: &SessionRecord) -> Result<()> {
        Err(self.unavailable())
    }

    async fn load_session(&self, _session_id: Uuid) -> Result<Option<SessionRecord>> {
        Err(self.unavailable())
    }

    async fn list_sessions(&self, _limit: u32) -> Result<Vec<SessionSummary>> {
        Err(self.unavailable())
    }
}
