//! Process-wide map of live interview connections
//!
//! Sessions register on accept and deregister when their loop ends. The
//! registry can reach every live session to notify and cancel it at shutdown.

use chrono::{DateTime, Utc};
use icoach_common::events::ServerEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What the registry keeps per live session
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub candidate_id: Option<String>,
    pub connected_at: DateTime<Utc>,
    outbound: mpsc::Sender<ServerEvent>,
    cancel: CancellationToken,
}

/// Summary row for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionInfo {
    pub session_id: Uuid,
    pub candidate_id: Option<String>,
    pub connected_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<Uuid, ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a session id for a new connection
    ///
    /// Returns the id and the token that ends the session's loop.
    pub async fn register(
        &self,
        candidate_id: Option<String>,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> (Uuid, CancellationToken) {
        let session_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let handle = ConnectionHandle {
            candidate_id: candidate_id.clone(),
            connected_at: Utc::now(),
            outbound,
            cancel: cancel.clone(),
        };

        let mut connections = self.connections.write().await;
        connections.insert(session_id, handle);
        info!(
            session_id = %session_id,
            candidate_id = candidate_id.as_deref().unwrap_or("-"),
            active = connections.len(),
            "Session registered"
        );

        (session_id, cancel)
    }

    /// Remove a session. Returns false if it was not registered.
    pub async fn deregister(&self, session_id: Uuid) -> bool {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(&session_id).is_some();
        if removed {
            info!(session_id = %session_id, active = connections.len(), "Session deregistered");
        }
        removed
    }

    pub async fn contains(&self, session_id: Uuid) -> bool {
        self.connections.read().await.contains_key(&session_id)
    }

    pub async fn active_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn list(&self) -> Vec<ConnectionInfo> {
        let mut rows: Vec<ConnectionInfo> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(id, handle)| ConnectionInfo {
                session_id: *id,
                candidate_id: handle.candidate_id.clone(),
                connected_at: handle.connected_at,
            })
            .collect();
        rows.sort_by_key(|row| row.connected_at);
        rows
    }

    /// Notify every live session with a status event, then cancel it
    ///
    /// Notification is best effort: a session whose outbound queue is full is
    /// cancelled without the message. Returns the number of sessions cancelled.
    pub async fn shutdown_all(&self, message: &str) -> usize {
        let handles: Vec<(Uuid, ConnectionHandle)> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect();

        for (session_id, handle) in &handles {
            if let Err(e) = handle.outbound.try_send(ServerEvent::status(message)) {
                warn!(session_id = %session_id, "Shutdown notice not delivered: {}", e);
            }
            handle.cancel.cancel();
            debug!(session_id = %session_id, "Session cancelled");
        }

        if !handles.is_empty() {
            info!(sessions = handles.len(), "Cancelled live sessions");
        }
        handles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_deregister() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(4);

        let (id, _cancel) = registry.register(Some("cand-1".to_string()), tx).await;
        assert!(registry.contains(id).await);
        assert_eq!(registry.active_count().await, 1);
        assert_eq!(registry.list().await[0].candidate_id.as_deref(), Some("cand-1"));

        assert!(registry.deregister(id).await);
        assert!(!registry.deregister(id).await);
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(4);
        let (a, _) = registry.register(None, tx.clone()).await;
        let (b, _) = registry.register(None, tx).await;
        assert_ne!(a, b);
        assert_eq!(registry.active_count().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(4);

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            let tx = tx.clone();
            tasks.push(tokio::spawn(async move {
                let (id, _) = registry.register(None, tx).await;
                id
            }));
        }
        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        assert_eq!(registry.active_count().await, 32);

        for id in ids {
            registry.deregister(id).await;
        }
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_notifies_and_cancels() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::channel(4);
        let (_id, cancel) = registry.register(None, tx).await;

        assert_eq!(registry.shutdown_all("Server shutting down").await, 1);
        assert!(cancel.is_cancelled());
        assert_eq!(rx.recv().await, Some(ServerEvent::status("Server shutting down")));
    }
}
