//! Relay registry (C5): the process-wide `client_id -> session` map.
//!
//! A single `tokio::sync::Mutex` over the map, as the spec allows —
//! finer-grained locking is a performance choice, not a correctness
//! one. The lock is held only for hash-map operations, never across a
//! socket read or write, matching the teacher's habit of never
//! blocking inside a held lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio::sync::Mutex;

use crate::protocol::DirectoryEntry;
use crate::session::{ClientId, SessionHandle};

pub struct Registry<W> {
    sessions: Mutex<HashMap<ClientId, Arc<SessionHandle<W>>>>,
    next_id: AtomicU64,
}

impl<W: AsyncWrite + Unpin> Registry<W> {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            // Id 0 is reserved for server-originated messages; real
            // client ids start at 1.
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates the next monotonic id. Ids are never reused within
    /// this registry's lifetime, even for clients that never complete
    /// the handshake.
    pub fn allocate_id(&self) -> ClientId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn insert(&self, session: Arc<SessionHandle<W>>) {
        let mut guard = self.sessions.lock().await;
        guard.insert(session.client_id, session);
    }

    pub async fn lookup(&self, id: ClientId) -> Option<Arc<SessionHandle<W>>> {
        let guard = self.sessions.lock().await;
        guard.get(&id).cloned()
    }

    pub async fn remove(&self, id: ClientId) {
        let mut guard = self.sessions.lock().await;
        guard.remove(&id);
    }

    /// Directory snapshot excluding `excluding_id`. Order is
    /// unspecified, matching the spec's test scenario wording.
    pub async fn snapshot_directory(&self, excluding_id: ClientId) -> Vec<DirectoryEntry> {
        let guard = self.sessions.lock().await;
        guard
            .values()
            .filter(|s| s.client_id != excluding_id)
            .map(|s| DirectoryEntry {
                id: s.client_id,
                name: s.display_name.clone(),
            })
            .collect()
    }
}

impl<W: AsyncWrite + Unpin> Default for Registry<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_lookup_remove_round_trip() {
        let registry: Registry<tokio::io::DuplexStream> = Registry::new();
        let (a, _b) = tokio::io::duplex(64);
        let handle = SessionHandle::new(1, "ada".into(), [0u8; 16], [1u8; 16], a);

        registry.insert(Arc::clone(&handle)).await;
        assert!(registry.lookup(1).await.is_some());
        assert!(registry.lookup(2).await.is_none());

        registry.remove(1).await;
        assert!(registry.lookup(1).await.is_none());
    }

    #[tokio::test]
    async fn allocated_ids_are_monotonic_and_start_at_one() {
        let registry: Registry<tokio::io::DuplexStream> = Registry::new();
        assert_eq!(registry.allocate_id(), 1);
        assert_eq!(registry.allocate_id(), 2);
        assert_eq!(registry.allocate_id(), 3);
    }

    #[tokio::test]
    async fn directory_snapshot_excludes_requester() {
        let registry: Registry<tokio::io::DuplexStream> = Registry::new();
        let (a, _) = tokio::io::duplex(64);
        let (b, _) = tokio::io::duplex(64);
        registry.insert(SessionHandle::new(1, "a".into(), [0u8; 16], [1u8; 16], a)).await;
        registry.insert(SessionHandle::new(2, "b".into(), [0u8; 16], [1u8; 16], b)).await;

        let dir = registry.snapshot_directory(1).await;
        assert_eq!(dir.len(), 1);
        assert_eq!(dir[0].id, 2);
        assert_eq!(dir[0].name, "b");
    }
}
