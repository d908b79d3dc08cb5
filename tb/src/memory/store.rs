//! SessionStore - process-wide map of session transcripts
//!
//! Each session sits behind its own async mutex. Holding that lock across a
//! read-render-generate-append sequence gives one in-flight generation per
//! session while different sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::session::{Session, Turn};
use crate::llm::Role;

/// Shared handle to one session
pub type SessionHandle = Arc<Mutex<Session>>;

/// In-memory session transcripts keyed by opaque session id
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    /// Most recent turns kept per session (0 keeps everything)
    max_turns: usize,
}

impl SessionStore {
    pub fn new(max_turns: usize) -> Self {
        debug!(max_turns, "SessionStore::new: called");
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns,
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Get the session for `session_id`, creating it on first reference
    ///
    /// Any string is accepted as a key, including the empty string.
    pub async fn get_or_create(&self, session_id: &str) -> SessionHandle {
        debug!(%session_id, "get_or_create: called");
        if let Some(handle) = self.sessions.read().await.get(session_id) {
            return handle.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!(%session_id, "Created session");
                Arc::new(Mutex::new(Session::new(session_id)))
            })
            .clone()
    }

    /// Append one turn to a session
    pub async fn append(&self, session_id: &str, role: Role, text: impl Into<String>) {
        debug!(%session_id, %role, "append: called");
        let handle = self.get_or_create(session_id).await;
        handle.lock().await.push(Turn::new(role, text), self.max_turns);
    }

    /// Snapshot of a session's turns (empty for unknown sessions)
    pub async fn history(&self, session_id: &str) -> Vec<Turn> {
        debug!(%session_id, "history: called");
        let handle = self.sessions.read().await.get(session_id).cloned();
        match handle {
            Some(handle) => handle.lock().await.turns().to_vec(),
            None => Vec::new(),
        }
    }

    /// Empty one session's transcript; returns false if the session was unknown
    ///
    /// Waits for an in-flight generation on that session to finish first.
    pub async fn clear(&self, session_id: &str) -> bool {
        debug!(%session_id, "clear: called");
        let handle = self.sessions.read().await.get(session_id).cloned();
        match handle {
            Some(handle) => {
                handle.lock().await.clear();
                info!(%session_id, "Cleared session");
                true
            }
            None => false,
        }
    }

    /// Forget every session
    pub async fn clear_all(&self) {
        debug!("clear_all: called");
        let drained: Vec<SessionHandle> = self.sessions.write().await.drain().map(|(_, h)| h).collect();
        for handle in &drained {
            handle.lock().await.clear();
        }
        info!(count = drained.len(), "Cleared all sessions");
    }

    /// Known session ids, sorted
    pub async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
