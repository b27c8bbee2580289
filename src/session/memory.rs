//! In-memory session store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persona::Archetype;
use crate::session::{Session, SessionStore};

/// Process-local store backed by a `RwLock`ed map.
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Session>>,
    timeout: Duration,
    default_archetype: Archetype,
}

impl MemoryStore {
    pub fn new(timeout: Duration, default_archetype: Archetype) -> Self {
        info!("Initialized in-memory session store");
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout,
            default_archetype,
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(id) {
            Some(session) if session.is_expired(self.timeout) => {
                info!(session_id = id, "session expired, dropping");
                sessions.remove(id);
                Ok(None)
            }
            Some(session) => Ok(Some(session.clone())),
            None => Ok(None),
        }
    }

    async fn get_or_create(&self, id: &str) -> Result<(Session, bool), StoreError> {
        if let Some(session) = self.get(id).await? {
            return Ok((session, false));
        }
        let session = Session::new(id, self.default_archetype);
        self.sessions
            .write()
            .await
            .insert(id.to_string(), session.clone());
        info!(session_id = id, "created new session");
        Ok((session, true))
    }

    async fn update(&self, mut session: Session) -> Result<(), StoreError> {
        session.version += 1;
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(session_id = id, "deleted session");
        }
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.sessions.read().await.len())
    }

    async fn sweep_expired(&self) -> Result<usize, StoreError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(self.timeout));
        let dropped = before - sessions.len();
        if dropped > 0 {
            debug!(dropped, "swept expired sessions");
        }
        Ok(dropped)
    }
}
