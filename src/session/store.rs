//! Backend-agnostic session storage.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::session::Session;

/// Keyed session storage with lazy expiry.
///
/// Implementations must guarantee that concurrent `update` calls for the
/// same id never silently lose a write; the orchestrator additionally
/// serializes whole turns per id (see [`super::SessionLocks`]), so under
/// normal operation each id has a single writer at a time.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a live session. An expired session is deleted as a side effect
    /// and reported as absent.
    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// Fetch a live session or create a fresh one. Returns `true` when the
    /// session was created by this call.
    async fn get_or_create(&self, id: &str) -> Result<(Session, bool), StoreError>;

    /// Persist a mutated session.
    async fn update(&self, session: Session) -> Result<(), StoreError>;

    /// Delete a session. Returns `true` if it existed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Number of live sessions.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Drop expired sessions. Returns how many were removed. The default
    /// suits backends with native TTL.
    async fn sweep_expired(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}
