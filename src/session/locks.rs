//! Per-session turn serialization.
//!
//! Two concurrent requests for the same session id must not interleave
//! their Load→Persist cycles, or turns would merge out of order. Each id
//! gets its own async mutex, held for the whole turn.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Registry of per-session-id locks.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `id`, waiting behind any in-flight turn for the
    /// same id. Turns for different ids proceed independently.
    pub async fn acquire(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop lock entries nobody is waiting on. Called from the expiry sweep
    /// so the registry doesn't grow with every session ever seen.
    pub async fn prune(&self) -> usize {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        // strong_count == 1 means only the registry holds the lock.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        let dropped = before - locks.len();
        if dropped > 0 {
            debug!(dropped, "pruned idle session locks");
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_id_serializes() {
        let locks = Arc::new(SessionLocks::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let locks = Arc::clone(&locks);
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                let _guard = locks.acquire("S1").await;
                order.lock().await.push("first-start");
                tokio::time::sleep(Duration::from_millis(50)).await;
                order.lock().await.push("first-end");
            })
        };

        // Give the first task time to take the lock.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = {
            let locks = Arc::clone(&locks);
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                let _guard = locks.acquire("S1").await;
                order.lock().await.push("second-start");
            })
        };

        first.await.unwrap();
        second.await.unwrap();

        let order = order.lock().await;
        assert_eq!(*order, vec!["first-start", "first-end", "second-start"]);
    }

    #[tokio::test]
    async fn different_ids_do_not_block() {
        let locks = SessionLocks::new();
        let _a = locks.acquire("A").await;
        // Must complete immediately even while A is held.
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("B"))
            .await
            .expect("different id should not block");
    }

    #[tokio::test]
    async fn prune_keeps_held_locks() {
        let locks = SessionLocks::new();
        let guard = locks.acquire("held").await;
        {
            let _temp = locks.acquire("idle").await;
        }

        assert_eq!(locks.prune().await, 1);
        drop(guard);
        assert_eq!(locks.prune().await, 1);
    }
}
