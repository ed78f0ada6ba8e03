//! Per-chat concurrency control (§5).
//!
//! Ensures only one turn runs per chat at a time. A second `submitTurn`/
//! `swipe` arriving while a turn is in-flight waits for the first to
//! finish rather than racing it against the same append-only log.
//!
//! Ported near-verbatim from the teacher's `runtime/session_lock.rs`,
//! keyed by chat id instead of session key — the locking shape doesn't
//! change, only what identifies the thing being locked.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Each chat id maps to a `Semaphore(1)`. Acquiring the permit ensures
/// exclusive access to that chat's log for one turn at a time.
pub struct SessionLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for SessionLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the run lock for a chat. Hold the permit for the duration
    /// of the turn — it auto-releases on drop.
    pub async fn acquire(&self, chat_key: &str) -> Result<OwnedSemaphorePermit, SessionBusy> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(chat_key.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };

        if let Ok(permit) = sem.clone().try_acquire_owned() {
            return Ok(permit);
        }

        sem.acquire_owned().await.map_err(|_| SessionBusy)
    }

    pub fn session_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop locks for chats that aren't actively held.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| sem.available_permits() == 0);
    }
}

#[derive(Debug)]
pub struct SessionBusy;

impl std::fmt::Display for SessionBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chat is busy — a turn is already in progress")
    }
}

impl std::error::Error for SessionBusy {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_access() {
        let map = SessionLockMap::new();
        let permit1 = map.acquire("c1").await.unwrap();
        drop(permit1);
        let permit2 = map.acquire("c1").await.unwrap();
        drop(permit2);
    }

    #[tokio::test]
    async fn different_chats_concurrent() {
        let map = Arc::new(SessionLockMap::new());
        let p1 = map.acquire("c1").await.unwrap();
        let p2 = map.acquire("c2").await.unwrap();
        assert_eq!(map.session_count(), 2);
        drop(p1);
        drop(p2);
    }

    #[tokio::test]
    async fn same_chat_waits() {
        let map = Arc::new(SessionLockMap::new());
        let map2 = map.clone();
        let p1 = map.acquire("c1").await.unwrap();

        let handle = tokio::spawn(async move {
            let _p2 = map2.acquire("c1").await.unwrap();
            42
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        drop(p1);

        let result = handle.await.unwrap();
        assert_eq!(result, 42);
    }
}
