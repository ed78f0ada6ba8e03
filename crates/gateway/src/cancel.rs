//! Per-chat cancellation tokens (§5).
//!
//! Each running turn gets a `CancelToken`. Calling `cancel()` on it signals
//! the turn loop to stop cleanly at its next check point.
//!
//! Trimmed from the teacher's `runtime/cancel.rs`: chats here aren't
//! nested the way the teacher's agent runs/sub-agent executions are, so
//! the group/cascading-cancellation mechanism has no counterpart and is
//! dropped — one chat, one token.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks active cancellation tokens per chat id.
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl Default for CancelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelMap {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Create and register a new cancel token for a chat, replacing any
    /// existing one (a fresh turn supersedes a previous, now-finished one).
    pub fn register(&self, chat_key: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(chat_key.to_owned(), token.clone());
        token
    }

    /// Cancel the running turn for a chat. Returns true if a token was found.
    pub fn cancel(&self, chat_key: &str) -> bool {
        if let Some(token) = self.tokens.lock().get(chat_key) {
            token.cancel();
            true
        } else {
            false
        }
    }

    /// Remove the token for a chat (called when a turn completes).
    pub fn remove(&self, chat_key: &str) {
        self.tokens.lock().remove(chat_key);
    }

    /// Check if a chat has an active (running) turn.
    pub fn is_running(&self, chat_key: &str) -> bool {
        self.tokens.lock().contains_key(chat_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_lifecycle() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_map_register_and_cancel() {
        let map = CancelMap::new();
        let token = map.register("c1");
        assert!(!token.is_cancelled());
        assert!(map.is_running("c1"));

        assert!(map.cancel("c1"));
        assert!(token.is_cancelled());

        map.remove("c1");
        assert!(!map.is_running("c1"));
        assert!(!map.cancel("c1"));
    }

    #[test]
    fn cancel_nonexistent_chat_returns_false() {
        let map = CancelMap::new();
        assert!(!map.cancel("does_not_exist"));
    }

    #[test]
    fn is_running_false_for_unregistered() {
        let map = CancelMap::new();
        assert!(!map.is_running("ghost"));
    }

    #[test]
    fn remove_is_idempotent() {
        let map = CancelMap::new();
        map.register("c1");
        map.remove("c1");
        map.remove("c1");
        assert!(!map.is_running("c1"));
    }

    #[test]
    fn register_replaces_previous_token() {
        let map = CancelMap::new();
        let old_token = map.register("c1");
        let new_token = map.register("c1");

        assert!(!old_token.is_cancelled());
        assert!(!new_token.is_cancelled());

        map.cancel("c1");
        assert!(new_token.is_cancelled());
    }

    #[test]
    fn cancel_token_clone_shares_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn cancel_token_default() {
        let token = CancelToken::default();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_map_default_trait() {
        let map = CancelMap::default();
        assert!(!map.is_running("any"));
    }
}
