use hushlink_types::ChatId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-chat-id mutual exclusion for read-modify-write sequences.
///
/// The transport dispatches updates for different chats concurrently;
/// this map is the explicit replacement for the source's single-threaded
/// event loop. Counter updates on the *other* party of a relay are atomic
/// SQL increments and take no lock.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<ChatId, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `chat_id`, waiting if another in-flight
    /// handler holds it.
    pub async fn acquire(&self, chat_id: ChatId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inner = self.inner.lock().await;
            inner
                .entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
