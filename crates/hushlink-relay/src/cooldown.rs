use hushlink_types::ChatId;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Fixed-window admission gate, consulted before any handler runs.
///
/// Monotonic clock only; no timers. Rejected events do not re-arm the
/// window, so a user hammering the bot is admitted again as soon as the
/// window from their last *served* event elapses.
pub struct CooldownGate {
    window: Duration,
    last_served: Mutex<HashMap<ChatId, Instant>>,
}

impl CooldownGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_served: Mutex::new(HashMap::new()),
        }
    }

    /// Admit `chat_id` or return the whole seconds remaining until it
    /// would be admitted.
    pub async fn check(&self, chat_id: ChatId) -> Option<u64> {
        let now = Instant::now();
        let mut last_served = self.last_served.lock().await;

        if let Some(previous) = last_served.get(&chat_id) {
            let elapsed = now.duration_since(*previous);
            if elapsed < self.window {
                let remaining = self.window - elapsed;
                // Round up so "wait 0 seconds" is never reported.
                return Some(((remaining.as_millis() + 999) / 1000) as u64);
            }
        }
        last_served.insert(chat_id, now);
        None
    }
}
