use crate::ChatId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a chat currently is in the relay conversation.
///
/// Any step other than `Idle` carries the payload its variant needs, so an
/// awaiting state without a target is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationStep {
    /// Nothing pending; free text is only meaningful as a swipe-reply.
    Idle,
    /// The chat opened someone's deep link and the next content message
    /// will be relayed anonymously to that owner.
    AwaitingAnonymousMessage { target_owner: ChatId },
}

impl ConversationStep {
    pub fn is_idle(&self) -> bool {
        matches!(self, ConversationStep::Idle)
    }
}

/// One registered chat/account.
///
/// Blocked senders live in their own table with set semantics and are not
/// loaded into this struct; the store exposes predicate and count queries
/// instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub chat_id: ChatId,
    /// Public anonymous address of this user, 8 chars over A-Z0-9.
    pub link_code: String,
    pub step: ConversationStep,
    pub messages_sent: i64,
    pub messages_received: i64,
    pub link_clicks: i64,
    /// While set and in the future, every outbound relay from this user
    /// is refused.
    pub auto_blocked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(chat_id: ChatId, link_code: impl Into<String>) -> Self {
        Self {
            chat_id,
            link_code: link_code.into(),
            step: ConversationStep::Idle,
            messages_sent: 0,
            messages_received: 0,
            link_clicks: 0,
            auto_blocked_until: None,
            created_at: Utc::now(),
        }
    }

    /// Whether an automatic block is currently in force.
    pub fn is_auto_blocked(&self, now: DateTime<Utc>) -> bool {
        self.auto_blocked_until.map(|until| until > now).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_record_starts_idle() {
        let user = UserRecord::new(100, "AB12CD34");
        assert!(user.step.is_idle());
        assert_eq!(user.messages_sent, 0);
        assert!(user.auto_blocked_until.is_none());
    }

    #[test]
    fn auto_block_expires() {
        let mut user = UserRecord::new(100, "AB12CD34");
        let now = Utc::now();
        user.auto_blocked_until = Some(now + Duration::hours(1));
        assert!(user.is_auto_blocked(now));
        assert!(!user.is_auto_blocked(now + Duration::hours(2)));
    }
}
