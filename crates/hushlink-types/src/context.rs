use crate::{ChatId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One relayed message instance that may later receive a swipe-reply.
///
/// Keyed by `(gateway_message_id, recipient_chat_id)`. The counterpart
/// identity stays server-side only; nothing in the delivered message
/// carries it. A successful reply records a fresh context with the roles
/// swapped, so a thread is a linked sequence of contexts rather than a
/// mutable object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageContext {
    /// Transport id of the message as delivered to the recipient.
    pub gateway_message_id: MessageId,
    pub recipient_chat_id: ChatId,
    /// Real identity of whoever sent the content behind this message.
    pub counterpart_chat_id: ChatId,
    /// Transport id of the counterpart's original inbound message, used to
    /// thread the next hop as a reply on the counterpart's side.
    pub counterpart_source_message_id: MessageId,
    pub created_at: DateTime<Utc>,
}

impl MessageContext {
    pub fn new(
        gateway_message_id: MessageId,
        recipient_chat_id: ChatId,
        counterpart_chat_id: ChatId,
        counterpart_source_message_id: MessageId,
    ) -> Self {
        Self {
            gateway_message_id,
            recipient_chat_id,
            counterpart_chat_id,
            counterpart_source_message_id,
            created_at: Utc::now(),
        }
    }
}
