use async_trait::async_trait;
use hushlink_types::{ChatId, Content, ControlToken, MessageId};
use thiserror::Error;

/// Transport-level delivery errors
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The recipient cannot be reached (left the bot, blocked it, ...)
    #[error("recipient unreachable: {0}")]
    Unreachable(String),

    /// Any other transport failure
    #[error("transport error: {0}")]
    Transport(String),
}

/// An inline control offered alongside an outbound message.
#[derive(Debug, Clone)]
pub struct ControlButton {
    pub label: String,
    pub token: ControlToken,
}

impl ControlButton {
    pub fn new(label: impl Into<String>, token: ControlToken) -> Self {
        Self {
            label: label.into(),
            token,
        }
    }
}

/// Narrow seam to the messaging transport.
///
/// The engine relays exclusively through this trait; the Telegram adapter
/// implements it over teloxide and tests substitute a recording mock.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Send plain text, returning the transport id of the delivered
    /// message.
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        controls: &[ControlButton],
    ) -> std::result::Result<MessageId, GatewayError>;

    /// Send relayed content with an optional header line, optionally
    /// threaded as a transport reply. Returns the id of the delivered
    /// content message (the id a future swipe-reply will carry).
    async fn send_content(
        &self,
        chat_id: ChatId,
        content: &Content,
        header: Option<&str>,
        controls: &[ControlButton],
        reply_to: Option<MessageId>,
    ) -> std::result::Result<MessageId, GatewayError>;

    /// Replace the inline controls on an already-delivered message.
    async fn edit_controls(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        controls: &[ControlButton],
    ) -> std::result::Result<(), GatewayError>;
}
