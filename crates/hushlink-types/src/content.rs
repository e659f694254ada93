use serde::{Deserialize, Serialize};

/// Content of a relayable message.
///
/// One variant per Telegram media kind the bot forwards; the relay path is
/// written once against this type instead of once per kind. File ids are
/// the transport's opaque handles and are reusable across chats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Content {
    Text(String),
    Photo { file_id: String, caption: Option<String> },
    Video { file_id: String, caption: Option<String> },
    Voice { file_id: String, caption: Option<String> },
    VideoNote { file_id: String },
    Sticker { file_id: String },
    Document { file_id: String, caption: Option<String> },
    Audio { file_id: String, caption: Option<String> },
    Poll {
        question: String,
        options: Vec<String>,
        allows_multiple_answers: bool,
    },
}

impl Content {
    /// The user-authored text carried by this content, if any (message
    /// text or media caption). This is what length limits and the keyword
    /// filter apply to.
    pub fn text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Photo { caption, .. }
            | Content::Video { caption, .. }
            | Content::Voice { caption, .. }
            | Content::Document { caption, .. }
            | Content::Audio { caption, .. } => caption.as_deref(),
            Content::Poll { question, .. } => Some(question),
            Content::VideoNote { .. } | Content::Sticker { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Content::Text(_) => "text",
            Content::Photo { .. } => "photo",
            Content::Video { .. } => "video",
            Content::Voice { .. } => "voice",
            Content::VideoNote { .. } => "video_note",
            Content::Sticker { .. } => "sticker",
            Content::Document { .. } => "document",
            Content::Audio { .. } => "audio",
            Content::Poll { .. } => "poll",
        }
    }
}
