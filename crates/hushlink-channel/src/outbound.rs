//! The teloxide-backed side of the gateway seam: rendering relay
//! instructions into Telegram API calls.

use async_trait::async_trait;
use hushlink_relay::{ControlButton, GatewayError, MessageGateway};
use hushlink_types::{ChatId, Content, MessageId};
use teloxide::prelude::*;
use teloxide::types::{
    ChatId as TgChatId, FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile,
    InputPollOption, MessageId as TgMessageId, ReplyParameters,
};
use tracing::warn;

/// Telegram implementation of the engine's transport seam.
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn keyboard(controls: &[ControlButton]) -> Option<InlineKeyboardMarkup> {
    if controls.is_empty() {
        return None;
    }
    let row: Vec<InlineKeyboardButton> = controls
        .iter()
        .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.token.encode()))
        .collect();
    Some(InlineKeyboardMarkup::new([row]))
}

fn reply_parameters(reply_to: MessageId) -> ReplyParameters {
    ReplyParameters::new(TgMessageId(reply_to as i32))
}

fn input_file(file_id: &str) -> InputFile {
    InputFile::file_id(FileId(file_id.to_string()))
}

/// Prefix a caption with the relay header, keeping both optional.
fn compose_caption(header: Option<&str>, caption: Option<&str>) -> Option<String> {
    match (header, caption) {
        (Some(header), Some(caption)) => Some(format!("{}\n\n{}", header, caption)),
        (Some(header), None) => Some(header.to_string()),
        (None, Some(caption)) => Some(caption.to_string()),
        (None, None) => None,
    }
}

fn to_gateway_error(error: teloxide::RequestError) -> GatewayError {
    match &error {
        teloxide::RequestError::Api(api_error) => GatewayError::Unreachable(api_error.to_string()),
        _ => GatewayError::Transport(error.to_string()),
    }
}

#[async_trait]
impl MessageGateway for TelegramGateway {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        controls: &[ControlButton],
    ) -> Result<MessageId, GatewayError> {
        let mut request = self.bot.send_message(TgChatId(chat_id), text);
        if let Some(markup) = keyboard(controls) {
            request = request.reply_markup(markup);
        }
        let message = request.await.map_err(to_gateway_error)?;
        Ok(message.id.0 as i64)
    }

    async fn send_content(
        &self,
        chat_id: ChatId,
        content: &Content,
        header: Option<&str>,
        controls: &[ControlButton],
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, GatewayError> {
        let chat = TgChatId(chat_id);
        let markup = keyboard(controls);

        let message = match content {
            Content::Text(text) => {
                let text = match header {
                    Some(header) => format!("{}\n\n{}", header, text),
                    None => text.clone(),
                };
                let mut request = self.bot.send_message(chat, text);
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                if let Some(reply_to) = reply_to {
                    request = request.reply_parameters(reply_parameters(reply_to));
                }
                request.await.map_err(to_gateway_error)?
            }
            Content::Photo { file_id, caption } => {
                let mut request = self.bot.send_photo(chat, input_file(file_id));
                if let Some(caption) = compose_caption(header, caption.as_deref()) {
                    request = request.caption(caption);
                }
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                if let Some(reply_to) = reply_to {
                    request = request.reply_parameters(reply_parameters(reply_to));
                }
                request.await.map_err(to_gateway_error)?
            }
            Content::Video { file_id, caption } => {
                let mut request = self.bot.send_video(chat, input_file(file_id));
                if let Some(caption) = compose_caption(header, caption.as_deref()) {
                    request = request.caption(caption);
                }
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                if let Some(reply_to) = reply_to {
                    request = request.reply_parameters(reply_parameters(reply_to));
                }
                request.await.map_err(to_gateway_error)?
            }
            Content::Voice { file_id, caption } => {
                let mut request = self.bot.send_voice(chat, input_file(file_id));
                if let Some(caption) = compose_caption(header, caption.as_deref()) {
                    request = request.caption(caption);
                }
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                if let Some(reply_to) = reply_to {
                    request = request.reply_parameters(reply_parameters(reply_to));
                }
                request.await.map_err(to_gateway_error)?
            }
            Content::Document { file_id, caption } => {
                let mut request = self.bot.send_document(chat, input_file(file_id));
                if let Some(caption) = compose_caption(header, caption.as_deref()) {
                    request = request.caption(caption);
                }
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                if let Some(reply_to) = reply_to {
                    request = request.reply_parameters(reply_parameters(reply_to));
                }
                request.await.map_err(to_gateway_error)?
            }
            Content::Audio { file_id, caption } => {
                let mut request = self.bot.send_audio(chat, input_file(file_id));
                if let Some(caption) = compose_caption(header, caption.as_deref()) {
                    request = request.caption(caption);
                }
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                if let Some(reply_to) = reply_to {
                    request = request.reply_parameters(reply_parameters(reply_to));
                }
                request.await.map_err(to_gateway_error)?
            }
            Content::VideoNote { file_id } => {
                // No caption support; the header follows as its own
                // message and replies resolve against the media message.
                let mut request = self.bot.send_video_note(chat, input_file(file_id));
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                if let Some(reply_to) = reply_to {
                    request = request.reply_parameters(reply_parameters(reply_to));
                }
                let message = request.await.map_err(to_gateway_error)?;
                if let Some(header) = header {
                    if let Err(error) = self.bot.send_message(chat, header).await {
                        warn!("header follow-up to {} failed: {}", chat_id, error);
                    }
                }
                message
            }
            Content::Sticker { file_id } => {
                let mut request = self.bot.send_sticker(chat, input_file(file_id));
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                if let Some(reply_to) = reply_to {
                    request = request.reply_parameters(reply_parameters(reply_to));
                }
                let message = request.await.map_err(to_gateway_error)?;
                if let Some(header) = header {
                    if let Err(error) = self.bot.send_message(chat, header).await {
                        warn!("header follow-up to {} failed: {}", chat_id, error);
                    }
                }
                message
            }
            Content::Poll {
                question,
                options,
                allows_multiple_answers,
            } => {
                if let Some(header) = header {
                    if let Err(error) = self.bot.send_message(chat, header).await {
                        warn!("header lead-in to {} failed: {}", chat_id, error);
                    }
                }
                let mut request = self.bot.send_poll(
                    chat,
                    question.clone(),
                    options.iter().cloned().map(InputPollOption::new),
                );
                request = request.allows_multiple_answers(*allows_multiple_answers);
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                if let Some(reply_to) = reply_to {
                    request = request.reply_parameters(reply_parameters(reply_to));
                }
                request.await.map_err(to_gateway_error)?
            }
        };

        Ok(message.id.0 as i64)
    }

    async fn edit_controls(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        controls: &[ControlButton],
    ) -> Result<(), GatewayError> {
        let request = self
            .bot
            .edit_message_reply_markup(TgChatId(chat_id), TgMessageId(message_id as i32));
        match keyboard(controls) {
            Some(markup) => request.reply_markup(markup).await.map_err(to_gateway_error)?,
            None => request.await.map_err(to_gateway_error)?,
        };
        Ok(())
    }
}
