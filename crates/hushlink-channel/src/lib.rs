//! Hushlink Channel - Telegram adapter
//!
//! Thin glue between teloxide and the relay engine: command parsing,
//! update-to-event conversion and the outbound gateway implementation.

mod outbound;

pub use outbound::TelegramGateway;

use anyhow::{anyhow, Result};
use hushlink_persistence::RelayStore;
use hushlink_relay::{Command as RelayCommand, Event, RelayEngine, RelayOptions};
use hushlink_types::Content;
use std::sync::Arc;
use teloxide::{error_handlers::LoggingErrorHandler, prelude::*, utils::command::BotCommands};
use tracing::info;

/// Telegram channel service
pub struct TelegramService {
    bot: Bot,
    store: RelayStore,
    opts: RelayOptions,
}

/// Bot commands
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    #[command(description = "🚀 Start the bot or open an anonymous link")]
    Start(String),
    #[command(description = "🔗 Show your anonymous link")]
    MyLink,
    #[command(description = "📊 Show your stats")]
    Stats,
    #[command(description = "♻️ Change your anonymous link")]
    ChangeLink,
    #[command(description = "🚫 Show your block list")]
    Blocked,
    #[command(description = "📚 Show help")]
    Help,
}

impl TelegramService {
    /// Create a new Telegram service. The relay engine is built in
    /// `run()`, once the bot identity (and thus the deep-link base) is
    /// known.
    pub fn new(token: &str, store: RelayStore, opts: RelayOptions) -> Self {
        let bot = Bot::new(token);
        info!("Telegram service initialized");
        Self { bot, store, opts }
    }

    /// Validate the bot token by making a test API call
    pub async fn validate_token(&self) -> Result<teloxide::types::Me> {
        info!("Validating Telegram bot token...");

        match self.bot.get_me().await {
            Ok(me) => {
                info!("Telegram bot token is valid");
                Ok(me)
            }
            Err(teloxide::RequestError::Api(teloxide::ApiError::InvalidToken)) => Err(anyhow!(
                "Invalid Telegram bot token. Please check TELEGRAM_BOT_TOKEN environment variable \
                or edit ~/.hushlink/hushlink.toml"
            )),
            Err(e) => Err(anyhow!("Failed to validate Telegram bot token: {}", e)),
        }
    }

    /// Run the Telegram service (this is a blocking call)
    pub async fn run(self) -> Result<()> {
        let me = self.validate_token().await?;
        let bot_username = me.username().to_string();
        info!("Starting Telegram bot @{}...", bot_username);

        self.bot.set_my_commands(Command::bot_commands()).await?;

        let opts = RelayOptions {
            bot_username,
            ..self.opts
        };
        let gateway = Arc::new(TelegramGateway::new(self.bot.clone()));
        let engine = Arc::new(RelayEngine::new(self.store.clone(), gateway, opts));

        let handler = dptree::entry()
            .branch(
                Update::filter_message()
                    .branch(
                        dptree::entry()
                            .filter_command::<Command>()
                            .endpoint(Self::handle_command),
                    )
                    .branch(dptree::endpoint(Self::handle_message)),
            )
            .branch(Update::filter_callback_query().endpoint(Self::handle_callback));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![engine])
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .build();

        dispatcher.dispatch().await;

        Ok(())
    }

    /// Handle bot commands
    async fn handle_command(
        bot: Bot,
        msg: Message,
        cmd: Command,
        engine: Arc<RelayEngine>,
    ) -> Result<(), teloxide::RequestError> {
        let from = msg.chat.id.0;

        let relay_command = match cmd {
            Command::Start(payload) => {
                let payload = payload.trim().to_string();
                RelayCommand::Start {
                    payload: (!payload.is_empty()).then_some(payload),
                }
            }
            Command::MyLink => RelayCommand::MyLink,
            Command::Stats => RelayCommand::Stats,
            Command::ChangeLink => RelayCommand::ChangeLink,
            Command::Blocked => RelayCommand::Blocked,
            Command::Help => {
                bot.send_message(msg.chat.id, Command::descriptions().to_string())
                    .await?;
                return Ok(());
            }
        };

        let _ = engine
            .handle(Event::Command {
                from,
                command: relay_command,
            })
            .await;
        Ok(())
    }

    /// Handle non-command messages: free text, media, swipe-replies
    async fn handle_message(
        msg: Message,
        engine: Arc<RelayEngine>,
    ) -> Result<(), teloxide::RequestError> {
        // Unknown slash commands never enter the relay path.
        if msg.text().map(|text| text.starts_with('/')).unwrap_or(false) {
            return Ok(());
        }

        let event = Event::Content {
            from: msg.chat.id.0,
            message_id: msg.id.0 as i64,
            content: content_from(&msg),
            replied_to: msg.reply_to_message().map(|replied| replied.id.0 as i64),
        };
        let _ = engine.handle(event).await;
        Ok(())
    }

    /// Handle inline button presses
    async fn handle_callback(
        bot: Bot,
        q: CallbackQuery,
        engine: Arc<RelayEngine>,
    ) -> Result<(), teloxide::RequestError> {
        let origin = q
            .regular_message()
            .map(|message| (message.chat.id.0, message.id.0 as i64));
        let payload = q.data.clone();

        // Clear the button spinner before any relay work.
        bot.answer_callback_query(q.id).await?;

        let (Some((from, message_id)), Some(payload)) = (origin, payload) else {
            return Ok(());
        };

        let _ = engine
            .handle(Event::Control {
                from,
                message_id,
                payload,
            })
            .await;
        Ok(())
    }
}

/// Map an inbound Telegram message onto relayable content. `None` means
/// the kind cannot be carried and the engine decides what to tell the
/// user.
fn content_from(msg: &Message) -> Option<Content> {
    if let Some(text) = msg.text() {
        return Some(Content::Text(text.to_string()));
    }

    let caption = msg.caption().map(|caption| caption.to_string());

    if let Some(sizes) = msg.photo() {
        // Telegram sends every thumbnail size; the last one is the
        // original.
        let largest = sizes.last()?;
        return Some(Content::Photo {
            file_id: largest.file.id.0.clone(),
            caption,
        });
    }
    if let Some(video) = msg.video() {
        return Some(Content::Video {
            file_id: video.file.id.0.clone(),
            caption,
        });
    }
    if let Some(voice) = msg.voice() {
        return Some(Content::Voice {
            file_id: voice.file.id.0.clone(),
            caption,
        });
    }
    if let Some(video_note) = msg.video_note() {
        return Some(Content::VideoNote {
            file_id: video_note.file.id.0.clone(),
        });
    }
    if let Some(sticker) = msg.sticker() {
        return Some(Content::Sticker {
            file_id: sticker.file.id.0.clone(),
        });
    }
    if let Some(document) = msg.document() {
        return Some(Content::Document {
            file_id: document.file.id.0.clone(),
            caption,
        });
    }
    if let Some(audio) = msg.audio() {
        return Some(Content::Audio {
            file_id: audio.file.id.0.clone(),
            caption,
        });
    }
    if let Some(poll) = msg.poll() {
        return Some(Content::Poll {
            question: poll.question.clone(),
            options: poll.options.iter().map(|option| option.text.clone()).collect(),
            allows_multiple_answers: poll.allows_multiple_answers,
        });
    }

    None
}
