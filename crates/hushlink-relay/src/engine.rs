use crate::cooldown::CooldownGate;
use crate::error::{RelayError, Result};
use crate::filter::ContentFilter;
use crate::gateway::{ControlButton, MessageGateway};
use crate::identity::IdentityRegistry;
use crate::locks::ChatLocks;
use chrono::{Duration as ChronoDuration, Utc};
use hushlink_persistence::RelayStore;
use hushlink_types::{
    ChatId, Content, ControlToken, ConversationStep, MessageContext, MessageId, UserRecord,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const COMPOSE_PROMPT: &str = "🚀 Here you can send an anonymous message to the person who \
     published this link.\n\n\
     ✍️ Write whatever you want to pass on, and in a few seconds they will \
     receive it without knowing who it came from.\n\n\
     You can send photos, videos, 💬 text, 🔊 voice messages, 📷 video notes \
     and ✨ stickers";

const ANON_HEADER: &str = "🤿 You have a new anonymous message! ↩️ Swipe to reply.";
const REPLY_HEADER: &str = "💬 Anonymous reply! ↩️ Swipe to reply.";

const CANCEL_LABEL: &str = "✖️ Cancel";
const COMPOSE_AGAIN_LABEL: &str = "📝 Send another";
const BLOCK_LABEL: &str = "🚫 Block sender";
const CLEAR_BLOCKED_LABEL: &str = "🗑️ Clear block list";

/// Commands the channel adapter forwards to the engine.
#[derive(Debug, Clone)]
pub enum Command {
    /// `/start`, optionally carrying a deep-link payload
    Start { payload: Option<String> },
    /// Show the caller's own link
    MyLink,
    /// Show counters
    Stats,
    /// Reissue the caller's link code
    ChangeLink,
    /// Summarize the block list
    Blocked,
}

/// One inbound event from the messaging gateway.
#[derive(Debug, Clone)]
pub enum Event {
    Command {
        from: ChatId,
        command: Command,
    },
    /// Free text or media. `content` is `None` when the transport message
    /// carries a kind the relay cannot forward.
    Content {
        from: ChatId,
        message_id: MessageId,
        content: Option<Content>,
        replied_to: Option<MessageId>,
    },
    /// An inline button press with its raw payload.
    Control {
        from: ChatId,
        message_id: MessageId,
        payload: String,
    },
}

impl Event {
    fn from_chat(&self) -> ChatId {
        match self {
            Event::Command { from, .. }
            | Event::Content { from, .. }
            | Event::Control { from, .. } => *from,
        }
    }
}

/// Engine tuning, supplied by the binary's configuration.
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Bot username used to render deep links.
    pub bot_username: String,
    pub cooldown: Duration,
    /// Cap on relayed text/caption length.
    pub max_message_length: usize,
    /// Keywords that refuse a relay and arm the auto-block window.
    pub blocked_keywords: Vec<String>,
    pub auto_block_hours: i64,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            bot_username: String::new(),
            cooldown: Duration::from_secs(3),
            max_message_length: 500,
            blocked_keywords: Vec::new(),
            auto_block_hours: 24,
        }
    }
}

/// The conversation state machine.
///
/// One inbound event is interpreted against the sender's current step,
/// the identity registry and the context ledger, relays through the
/// gateway, and only then commits the state mutations the relay implies.
pub struct RelayEngine {
    store: RelayStore,
    gateway: Arc<dyn MessageGateway>,
    identity: IdentityRegistry,
    cooldown: CooldownGate,
    locks: ChatLocks,
    filter: ContentFilter,
    opts: RelayOptions,
}

impl RelayEngine {
    pub fn new(store: RelayStore, gateway: Arc<dyn MessageGateway>, opts: RelayOptions) -> Self {
        Self {
            identity: IdentityRegistry::new(store.clone()),
            cooldown: CooldownGate::new(opts.cooldown),
            locks: ChatLocks::new(),
            filter: ContentFilter::new(opts.blocked_keywords.iter().cloned()),
            store,
            gateway,
            opts,
        }
    }

    /// Process one inbound event to completion. A failing event degrades
    /// to a user-facing notice; the returned error is informational for
    /// callers that want it (tests, logging).
    pub async fn handle(&self, event: Event) -> Result<()> {
        let from = event.from_chat();
        let outcome = self.dispatch(event).await;
        if let Err(relay_error) = &outcome {
            self.notify_failure(from, relay_error).await;
        }
        outcome
    }

    async fn dispatch(&self, event: Event) -> Result<()> {
        if let Some(seconds_remaining) = self.cooldown.check(event.from_chat()).await {
            return Err(RelayError::TooManyRequests { seconds_remaining });
        }

        match event {
            Event::Command { from, command } => match command {
                Command::Start { payload } => self.start(from, payload).await,
                Command::MyLink => self.my_link(from).await,
                Command::Stats => self.stats(from).await,
                Command::ChangeLink => self.change_link(from).await,
                Command::Blocked => self.blocked_summary(from).await,
            },
            Event::Content {
                from,
                message_id,
                content,
                replied_to,
            } => self.content(from, message_id, content, replied_to).await,
            Event::Control {
                from,
                message_id,
                payload,
            } => self.control(from, message_id, &payload).await,
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    async fn start(&self, from: ChatId, payload: Option<String>) -> Result<()> {
        let payload = payload
            .map(|payload| payload.trim().to_string())
            .filter(|payload| !payload.is_empty());

        match payload {
            Some(code) => self.enter_deep_link(from, &code).await,
            None => self.welcome(from).await,
        }
    }

    async fn welcome(&self, from: ChatId) -> Result<()> {
        let _guard = self.locks.acquire(from).await;
        let user = self.ensure_user(from).await?;
        let text = format!(
            "🚀 Start receiving anonymous messages right now!\n\n\
             Your link:\n👉 {}\n\n\
             Put this link ☝️ in your profile bio to start receiving \
             anonymous messages 💬",
            self.link_for(&user.link_code)
        );
        self.send_plain(from, &text).await
    }

    async fn enter_deep_link(&self, from: ChatId, code: &str) -> Result<()> {
        let Some(owner) = self.identity.resolve(code).await? else {
            return Err(RelayError::InvalidLink);
        };

        let _guard = self.locks.acquire(from).await;

        if owner == from {
            let user = self.ensure_user(from).await?;
            let text = format!(
                "This is your own anonymous link — share it with others:\n👉 {}",
                self.link_for(&user.link_code)
            );
            return self.send_plain(from, &text).await;
        }

        self.ensure_user(from).await?;
        if self.store.is_blocked(owner, from).await? {
            return Err(RelayError::Blocked);
        }

        self.store
            .set_step(
                from,
                &ConversationStep::AwaitingAnonymousMessage { target_owner: owner },
            )
            .await?;
        self.store.increment_link_clicks(owner).await?;
        self.send_compose_prompt(from).await
    }

    async fn my_link(&self, from: ChatId) -> Result<()> {
        let user = self.require_user(from).await?;
        let text = format!(
            "Your personal link for anonymous messages:\n👉 {}",
            self.link_for(&user.link_code)
        );
        self.send_plain(from, &text).await
    }

    async fn stats(&self, from: ChatId) -> Result<()> {
        let user = self.require_user(from).await?;
        let blocked = self.store.blocked_count(from).await?;
        let text = format!(
            "📊 Your stats:\n\n\
             📩 Messages received: {}\n\
             📤 Messages sent: {}\n\
             👀 Link opened: {} times\n\
             🚫 Blocked senders: {}\n\
             📅 Registered: {}",
            user.messages_received,
            user.messages_sent,
            user.link_clicks,
            blocked,
            user.created_at.format("%Y-%m-%d"),
        );
        self.send_plain(from, &text).await
    }

    async fn change_link(&self, from: ChatId) -> Result<()> {
        let _guard = self.locks.acquire(from).await;
        self.require_user(from).await?;
        let code = self.identity.reissue(from).await?;
        info!("chat {} reissued its link code", from);
        let text = format!(
            "🔗 Link changed!\n\n\
             Your new link:\n👉 {}\n\n\
             The old link no longer works.",
            self.link_for(&code)
        );
        self.send_plain(from, &text).await
    }

    async fn blocked_summary(&self, from: ChatId) -> Result<()> {
        self.require_user(from).await?;
        let count = self.store.blocked_count(from).await?;
        if count == 0 {
            return self.send_plain(from, "✅ Your block list is empty.").await;
        }
        let controls = [ControlButton::new(CLEAR_BLOCKED_LABEL, ControlToken::ClearBlocked)];
        let text = format!("🚫 Blocked senders: {}", count);
        self.gateway
            .send_text(from, &text, &controls)
            .await
            .map_err(|gateway_error| {
                warn!("blocked summary to {} failed: {}", from, gateway_error);
                RelayError::DeliveryFailed
            })?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Content relay
    // ------------------------------------------------------------------

    async fn content(
        &self,
        from: ChatId,
        message_id: MessageId,
        content: Option<Content>,
        replied_to: Option<MessageId>,
    ) -> Result<()> {
        let _guard = self.locks.acquire(from).await;
        let user = self.require_user(from).await?;

        match user.step {
            ConversationStep::AwaitingAnonymousMessage { target_owner } => {
                self.relay_anonymous(&user, target_owner, message_id, content)
                    .await
            }
            ConversationStep::Idle => match replied_to {
                Some(replied_to) => {
                    self.relay_reply(&user, message_id, content, replied_to).await
                }
                None => Err(RelayError::Unrecognized),
            },
        }
    }

    /// First hop: the composed message goes to the link owner.
    async fn relay_anonymous(
        &self,
        sender: &UserRecord,
        target_owner: ChatId,
        message_id: MessageId,
        content: Option<Content>,
    ) -> Result<()> {
        if target_owner == sender.chat_id {
            // Unreachable through the deep-link guard; reset rather than
            // trust the stored step.
            self.store.set_step(sender.chat_id, &ConversationStep::Idle).await?;
            return Err(RelayError::SelfTarget);
        }

        // Unsupported content keeps the step so the user can try again.
        let Some(content) = content else {
            return Err(RelayError::UnsupportedContentType);
        };

        if self.store.get_user(target_owner).await?.is_none() {
            self.store.set_step(sender.chat_id, &ConversationStep::Idle).await?;
            return Err(RelayError::DeliveryFailed);
        }

        // The prompt may be arbitrarily stale; re-check right before the
        // send.
        if self.store.is_blocked(target_owner, sender.chat_id).await? {
            self.store.set_step(sender.chat_id, &ConversationStep::Idle).await?;
            return Err(RelayError::Blocked);
        }

        self.check_outbound_gates(sender, &content).await?;

        let controls = [ControlButton::new(
            BLOCK_LABEL,
            ControlToken::Block {
                target: sender.chat_id,
                recipient: target_owner,
            },
        )];
        let delivered = self
            .gateway
            .send_content(target_owner, &content, Some(ANON_HEADER), &controls, None)
            .await
            .map_err(|gateway_error| {
                warn!("relay to {} failed: {}", target_owner, gateway_error);
                RelayError::DeliveryFailed
            })?;

        info!("relayed {} to chat {}", content.kind(), target_owner);

        // Commit only after the send went through.
        self.store
            .record_context(&MessageContext::new(
                delivered,
                target_owner,
                sender.chat_id,
                message_id,
            ))
            .await?;
        self.store.increment_messages_sent(sender.chat_id).await?;
        self.store.increment_messages_received(target_owner).await?;
        self.store.set_step(sender.chat_id, &ConversationStep::Idle).await?;

        let controls = [ControlButton::new(
            COMPOSE_AGAIN_LABEL,
            ControlToken::Compose { target: target_owner },
        )];
        if let Err(gateway_error) = self
            .gateway
            .send_text(sender.chat_id, "🤿 Message sent — wait for the reply!", &controls)
            .await
        {
            warn!("confirmation to {} failed: {}", sender.chat_id, gateway_error);
        }
        Ok(())
    }

    /// Any later hop: a swipe-reply resolved through the context ledger.
    async fn relay_reply(
        &self,
        sender: &UserRecord,
        message_id: MessageId,
        content: Option<Content>,
        replied_to: MessageId,
    ) -> Result<()> {
        let Some(context) = self.store.lookup_context(replied_to, sender.chat_id).await? else {
            // Expired or foreign reply target; plain "can't resolve".
            return Err(RelayError::Unrecognized);
        };

        let Some(content) = content else {
            return Err(RelayError::UnsupportedContentType);
        };

        if self
            .store
            .is_blocked(context.counterpart_chat_id, sender.chat_id)
            .await?
        {
            return Err(RelayError::Blocked);
        }

        self.check_outbound_gates(sender, &content).await?;

        let controls = [ControlButton::new(
            BLOCK_LABEL,
            ControlToken::Block {
                target: sender.chat_id,
                recipient: context.counterpart_chat_id,
            },
        )];
        let delivered = self
            .gateway
            .send_content(
                context.counterpart_chat_id,
                &content,
                Some(REPLY_HEADER),
                &controls,
                Some(context.counterpart_source_message_id),
            )
            .await
            .map_err(|gateway_error| {
                warn!(
                    "reply relay to {} failed: {}",
                    context.counterpart_chat_id, gateway_error
                );
                RelayError::DeliveryFailed
            })?;

        info!(
            "relayed {} reply to chat {}",
            content.kind(),
            context.counterpart_chat_id
        );

        // Fresh context with the roles swapped keeps the thread going.
        self.store
            .record_context(&MessageContext::new(
                delivered,
                context.counterpart_chat_id,
                sender.chat_id,
                message_id,
            ))
            .await?;
        self.store.increment_messages_sent(sender.chat_id).await?;
        self.store
            .increment_messages_received(context.counterpart_chat_id)
            .await?;

        if let Err(gateway_error) = self
            .gateway
            .send_text(sender.chat_id, "✅ Reply delivered!", &[])
            .await
        {
            warn!("confirmation to {} failed: {}", sender.chat_id, gateway_error);
        }
        Ok(())
    }

    /// Gates shared by every relay hop, checked immediately before the
    /// send side effect, not only at state entry.
    async fn check_outbound_gates(&self, sender: &UserRecord, content: &Content) -> Result<()> {
        let now = Utc::now();
        if sender.is_auto_blocked(now) {
            return Err(RelayError::AutoBlocked);
        }
        if let Some(text) = content.text() {
            if text.chars().count() > self.opts.max_message_length {
                return Err(RelayError::MessageTooLong {
                    limit: self.opts.max_message_length,
                });
            }
            if self.filter.matches(text) {
                let until = now + ChronoDuration::hours(self.opts.auto_block_hours);
                self.store
                    .set_auto_blocked_until(sender.chat_id, Some(until))
                    .await?;
                info!("chat {} auto-blocked until {}", sender.chat_id, until);
                return Err(RelayError::AutoBlocked);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Controls
    // ------------------------------------------------------------------

    async fn control(&self, from: ChatId, message_id: MessageId, payload: &str) -> Result<()> {
        let Some(token) = ControlToken::parse(payload) else {
            return Err(RelayError::Unrecognized);
        };

        match token {
            ControlToken::Cancel => {
                let _guard = self.locks.acquire(from).await;
                self.require_user(from).await?;
                self.store.set_step(from, &ConversationStep::Idle).await?;
                if let Err(gateway_error) =
                    self.gateway.edit_controls(from, message_id, &[]).await
                {
                    warn!("control edit for {} failed: {}", from, gateway_error);
                }
                self.send_plain(from, "❌ Sending cancelled.").await
            }
            ControlToken::Compose { target } => {
                let _guard = self.locks.acquire(from).await;
                self.require_user(from).await?;
                if target == from {
                    return Err(RelayError::SelfTarget);
                }
                if self.store.get_user(target).await?.is_none() {
                    return Err(RelayError::Unrecognized);
                }
                if self.store.is_blocked(target, from).await? {
                    return Err(RelayError::Blocked);
                }
                self.store
                    .set_step(
                        from,
                        &ConversationStep::AwaitingAnonymousMessage { target_owner: target },
                    )
                    .await?;
                self.send_compose_prompt(from).await
            }
            ControlToken::Block { target, recipient } => {
                // The token authorizes only the chat it was delivered to.
                if recipient != from {
                    warn!("chat {} pressed a block control addressed to {}", from, recipient);
                    return Err(RelayError::Unrecognized);
                }
                let _guard = self.locks.acquire(from).await;
                self.require_user(from).await?;
                self.store.block_sender(from, target).await?;
                let controls =
                    [ControlButton::new(CLEAR_BLOCKED_LABEL, ControlToken::ClearBlocked)];
                if let Err(gateway_error) =
                    self.gateway.edit_controls(from, message_id, &controls).await
                {
                    warn!("control edit for {} failed: {}", from, gateway_error);
                }
                self.send_plain(from, "🚫 Sender blocked. They can no longer reach you.")
                    .await
            }
            ControlToken::ClearBlocked => {
                let _guard = self.locks.acquire(from).await;
                self.require_user(from).await?;
                self.store.clear_blocked(from).await?;
                if let Err(gateway_error) =
                    self.gateway.edit_controls(from, message_id, &[]).await
                {
                    warn!("control edit for {} failed: {}", from, gateway_error);
                }
                self.send_plain(from, "✅ Block list cleared.").await
            }
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn ensure_user(&self, chat_id: ChatId) -> Result<UserRecord> {
        if let Some(user) = self.store.get_user(chat_id).await? {
            return Ok(user);
        }
        let code = self.identity.issue_code().await?;
        let user = UserRecord::new(chat_id, code);
        self.store.insert_user(&user).await?;
        info!("registered new chat {}", chat_id);
        Ok(user)
    }

    async fn require_user(&self, chat_id: ChatId) -> Result<UserRecord> {
        self.store
            .get_user(chat_id)
            .await?
            .ok_or(RelayError::NotRegistered)
    }

    async fn send_compose_prompt(&self, chat_id: ChatId) -> Result<()> {
        let controls = [ControlButton::new(CANCEL_LABEL, ControlToken::Cancel)];
        self.gateway
            .send_text(chat_id, COMPOSE_PROMPT, &controls)
            .await
            .map_err(|gateway_error| {
                warn!("prompt to {} failed: {}", chat_id, gateway_error);
                RelayError::DeliveryFailed
            })?;
        Ok(())
    }

    async fn send_plain(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.gateway
            .send_text(chat_id, text, &[])
            .await
            .map_err(|gateway_error| {
                warn!("send to {} failed: {}", chat_id, gateway_error);
                RelayError::DeliveryFailed
            })?;
        Ok(())
    }

    fn link_for(&self, link_code: &str) -> String {
        format!("https://t.me/{}?start={}", self.opts.bot_username, link_code)
    }

    async fn notify_failure(&self, chat_id: ChatId, relay_error: &RelayError) {
        if let RelayError::Storage(storage_error) = relay_error {
            error!("storage failure serving chat {}: {:#}", chat_id, storage_error);
        }
        let text = failure_text(relay_error);
        if let Err(gateway_error) = self.gateway.send_text(chat_id, &text, &[]).await {
            warn!("failed to deliver notice to {}: {}", chat_id, gateway_error);
        }
    }
}

fn failure_text(relay_error: &RelayError) -> String {
    match relay_error {
        RelayError::InvalidLink => "❌ This link is invalid or no longer active.".to_string(),
        RelayError::SelfTarget => {
            "You cannot send an anonymous message to yourself.".to_string()
        }
        RelayError::Blocked => "🚫 This user has blocked you.".to_string(),
        RelayError::UnsupportedContentType => {
            "⚠️ This content type cannot be relayed. Send text, a photo, video, \
             voice message, video note, sticker, document, audio or poll."
                .to_string()
        }
        RelayError::TooManyRequests { seconds_remaining } => format!(
            "⏳ Please wait {} seconds before your next request.",
            seconds_remaining
        ),
        RelayError::DeliveryFailed => {
            "❌ Could not deliver your message. Please try again.".to_string()
        }
        RelayError::Unrecognized => {
            "I only understand commands and replies to relayed messages. \
             Use /start to get your link."
                .to_string()
        }
        RelayError::CodeSpaceExhausted => {
            "⚠️ Could not generate a link code right now. Please try again later.".to_string()
        }
        RelayError::NotRegistered => "Please use /start to register first.".to_string(),
        RelayError::MessageTooLong { limit } => {
            format!("Message is too long. Maximum {} characters.", limit)
        }
        RelayError::AutoBlocked => {
            "🚫 Your message was not sent: sending is temporarily disabled for \
             this account."
                .to_string()
        }
        RelayError::Storage(_) => "⚠️ Something went wrong. Please try again.".to_string(),
    }
}
