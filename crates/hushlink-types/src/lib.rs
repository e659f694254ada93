//! Hushlink Types - Core types for the anonymous relay bot
//!
//! This module defines the data types shared by the relay engine, the
//! persistence layer and the Telegram channel adapter.

mod content;
mod context;
mod control;
mod user;

pub use content::Content;
pub use context::MessageContext;
pub use control::ControlToken;
pub use user::{ConversationStep, UserRecord};

/// Chat ID type (Telegram chat ID)
pub type ChatId = i64;

/// Gateway-level message ID type
pub type MessageId = i64;
