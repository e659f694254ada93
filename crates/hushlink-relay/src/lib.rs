//! Hushlink Relay - the anonymous relay conversation engine
//!
//! Interprets inbound events against each chat's conversation step,
//! resolves link codes and reply contexts, enforces the block list on
//! every hop and emits relay instructions through the gateway seam.

mod cooldown;
mod engine;
mod error;
mod filter;
mod gateway;
mod identity;
mod locks;

pub use cooldown::CooldownGate;
pub use engine::{Command, Event, RelayEngine, RelayOptions};
pub use error::{RelayError, Result};
pub use filter::ContentFilter;
pub use gateway::{ControlButton, GatewayError, MessageGateway};
pub use identity::{IdentityRegistry, LINK_CODE_ALPHABET, LINK_CODE_LENGTH};
pub use locks::ChatLocks;
