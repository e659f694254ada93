//! Error types for relay engine operations

use thiserror::Error;

/// Outcomes of processing one inbound event.
///
/// Every variant is recoverable and maps to a user-facing notice; a failed
/// event never takes the process down or leaves state half-mutated.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Deep-link code did not resolve to any active user
    #[error("link code does not resolve")]
    InvalidLink,

    /// A relay hop would target the sender's own chat
    #[error("cannot relay to own chat")]
    SelfTarget,

    /// The intended recipient has blocked this sender
    #[error("sender is blocked by the recipient")]
    Blocked,

    /// Content kind the relay cannot carry
    #[error("unsupported content type")]
    UnsupportedContentType,

    /// Cooldown window has not elapsed since the previous event
    #[error("cooldown active, retry in {seconds_remaining}s")]
    TooManyRequests {
        /// Whole seconds until the window opens again
        seconds_remaining: u64,
    },

    /// The gateway could not deliver the relayed message
    #[error("delivery failed")]
    DeliveryFailed,

    /// Input that matches no command, step or context
    #[error("unrecognized input")]
    Unrecognized,

    /// Code generation exhausted its retry budget
    #[error("link code space exhausted")]
    CodeSpaceExhausted,

    /// The acting chat has no user record yet
    #[error("chat is not registered")]
    NotRegistered,

    /// Text or caption over the relay length cap
    #[error("message exceeds {limit} characters")]
    MessageTooLong {
        /// Maximum accepted length
        limit: usize,
    },

    /// Sender is inside an automatic block window
    #[error("sender is temporarily auto-blocked")]
    AutoBlocked,

    /// Storage-layer failure, rendered as a generic retry notice
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, RelayError>;
