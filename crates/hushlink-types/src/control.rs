use crate::ChatId;

/// Typed control payload embedded in inline keyboard buttons.
///
/// Encoded as a compact string with the kind prefix as discriminator:
/// `block:<target>:<recipient>`, `compose:<target>`, `cancel`,
/// `clearblocked`. Parsing is defensive: anything malformed or foreign
/// yields `None` and the caller treats it as unrecognized input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlToken {
    /// Add `target` to the block list of `recipient`. The recipient field
    /// is the authorization check: only the chat the button was delivered
    /// to may act on it.
    Block { target: ChatId, recipient: ChatId },
    /// Re-enter the compose prompt addressed at `target`.
    Compose { target: ChatId },
    /// Abandon the pending compose step.
    Cancel,
    /// Empty the caller's block list.
    ClearBlocked,
}

impl ControlToken {
    pub fn encode(&self) -> String {
        match self {
            ControlToken::Block { target, recipient } => {
                format!("block:{}:{}", target, recipient)
            }
            ControlToken::Compose { target } => format!("compose:{}", target),
            ControlToken::Cancel => "cancel".to_string(),
            ControlToken::ClearBlocked => "clearblocked".to_string(),
        }
    }

    pub fn parse(payload: &str) -> Option<Self> {
        let mut parts = payload.split(':');
        let kind = parts.next()?;
        let token = match kind {
            "block" => {
                let target = parts.next()?.parse().ok()?;
                let recipient = parts.next()?.parse().ok()?;
                ControlToken::Block { target, recipient }
            }
            "compose" => {
                let target = parts.next()?.parse().ok()?;
                ControlToken::Compose { target }
            }
            "cancel" => ControlToken::Cancel,
            "clearblocked" => ControlToken::ClearBlocked,
            _ => return None,
        };
        // Trailing garbage means a foreign or corrupted payload.
        if parts.next().is_some() {
            return None;
        }
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_variant() {
        let tokens = [
            ControlToken::Block { target: 200, recipient: 100 },
            ControlToken::Compose { target: 42 },
            ControlToken::Cancel,
            ControlToken::ClearBlocked,
        ];
        for token in tokens {
            assert_eq!(ControlToken::parse(&token.encode()), Some(token));
        }
    }

    #[test]
    fn rejects_malformed_payloads() {
        for payload in [
            "",
            "block",
            "block:abc:100",
            "block:200",
            "block:200:100:extra",
            "compose:",
            "compose:12x",
            "cancel:now",
            "reply_to:123",
            "BLOCK:200:100",
        ] {
            assert_eq!(ControlToken::parse(payload), None, "payload {:?}", payload);
        }
    }

    #[test]
    fn negative_chat_ids_survive() {
        // Group chats have negative ids on the transport.
        let token = ControlToken::Block { target: -1001234, recipient: 100 };
        assert_eq!(ControlToken::parse(&token.encode()), Some(token));
    }
}
