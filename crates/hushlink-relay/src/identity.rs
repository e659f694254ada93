use crate::error::{RelayError, Result};
use hushlink_persistence::RelayStore;
use hushlink_types::ChatId;
use rand::Rng;
use tracing::warn;

/// Alphabet the public link codes are drawn from.
pub const LINK_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of every issued link code.
pub const LINK_CODE_LENGTH: usize = 8;

/// Collision-retry budget. 36^8 codes make a collision streak this long
/// practically unreachable, but the budget keeps issuance bounded.
const MAX_ISSUE_ATTEMPTS: usize = 32;

/// Issues and resolves the opaque link codes that stand in for chat ids.
///
/// The mapping lives on the user record itself (unique indexed column);
/// this type only owns generation and normalization.
#[derive(Clone)]
pub struct IdentityRegistry {
    store: RelayStore,
}

impl IdentityRegistry {
    pub fn new(store: RelayStore) -> Self {
        Self { store }
    }

    /// Generate a fresh code that no active user currently owns.
    pub async fn issue_code(&self) -> Result<String> {
        for _ in 0..MAX_ISSUE_ATTEMPTS {
            let code = random_code();
            if self.store.find_chat_by_link_code(&code).await?.is_none() {
                return Ok(code);
            }
        }
        warn!("link code generation exhausted {} attempts", MAX_ISSUE_ATTEMPTS);
        Err(RelayError::CodeSpaceExhausted)
    }

    /// Resolve a code to its owner. Input is normalized the way links are
    /// shared: surrounding whitespace dropped, letters uppercased.
    pub async fn resolve(&self, code: &str) -> Result<Option<ChatId>> {
        let code = code.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Ok(None);
        }
        Ok(self.store.find_chat_by_link_code(&code).await?)
    }

    /// Replace the user's code. The old code stops resolving as soon as
    /// the update lands.
    pub async fn reissue(&self, chat_id: ChatId) -> Result<String> {
        let code = self.issue_code().await?;
        self.store.set_link_code(chat_id, &code).await?;
        Ok(code)
    }
}

fn random_code() -> String {
    let mut rng = rand::thread_rng();
    (0..LINK_CODE_LENGTH)
        .map(|_| LINK_CODE_ALPHABET[rng.gen_range(0..LINK_CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hushlink_types::UserRecord;

    #[test]
    fn codes_use_the_fixed_alphabet_and_length() {
        for _ in 0..100 {
            let code = random_code();
            assert_eq!(code.len(), LINK_CODE_LENGTH);
            assert!(code.bytes().all(|byte| LINK_CODE_ALPHABET.contains(&byte)));
        }
    }

    #[tokio::test]
    async fn resolve_normalizes_input() {
        let store = RelayStore::in_memory(5).await.unwrap();
        store.insert_user(&UserRecord::new(100, "AB12CD34")).await.unwrap();
        let registry = IdentityRegistry::new(store);

        assert_eq!(registry.resolve("ab12cd34").await.unwrap(), Some(100));
        assert_eq!(registry.resolve("  AB12CD34  ").await.unwrap(), Some(100));
        assert_eq!(registry.resolve("").await.unwrap(), None);
        assert_eq!(registry.resolve("UNKNOWN1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn reissue_invalidates_the_old_code() {
        let store = RelayStore::in_memory(5).await.unwrap();
        store.insert_user(&UserRecord::new(100, "AB12CD34")).await.unwrap();
        let registry = IdentityRegistry::new(store);

        let new_code = registry.reissue(100).await.unwrap();
        assert_ne!(new_code, "AB12CD34");
        assert_eq!(registry.resolve("AB12CD34").await.unwrap(), None);
        assert_eq!(registry.resolve(&new_code).await.unwrap(), Some(100));
    }
}
