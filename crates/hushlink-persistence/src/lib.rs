use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use hushlink_types::{ChatId, ConversationStep, MessageContext, MessageId, UserRecord};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Storage service for user records, the blocked-senders set and the
/// message context ledger, backed by SQLite.
///
/// Counter updates are single atomic UPDATEs; read-modify-write of a whole
/// record is serialized per chat id by the relay engine, not here.
#[derive(Clone)]
pub struct RelayStore {
    pool: SqlitePool,
    context_ttl: Duration,
}

impl RelayStore {
    /// Open (or create) the database at `database_path`.
    pub async fn new(database_path: &str, context_ttl_days: i64) -> Result<Self> {
        let database_url = format!("sqlite:{}?mode=rwc", database_path);
        let pool = SqlitePool::connect(&database_url).await?;

        let store = Self {
            pool,
            context_ttl: Duration::days(context_ttl_days),
        };
        store.run_migrations().await?;

        info!("Relay store initialized with database: {}", database_path);
        Ok(store)
    }

    /// In-memory database for tests. A single connection keeps every query
    /// on the same memory instance.
    pub async fn in_memory(context_ttl_days: i64) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self {
            pool,
            context_ttl: Duration::days(context_ttl_days),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                chat_id INTEGER PRIMARY KEY,
                link_code TEXT NOT NULL UNIQUE,
                step TEXT NOT NULL DEFAULT 'idle',
                step_target INTEGER,
                messages_sent INTEGER NOT NULL DEFAULT 0,
                messages_received INTEGER NOT NULL DEFAULT 0,
                link_clicks INTEGER NOT NULL DEFAULT 0,
                auto_blocked_until TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blocked_senders (
                chat_id INTEGER NOT NULL,
                blocked_chat_id INTEGER NOT NULL,
                PRIMARY KEY (chat_id, blocked_chat_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS message_contexts (
                gateway_message_id INTEGER NOT NULL,
                recipient_chat_id INTEGER NOT NULL,
                counterpart_chat_id INTEGER NOT NULL,
                counterpart_source_message_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (gateway_message_id, recipient_chat_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_contexts_created_at ON message_contexts(created_at)",
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Readiness probe: the gateway refuses to accept events until this
    /// succeeds.
    pub async fn ready(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // User records
    // ------------------------------------------------------------------

    pub async fn get_user(&self, chat_id: ChatId) -> Result<Option<UserRecord>> {
        let row = sqlx::query(
            r#"
            SELECT chat_id, link_code, step, step_target,
                   messages_sent, messages_received, link_clicks,
                   auto_blocked_until, created_at
            FROM users
            WHERE chat_id = ?
            "#,
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| map_user_row(&row)))
    }

    pub async fn insert_user(&self, user: &UserRecord) -> Result<()> {
        let (step, step_target) = step_columns(&user.step);
        sqlx::query(
            r#"
            INSERT INTO users (chat_id, link_code, step, step_target,
                               messages_sent, messages_received, link_clicks,
                               auto_blocked_until, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.chat_id)
        .bind(&user.link_code)
        .bind(step)
        .bind(step_target)
        .bind(user.messages_sent)
        .bind(user.messages_received)
        .bind(user.link_clicks)
        .bind(user.auto_blocked_until.map(|ts| ts.to_rfc3339()))
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_step(&self, chat_id: ChatId, step: &ConversationStep) -> Result<()> {
        let (step, step_target) = step_columns(step);
        sqlx::query("UPDATE users SET step = ?, step_target = ? WHERE chat_id = ?")
            .bind(step)
            .bind(step_target)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replace the user's link code. The old code stops resolving the
    /// moment this UPDATE lands, since resolution goes through the unique
    /// index on this column.
    pub async fn set_link_code(&self, chat_id: ChatId, link_code: &str) -> Result<()> {
        sqlx::query("UPDATE users SET link_code = ? WHERE chat_id = ?")
            .bind(link_code)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_auto_blocked_until(
        &self,
        chat_id: ChatId,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query("UPDATE users SET auto_blocked_until = ? WHERE chat_id = ?")
            .bind(until.map(|ts| ts.to_rfc3339()))
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn find_chat_by_link_code(&self, link_code: &str) -> Result<Option<ChatId>> {
        let row = sqlx::query("SELECT chat_id FROM users WHERE link_code = ?")
            .bind(link_code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get("chat_id")))
    }

    pub async fn increment_messages_sent(&self, chat_id: ChatId) -> Result<()> {
        sqlx::query("UPDATE users SET messages_sent = messages_sent + 1 WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn increment_messages_received(&self, chat_id: ChatId) -> Result<()> {
        sqlx::query("UPDATE users SET messages_received = messages_received + 1 WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn increment_link_clicks(&self, chat_id: ChatId) -> Result<()> {
        sqlx::query("UPDATE users SET link_clicks = link_clicks + 1 WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Block list
    // ------------------------------------------------------------------

    /// Add `blocked` to `blocker`'s block list. Set semantics: re-blocking
    /// an already-blocked id is a no-op.
    pub async fn block_sender(&self, blocker: ChatId, blocked: ChatId) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO blocked_senders (chat_id, blocked_chat_id) VALUES (?, ?)")
            .bind(blocker)
            .bind(blocked)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn clear_blocked(&self, blocker: ChatId) -> Result<()> {
        sqlx::query("DELETE FROM blocked_senders WHERE chat_id = ?")
            .bind(blocker)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Whether `blocker` has blocked `candidate`. Only the blocker's rows
    /// matter; the blocked party stores nothing.
    pub async fn is_blocked(&self, blocker: ChatId, candidate: ChatId) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM blocked_senders WHERE chat_id = ? AND blocked_chat_id = ? LIMIT 1",
        )
        .bind(blocker)
        .bind(candidate)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn blocked_count(&self, blocker: ChatId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM blocked_senders WHERE chat_id = ?")
            .bind(blocker)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    // ------------------------------------------------------------------
    // Message context ledger
    // ------------------------------------------------------------------

    pub async fn record_context(&self, context: &MessageContext) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO message_contexts
                (gateway_message_id, recipient_chat_id, counterpart_chat_id,
                 counterpart_source_message_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(context.gateway_message_id)
        .bind(context.recipient_chat_id)
        .bind(context.counterpart_chat_id)
        .bind(context.counterpart_source_message_id)
        .bind(context.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Resolve a swipe-reply back to its counterpart. Expired contexts are
    /// invisible here; callers treat `None` as ordinary "can't resolve".
    pub async fn lookup_context(
        &self,
        gateway_message_id: MessageId,
        recipient_chat_id: ChatId,
    ) -> Result<Option<MessageContext>> {
        let row = sqlx::query(
            r#"
            SELECT gateway_message_id, recipient_chat_id, counterpart_chat_id,
                   counterpart_source_message_id, created_at
            FROM message_contexts
            WHERE gateway_message_id = ? AND recipient_chat_id = ?
            "#,
        )
        .bind(gateway_message_id)
        .bind(recipient_chat_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let context = map_context_row(&row);
        if context.created_at + self.context_ttl < Utc::now() {
            return Ok(None);
        }
        Ok(Some(context))
    }

    /// Drop contexts past their retention window. Called from a periodic
    /// task; the engine never depends on this having run.
    pub async fn purge_expired_contexts(&self) -> Result<u64> {
        let cutoff = (Utc::now() - self.context_ttl).to_rfc3339();
        let result = sqlx::query("DELETE FROM message_contexts WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn step_columns(step: &ConversationStep) -> (&'static str, Option<ChatId>) {
    match step {
        ConversationStep::Idle => ("idle", None),
        ConversationStep::AwaitingAnonymousMessage { target_owner } => {
            ("awaiting", Some(*target_owner))
        }
    }
}

fn map_user_row(row: &sqlx::sqlite::SqliteRow) -> UserRecord {
    let step: String = row.get("step");
    let step_target: Option<ChatId> = row.get("step_target");
    // An awaiting row without a target cannot represent a valid step.
    let step = match (step.as_str(), step_target) {
        ("awaiting", Some(target_owner)) => {
            ConversationStep::AwaitingAnonymousMessage { target_owner }
        }
        _ => ConversationStep::Idle,
    };

    UserRecord {
        chat_id: row.get("chat_id"),
        link_code: row.get("link_code"),
        step,
        messages_sent: row.get("messages_sent"),
        messages_received: row.get("messages_received"),
        link_clicks: row.get("link_clicks"),
        auto_blocked_until: row
            .get::<Option<String>, _>("auto_blocked_until")
            .and_then(|ts| parse_timestamp(&ts)),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))
            .unwrap_or_else(Utc::now),
    }
}

fn map_context_row(row: &sqlx::sqlite::SqliteRow) -> MessageContext {
    MessageContext {
        gateway_message_id: row.get("gateway_message_id"),
        recipient_chat_id: row.get("recipient_chat_id"),
        counterpart_chat_id: row.get("counterpart_chat_id"),
        counterpart_source_message_id: row.get("counterpart_source_message_id"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))
            .unwrap_or_else(Utc::now),
    }
}

fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> RelayStore {
        RelayStore::in_memory(5).await.expect("in-memory store")
    }

    #[tokio::test]
    async fn user_round_trip() {
        let store = store().await;
        let user = UserRecord::new(100, "AB12CD34");
        store.insert_user(&user).await.unwrap();

        let loaded = store.get_user(100).await.unwrap().unwrap();
        assert_eq!(loaded.chat_id, 100);
        assert_eq!(loaded.link_code, "AB12CD34");
        assert!(loaded.step.is_idle());

        assert!(store.get_user(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn step_round_trip() {
        let store = store().await;
        store.insert_user(&UserRecord::new(100, "AB12CD34")).await.unwrap();

        let step = ConversationStep::AwaitingAnonymousMessage { target_owner: 200 };
        store.set_step(100, &step).await.unwrap();
        let loaded = store.get_user(100).await.unwrap().unwrap();
        assert_eq!(loaded.step, step);

        store.set_step(100, &ConversationStep::Idle).await.unwrap();
        let loaded = store.get_user(100).await.unwrap().unwrap();
        assert!(loaded.step.is_idle());
    }

    #[tokio::test]
    async fn link_code_resolution_and_reissue() {
        let store = store().await;
        store.insert_user(&UserRecord::new(100, "AB12CD34")).await.unwrap();

        assert_eq!(store.find_chat_by_link_code("AB12CD34").await.unwrap(), Some(100));
        assert_eq!(store.find_chat_by_link_code("ZZZZZZZZ").await.unwrap(), None);

        store.set_link_code(100, "NEWCODE1").await.unwrap();
        assert_eq!(store.find_chat_by_link_code("AB12CD34").await.unwrap(), None);
        assert_eq!(store.find_chat_by_link_code("NEWCODE1").await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn duplicate_link_code_rejected() {
        let store = store().await;
        store.insert_user(&UserRecord::new(100, "AB12CD34")).await.unwrap();
        let result = store.insert_user(&UserRecord::new(200, "AB12CD34")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn block_list_set_semantics() {
        let store = store().await;
        store.insert_user(&UserRecord::new(100, "AB12CD34")).await.unwrap();

        assert!(!store.is_blocked(100, 200).await.unwrap());
        store.block_sender(100, 200).await.unwrap();
        store.block_sender(100, 200).await.unwrap();
        assert!(store.is_blocked(100, 200).await.unwrap());
        assert_eq!(store.blocked_count(100).await.unwrap(), 1);

        // Asymmetric: the blocked party's view is untouched.
        assert!(!store.is_blocked(200, 100).await.unwrap());

        store.clear_blocked(100).await.unwrap();
        assert!(!store.is_blocked(100, 200).await.unwrap());
        assert_eq!(store.blocked_count(100).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn context_lookup_keyed_by_recipient() {
        let store = store().await;
        let context = MessageContext::new(555, 100, 200, 42);
        store.record_context(&context).await.unwrap();

        let found = store.lookup_context(555, 100).await.unwrap().unwrap();
        assert_eq!(found.counterpart_chat_id, 200);
        assert_eq!(found.counterpart_source_message_id, 42);

        // Same message id for a different recipient does not resolve.
        assert!(store.lookup_context(555, 200).await.unwrap().is_none());
        assert!(store.lookup_context(556, 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_context_is_invisible_and_purged() {
        let store = store().await;
        let mut context = MessageContext::new(555, 100, 200, 42);
        context.created_at = Utc::now() - Duration::days(6);
        store.record_context(&context).await.unwrap();

        assert!(store.lookup_context(555, 100).await.unwrap().is_none());
        assert_eq!(store.purge_expired_contexts().await.unwrap(), 1);

        let fresh = MessageContext::new(556, 100, 200, 43);
        store.record_context(&fresh).await.unwrap();
        assert_eq!(store.purge_expired_contexts().await.unwrap(), 0);
        assert!(store.lookup_context(556, 100).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn counters_are_atomic_updates() {
        let store = store().await;
        store.insert_user(&UserRecord::new(100, "AB12CD34")).await.unwrap();

        store.increment_messages_sent(100).await.unwrap();
        store.increment_messages_sent(100).await.unwrap();
        store.increment_messages_received(100).await.unwrap();
        store.increment_link_clicks(100).await.unwrap();

        let user = store.get_user(100).await.unwrap().unwrap();
        assert_eq!(user.messages_sent, 2);
        assert_eq!(user.messages_received, 1);
        assert_eq!(user.link_clicks, 1);
    }
}
