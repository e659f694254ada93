use crate::config::Config;
use crate::health;
use anyhow::Result;
use hushlink_channel::TelegramService;
use hushlink_persistence::RelayStore;
use hushlink_relay::RelayOptions;
use std::time::Duration;

use tokio::signal;
use tokio::time::interval;
use tracing::{error, info, warn};

/// How often expired message contexts are swept out.
const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Gateway service - main orchestrator
pub struct GatewayService {
    config: Config,
}

impl GatewayService {
    /// Create a new gateway service
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the gateway service
    pub async fn run(self) -> Result<()> {
        // Initialize logging
        hushlink_logging::init_logging(&self.config.logging.level)?;
        info!("Starting Hushlink Gateway Service");

        // Initialize storage and refuse to serve until it answers
        let store = RelayStore::new(
            &self.config.database.path,
            self.config.relay.context_ttl_days,
        )
        .await?;
        store.ready().await?;
        info!("Relay store ready");

        // Periodic sweep of expired message contexts
        let purge_store = store.clone();
        tokio::spawn(async move {
            let mut ticker = interval(PURGE_INTERVAL);
            loop {
                ticker.tick().await;
                match purge_store.purge_expired_contexts().await {
                    Ok(0) => {}
                    Ok(purged) => info!("Purged {} expired message contexts", purged),
                    Err(e) => warn!("Context purge failed: {:#}", e),
                }
            }
        });

        // Health endpoint for uptime monitors
        let health_addr = self.config.health.bind_addr.parse()?;
        tokio::spawn(health::serve(health_addr));

        // Relay engine tuning from config
        let opts = RelayOptions {
            bot_username: String::new(),
            cooldown: Duration::from_secs(self.config.relay.cooldown_seconds),
            max_message_length: self.config.relay.max_message_length,
            blocked_keywords: self.config.relay.blocked_keywords.clone(),
            auto_block_hours: self.config.relay.auto_block_hours,
        };
        info!(
            "Relay config: cooldown={}s, context_ttl={}d, max_message_length={}",
            self.config.relay.cooldown_seconds,
            self.config.relay.context_ttl_days,
            self.config.relay.max_message_length,
        );

        // Initialize Telegram channel
        let telegram_service =
            TelegramService::new(&self.config.telegram.bot_token, store, opts);

        // Setup signal handler for graceful shutdown
        let shutdown = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
            }
            info!("Received shutdown signal");
        };

        // Run the bot
        tokio::select! {
            result = telegram_service.run() => {
                if let Err(e) = result {
                    error!("Telegram service error: {}", e);
                }
            }
            _ = shutdown => {
                info!("Shutting down gracefully...");
            }
        }

        info!("Gateway service stopped");
        Ok(())
    }
}
