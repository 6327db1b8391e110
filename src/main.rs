// This is the entry point of the spam blocker bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic): the spam registry and the moderation engine
// - `infra/` = Implementations of core traits (CAS API, snapshot file)
// - `telegram/` = Telegram-specific adapters (Bot API client, update polling)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Run the update loop until shutdown
// 4. Save the spam list on the way out

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "telegram/telegram_layer.rs"]
mod telegram;

mod config;

use crate::config::{BotConfig, CliArgs};
use crate::core::moderation::ModerationEngine;
use crate::core::spamlist::SpamRegistry;
use crate::infra::cas::CasApiClient;
use crate::infra::spamlist::JsonSnapshotStore;
use crate::telegram::{TelegramApiClient, UpdatePoller};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // Load environment variables from the .env file (if it exists)
    if let Err(e) = dotenv::from_path(&args.env_file) {
        if args.env_file.exists() {
            return Err(e).with_context(|| format!("Unable to read {}", args.env_file.display()));
        }
    }

    let config = BotConfig::from_env().context("Unable to validate config")?;

    // RUST_LOG wins, then the debug flag, then --log-level
    let level = if config.telegram_debug {
        "debug".to_string()
    } else {
        args.log_level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting the bot");
    for warning in config.warnings() {
        tracing::warn!("{}", warning);
    }
    if config.telegram_debug {
        tracing::debug!("Debug mode enabled");
    }

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let api = Arc::new(
        TelegramApiClient::new(
            &config.telegram_api_url,
            &config.telegram_token,
            config.telegram_timeout_secs,
        )
        .context("Unable to create Telegram client")?,
    );

    // Authentication failure is fatal
    let me = api
        .get_me()
        .await
        .context("Unable to connect to Telegram")?;
    tracing::debug!(username = %me.display_name(), "Authorized on account");

    tracing::info!("Loading spam list...");
    let cas_client = CasApiClient::new(config.cas.export_url.clone(), config.cas.check_url.clone())
        .context("Unable to create CAS client")?;
    let snapshots = JsonSnapshotStore::new(&config.cas.snapshot_path);
    let registry = Arc::new(SpamRegistry::bootstrap(cas_client, snapshots).await);
    tracing::info!(
        count = registry.len().await,
        source = %registry.seeded_from(),
        refreshed = %registry.last_refreshed().await,
        "Spam list ready"
    );

    let engine = Arc::new(ModerationEngine::new(
        Arc::clone(&registry),
        Arc::clone(&api),
        config.messages.clone(),
        config.cas.lookup_timeout,
    ));

    let mut poller = UpdatePoller::new(Arc::clone(&api), engine, config.telegram_timeout_secs);

    // ========================================================================
    // RUN UNTIL SHUTDOWN
    // ========================================================================
    // Dropping the poller stops intake; in-flight moderation tasks are abandoned.

    tokio::select! {
        _ = poller.run() => {}
        signal = shutdown_signal() => {
            tracing::warn!("Caught {}, stopping the bot", signal);
        }
    }

    if let Err(e) = registry.persist().await {
        tracing::warn!(error = %e, "Unable to save spam list to filesystem");
    }

    Ok(())
}

/// Wait for Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Unable to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
