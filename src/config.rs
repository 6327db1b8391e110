// Bot configuration - command-line flags plus environment variables.
//
// Everything except the two flags comes from the environment (optionally loaded
// from a .env file first). Validation happens once, before anything starts.

use crate::core::moderation::{ModerationMessages, NAME_PLACEHOLDER};
use crate::infra::cas::cas_client::USER_ID_PLACEHOLDER;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
pub const DEFAULT_TELEGRAM_TIMEOUT_SECS: i64 = 60;
pub const DEFAULT_HELP_COMMAND: &str = "/help";
pub const DEFAULT_CAS_EXPORT_URL: &str = "https://api.cas.chat/export.csv";
pub const DEFAULT_CAS_CHECK_URL: &str = "https://api.cas.chat/check?user_id={user_id}";
pub const DEFAULT_CAS_SNAPSHOT_PATH: &str = "data/cas_snapshot.json";
pub const DEFAULT_CAS_LOOKUP_TIMEOUT_SECS: i64 = 5;

#[derive(Debug, Clone, Parser)]
#[command(
    author,
    version,
    about = "A Telegram bot that removes known spammers using the CAS list"
)]
pub struct CliArgs {
    /// Path to a .env file with the bot configuration (ignored if missing)
    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SPAM_BOT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("empty config value '{0}'")]
    Missing(&'static str),

    #[error("invalid config value '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Settings for the CAS denylist.
#[derive(Debug, Clone)]
pub struct CasConfig {
    pub export_url: String,
    /// Must contain `{user_id}`
    pub check_url: String,
    pub snapshot_path: PathBuf,
    pub lookup_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    pub telegram_api_url: String,
    /// Long-poll timeout for getUpdates, in seconds
    pub telegram_timeout_secs: u64,
    pub telegram_debug: bool,
    pub messages: ModerationMessages,
    pub cas: CasConfig,
}

impl BotConfig {
    /// Read and validate the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read and validate the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let optional = |key: &'static str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let telegram_token = required("TELEGRAM_TOKEN")?;
        let messages = ModerationMessages {
            start_command: required("START_COMMAND")?,
            help_command: optional("HELP_COMMAND", DEFAULT_HELP_COMMAND),
            hello: required("MESSAGE_HELLO")?,
            help: required("MESSAGE_HELP")?,
            blocked: required("MESSAGE_BLOCKED")?,
            unknown_error: required("ERROR_UNKNOWN")?,
        };

        let telegram_timeout_secs = positive_secs(
            "TELEGRAM_TIMEOUT",
            lookup("TELEGRAM_TIMEOUT"),
            DEFAULT_TELEGRAM_TIMEOUT_SECS,
        )?;
        let telegram_debug = match lookup("TELEGRAM_DEBUG") {
            Some(v) if !v.trim().is_empty() => {
                v.trim().parse::<bool>().map_err(|e| ConfigError::Invalid {
                    key: "TELEGRAM_DEBUG",
                    reason: e.to_string(),
                })?
            }
            _ => false,
        };

        let check_url = optional("CAS_CHECK_URL", DEFAULT_CAS_CHECK_URL);
        if !check_url.contains(USER_ID_PLACEHOLDER) {
            return Err(ConfigError::Invalid {
                key: "CAS_CHECK_URL",
                reason: format!("must contain {}", USER_ID_PLACEHOLDER),
            });
        }
        let cas = CasConfig {
            export_url: optional("CAS_EXPORT_URL", DEFAULT_CAS_EXPORT_URL),
            check_url,
            snapshot_path: PathBuf::from(optional("CAS_SNAPSHOT_PATH", DEFAULT_CAS_SNAPSHOT_PATH)),
            lookup_timeout: Duration::from_secs(positive_secs(
                "CAS_LOOKUP_TIMEOUT",
                lookup("CAS_LOOKUP_TIMEOUT"),
                DEFAULT_CAS_LOOKUP_TIMEOUT_SECS,
            )?),
        };

        Ok(Self {
            telegram_token,
            telegram_api_url: optional("TELEGRAM_API_URL", DEFAULT_TELEGRAM_API_URL),
            telegram_timeout_secs,
            telegram_debug,
            messages,
            cas,
        })
    }
}

impl BotConfig {
    /// Settings that are valid but probably not what the operator meant.
    ///
    /// Returned rather than logged so they can be reported once logging is up.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.messages.blocked.contains(NAME_PLACEHOLDER) {
            warnings.push(format!(
                "MESSAGE_BLOCKED has no {} placeholder, replies won't name the user",
                NAME_PLACEHOLDER
            ));
        }
        warnings
    }
}

/// Parse a number of seconds that must be greater than 0.
fn positive_secs(
    key: &'static str,
    value: Option<String>,
    default: i64,
) -> Result<u64, ConfigError> {
    let secs = match value {
        Some(v) if !v.trim().is_empty() => {
            v.trim().parse::<i64>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })?
        }
        _ => default,
    };

    if secs <= 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("should be greater than 0, got {}", secs),
        });
    }
    Ok(secs as u64)
}
