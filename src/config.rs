//! Configuration for Cadence.
//!
//! Everything is loaded from environment variables (with `.env` support) —
//! the coach keeps no local state, so there is no settings file to manage.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Main configuration for the coach.
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub anthropic: AnthropicConfig,
    pub docs: DocsConfig,
    pub retry: RetryConfig,
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            telegram: TelegramConfig::from_env()?,
            anthropic: AnthropicConfig::from_env()?,
            docs: DocsConfig::from_env()?,
            retry: RetryConfig::from_env()?,
            schedule: ScheduleConfig::from_env()?,
        })
    }
}

/// Telegram bot configuration.
///
/// The coach serves exactly one user: inbound updates from any other chat id
/// are ignored.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: SecretString,
    pub user_chat_id: i64,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout: Duration,
}

impl TelegramConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let token = require_env("TELEGRAM_TOKEN")?;
        let user_chat_id = require_env("USER_CHAT_ID")?
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "USER_CHAT_ID".to_string(),
                message: format!("must be a Telegram chat id: {e}"),
            })?;

        Ok(Self {
            token: SecretString::from(token),
            user_chat_id,
            poll_timeout: Duration::from_secs(parse_optional_env(
                "TELEGRAM_POLL_TIMEOUT_SECS",
                30u64,
            )?),
        })
    }
}

/// Anthropic Messages API configuration.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: SecretString,
    pub model: String,
    /// Max output tokens per extraction request.
    pub max_tokens: u32,
}

impl AnthropicConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: SecretString::from(require_env("ANTHROPIC_API_KEY")?),
            model: optional_env("ANTHROPIC_MODEL")?
                .unwrap_or_else(|| "claude-3-7-sonnet-20250219".to_string()),
            max_tokens: parse_optional_env("ANTHROPIC_MAX_TOKENS", 1000)?,
        })
    }
}

/// Google Docs configuration.
///
/// Two documents: the main log (daily check-ins, weekly recaps and responses)
/// and the stretch log. Authentication uses a service-account key file.
#[derive(Debug, Clone)]
pub struct DocsConfig {
    pub log_doc_id: String,
    pub stretch_doc_id: String,
    pub credentials_path: PathBuf,
}

impl DocsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            log_doc_id: require_env("GOOGLE_DOC_ID")?,
            stretch_doc_id: require_env("STRETCH_DOC_ID")?,
            credentials_path: optional_env("GOOGLE_CREDENTIALS_PATH")?
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("credentials.json")),
        })
    }
}

/// Retry policy knobs shared by the oracle and document clients.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
}

impl RetryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let max_attempts: u32 = parse_optional_env("MAX_RETRIES", 3)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAX_RETRIES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let delay_secs: f64 = parse_optional_env("RETRY_DELAY_SECS", 1.0)?;
        if !delay_secs.is_finite() || delay_secs < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "RETRY_DELAY_SECS".to_string(),
                message: "must be a finite, non-negative number of seconds".to_string(),
            });
        }
        // A factor of 1 or below would keep delays flat or shrinking.
        let backoff_factor: f64 = parse_optional_env("RETRY_BACKOFF", 2.0)?;
        if !backoff_factor.is_finite() || backoff_factor <= 1.0 {
            return Err(ConfigError::InvalidValue {
                key: "RETRY_BACKOFF".to_string(),
                message: "must be a finite number greater than 1".to_string(),
            });
        }
        Ok(Self {
            max_attempts,
            base_delay: Duration::from_secs_f64(delay_secs),
            backoff_factor,
        })
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }
}

/// Cron triggers for the scheduled flows, evaluated in `timezone`.
///
/// Defaults match the original cadence: daily check-in at 20:30, weekly
/// recap on Sunday at 20:00, stretch reminder at 19:00.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub timezone: chrono_tz::Tz,
    pub daily_cron: String,
    pub weekly_cron: String,
    pub stretch_cron: String,
}

impl ScheduleConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let tz_name = optional_env("TIMEZONE")?.unwrap_or_else(|| "Europe/London".to_string());
        let timezone: chrono_tz::Tz = tz_name.parse().map_err(|_| ConfigError::InvalidValue {
            key: "TIMEZONE".to_string(),
            message: format!("unknown IANA timezone: {tz_name}"),
        })?;

        Ok(Self {
            timezone,
            daily_cron: optional_env("DAILY_CRON")?.unwrap_or_else(|| "0 30 20 * * *".to_string()),
            weekly_cron: optional_env("WEEKLY_CRON")?
                .unwrap_or_else(|| "0 0 20 * * SUN".to_string()),
            stretch_cron: optional_env("STRETCH_CRON")?
                .unwrap_or_else(|| "0 0 19 * * *".to_string()),
        })
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::London,
            daily_cron: "0 30 20 * * *".to_string(),
            weekly_cron: "0 0 20 * * SUN".to_string(),
            stretch_cron: "0 0 19 * * *".to_string(),
        }
    }
}

// Env helpers. An empty value counts as unset so a commented-out line and
// `KEY=` in a .env file behave the same.

pub(crate) fn require_env(key: &str) -> Result<String, ConfigError> {
    optional_env(key)?.ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => Ok(if value.is_empty() { None } else { Some(value) }),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::ParseError(format!("cannot read {key}: {e}"))),
    }
}

pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = optional_env(key)? else {
        return Ok(default);
    };
    raw.parse().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{e}"),
    })
}
