//! Client configuration.
//!
//! # Responsibility
//! - Hold tunables for polling, vote upload and the confirmation gate.
//! - Load overrides from a key lookup (environment by default).
//!
//! # Invariants
//! - Loading never fails: unparseable values fall back to defaults with a
//!   warning. Use `validate()` to reject semantically invalid values.

use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const ENV_PREFIX: &str = "VOTESYNC_";

/// Submission polling tunables for the external scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub polling_interval_ms: u64,
    pub stale_time_ms: u64,
    pub initial_load_max_retries: u32,
    pub polling_max_retries: u32,
    pub initial_retry_base_delay_ms: u64,
    pub initial_retry_max_delay_ms: u64,
    pub polling_retry_base_delay_ms: u64,
    pub polling_retry_max_delay_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: 30_000,
            stale_time_ms: 29_000,
            initial_load_max_retries: 5,
            polling_max_retries: 1,
            initial_retry_base_delay_ms: 1_000,
            initial_retry_max_delay_ms: 10_000,
            polling_retry_base_delay_ms: 1_000,
            polling_retry_max_delay_ms: 30_000,
        }
    }
}

impl PollConfig {
    /// Retry budget for one failed poll.
    pub fn max_retries(&self, initial_load: bool) -> u32 {
        if initial_load {
            self.initial_load_max_retries
        } else {
            self.polling_max_retries
        }
    }

    /// Delay before retry number `attempt` (zero-based) of a failed poll.
    pub fn retry_delay_ms(&self, attempt: u32, initial_load: bool) -> u64 {
        let (base, max) = if initial_load {
            (
                self.initial_retry_base_delay_ms,
                self.initial_retry_max_delay_ms,
            )
        } else {
            (
                self.polling_retry_base_delay_ms,
                self.polling_retry_max_delay_ms,
            )
        };
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        base.saturating_mul(factor).min(max)
    }
}

/// Vote upload tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteSyncConfig {
    /// Storage key of this client's persisted record.
    pub storage_key: String,
    pub send_debounce_ms: u64,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
}

impl Default for VoteSyncConfig {
    fn default() -> Self {
        Self {
            storage_key: "default".to_string(),
            send_debounce_ms: 1_000,
            initial_retry_delay_ms: 2_000,
            max_retry_delay_ms: 30_000,
        }
    }
}

/// Confirmation gate countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationConfig {
    pub countdown_ticks: u32,
    pub tick_ms: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            countdown_ticks: 5,
            tick_ms: 1_000,
        }
    }
}

impl ConfirmationConfig {
    pub fn countdown_ms(&self) -> u64 {
        u64::from(self.countdown_ticks).saturating_mul(self.tick_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub submissions: PollConfig,
    pub votes: VoteSyncConfig,
    pub confirmation: ConfirmationConfig,
}

/// Semantically invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, reason } => {
                write!(f, "invalid configuration value `{key}`: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "/api".to_string(),
            submissions: PollConfig::default(),
            votes: VoteSyncConfig::default(),
            confirmation: ConfirmationConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads overrides from `VOTESYNC_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Loads overrides through `lookup`, keyed without prefix
    /// (e.g. `SEND_DEBOUNCE_MS`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::new();
        let poll = &defaults.submissions;
        let votes = &defaults.votes;
        let confirmation = &defaults.confirmation;

        let config = Self {
            api_base_url: lookup("API_BASE_URL").unwrap_or_else(|| defaults.api_base_url.clone()),
            submissions: PollConfig {
                polling_interval_ms: load_number(
                    &lookup,
                    "POLLING_INTERVAL_MS",
                    poll.polling_interval_ms,
                ),
                stale_time_ms: load_number(&lookup, "STALE_TIME_MS", poll.stale_time_ms),
                initial_load_max_retries: load_number(
                    &lookup,
                    "INITIAL_LOAD_MAX_RETRIES",
                    poll.initial_load_max_retries,
                ),
                polling_max_retries: load_number(
                    &lookup,
                    "POLLING_MAX_RETRIES",
                    poll.polling_max_retries,
                ),
                initial_retry_base_delay_ms: load_number(
                    &lookup,
                    "INITIAL_RETRY_BASE_DELAY_MS",
                    poll.initial_retry_base_delay_ms,
                ),
                initial_retry_max_delay_ms: load_number(
                    &lookup,
                    "INITIAL_RETRY_MAX_DELAY_MS",
                    poll.initial_retry_max_delay_ms,
                ),
                polling_retry_base_delay_ms: load_number(
                    &lookup,
                    "POLLING_RETRY_BASE_DELAY_MS",
                    poll.polling_retry_base_delay_ms,
                ),
                polling_retry_max_delay_ms: load_number(
                    &lookup,
                    "POLLING_RETRY_MAX_DELAY_MS",
                    poll.polling_retry_max_delay_ms,
                ),
            },
            votes: VoteSyncConfig {
                storage_key: lookup("STORAGE_KEY").unwrap_or_else(|| votes.storage_key.clone()),
                send_debounce_ms: load_number(&lookup, "SEND_DEBOUNCE_MS", votes.send_debounce_ms),
                initial_retry_delay_ms: load_number(
                    &lookup,
                    "INITIAL_RETRY_DELAY_MS",
                    votes.initial_retry_delay_ms,
                ),
                max_retry_delay_ms: load_number(
                    &lookup,
                    "MAX_RETRY_DELAY_MS",
                    votes.max_retry_delay_ms,
                ),
            },
            confirmation: ConfirmationConfig {
                countdown_ticks: load_number(
                    &lookup,
                    "CONFIRM_COUNTDOWN_TICKS",
                    confirmation.countdown_ticks,
                ),
                tick_ms: load_number(&lookup, "CONFIRM_TICK_MS", confirmation.tick_ms),
            },
        };

        info!(
            "event=config_load module=config status=ok storage_key={} debounce_ms={}",
            config.votes.storage_key, config.votes.send_debounce_ms
        );
        config
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.votes.storage_key.trim().is_empty() {
            return Err(invalid("STORAGE_KEY", "must not be blank"));
        }
        if self.votes.send_debounce_ms == 0 {
            return Err(invalid("SEND_DEBOUNCE_MS", "must be positive"));
        }
        if self.votes.initial_retry_delay_ms == 0 {
            return Err(invalid("INITIAL_RETRY_DELAY_MS", "must be positive"));
        }
        if self.votes.max_retry_delay_ms < self.votes.initial_retry_delay_ms {
            return Err(invalid(
                "MAX_RETRY_DELAY_MS",
                "must not be smaller than INITIAL_RETRY_DELAY_MS",
            ));
        }
        if self.confirmation.countdown_ticks == 0 {
            return Err(invalid("CONFIRM_COUNTDOWN_TICKS", "must be positive"));
        }
        if self.confirmation.tick_ms == 0 {
            return Err(invalid("CONFIRM_TICK_MS", "must be positive"));
        }
        Ok(())
    }

    /// Joins the API base url with an endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), path)
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        reason: reason.to_string(),
    }
}

fn load_number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(err) => {
            warn!("event=config_load module=config status=fallback key={key} default={default} error={err}");
            default
        }
    }
}
