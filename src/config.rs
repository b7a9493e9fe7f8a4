//! Configuration types.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::validation::FieldKind;

/// Default quiet period before a field check is sent.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(450);

/// Default upper bound for a single remote availability check.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(8);

/// Debounced field validator configuration.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Quiet period: a check is sent only after no new value arrived for this long.
    pub debounce: Duration,
    /// A remote check that takes longer than this resolves to `Invalid`.
    pub check_timeout: Duration,
    /// Abort the task of a superseded check instead of letting it run to
    /// completion and be discarded.
    pub abort_superseded: bool,
    /// Values shorter than this (in chars, after trimming) short-circuit to `Idle`.
    pub min_lengths: HashMap<FieldKind, usize>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        let min_lengths = FieldKind::ALL
            .iter()
            .map(|kind| (*kind, kind.default_min_length()))
            .collect();
        Self {
            debounce: DEFAULT_DEBOUNCE,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
            abort_superseded: true,
            min_lengths,
        }
    }
}

impl ValidatorConfig {
    /// Minimum length for a field kind.
    pub fn min_length(&self, kind: FieldKind) -> usize {
        self.min_lengths
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_min_length())
    }
}

/// Application configuration for the terminal host.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path of the libSQL database holding workflow snapshots.
    pub db_path: PathBuf,
    /// Base URL of the availability service. `None` uses the in-memory checker.
    pub check_url: Option<String>,
    /// Field validator settings.
    pub validator: ValidatorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/signup-flow.db"),
            check_url: None,
            validator: ValidatorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Build configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Recognised keys: `SIGNUP_DB_PATH`, `SIGNUP_CHECK_URL`,
    /// `SIGNUP_DEBOUNCE_MS`, `SIGNUP_CHECK_TIMEOUT_MS`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("SIGNUP_DB_PATH").filter(|p| !p.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }

        config.check_url = lookup("SIGNUP_CHECK_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        if let Some(ms) = parse_millis(&lookup, "SIGNUP_DEBOUNCE_MS")? {
            config.validator.debounce = ms;
        }
        if let Some(ms) = parse_millis(&lookup, "SIGNUP_CHECK_TIMEOUT_MS")? {
            if ms.is_zero() {
                return Err(ConfigError::InvalidValue {
                    key: "SIGNUP_CHECK_TIMEOUT_MS".to_string(),
                    message: "timeout must be greater than zero".to_string(),
                });
            }
            config.validator.check_timeout = ms;
        }

        Ok(config)
    }
}

fn parse_millis<F>(lookup: &F, key: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected milliseconds, got {raw:?} ({e})"),
            }),
    }
}
