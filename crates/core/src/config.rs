use std::time::Duration;

use crate::error::CoreError;

/// Default window (days) beyond which a scheduled date is flagged.
pub const DEFAULT_FUTURE_WINDOW_DAYS: i64 = 365;

/// Default notice period (days) for expiring documents.
pub const DEFAULT_EXPIRY_NOTICE_DAYS: i64 = 30;

/// Upper bound (days) for the planning window and expiry notice.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Default threshold after which a single rule is reported as slow.
pub const DEFAULT_SLOW_RULE_MS: u64 = 250;

/// Validation engine configuration.
///
/// All fields have defaults suitable for interactive use. Override via
/// environment variables with [`EngineConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Scheduled dates further ahead than this many days produce a warning.
    pub future_window_days: i64,
    /// Documents expiring within this many days produce a warning.
    pub expiry_notice_days: i64,
    /// Rules running longer than this are logged. They are never preempted.
    pub slow_rule_threshold: Duration,
    /// When set, a business rule whose collection key is absent from the
    /// dataset fails as misconfigured instead of passing vacuously.
    pub strict_collections: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            future_window_days: DEFAULT_FUTURE_WINDOW_DAYS,
            expiry_notice_days: DEFAULT_EXPIRY_NOTICE_DAYS,
            slow_rule_threshold: Duration::from_millis(DEFAULT_SLOW_RULE_MS),
            strict_collections: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default |
    /// |----------------------------------|---------|
    /// | `VALIDATION_FUTURE_WINDOW_DAYS`  | `365`   |
    /// | `VALIDATION_EXPIRY_NOTICE_DAYS`  | `30`    |
    /// | `VALIDATION_SLOW_RULE_MS`        | `250`   |
    /// | `VALIDATION_STRICT_COLLECTIONS`  | `false` |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Missing keys fall back to defaults; present but malformed values are
    /// rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let future_window_days = parse_var(
            &lookup,
            "VALIDATION_FUTURE_WINDOW_DAYS",
            DEFAULT_FUTURE_WINDOW_DAYS,
        )?;
        if !(1..=MAX_WINDOW_DAYS).contains(&future_window_days) {
            return Err(CoreError::Config(format!(
                "VALIDATION_FUTURE_WINDOW_DAYS must be between 1 and {MAX_WINDOW_DAYS}, got {future_window_days}"
            )));
        }

        let expiry_notice_days = parse_var(
            &lookup,
            "VALIDATION_EXPIRY_NOTICE_DAYS",
            DEFAULT_EXPIRY_NOTICE_DAYS,
        )?;
        if !(0..=MAX_WINDOW_DAYS).contains(&expiry_notice_days) {
            return Err(CoreError::Config(format!(
                "VALIDATION_EXPIRY_NOTICE_DAYS must be between 0 and {MAX_WINDOW_DAYS}, got {expiry_notice_days}"
            )));
        }

        let slow_rule_ms: u64 = parse_var(&lookup, "VALIDATION_SLOW_RULE_MS", DEFAULT_SLOW_RULE_MS)?;
        let strict_collections = parse_var(&lookup, "VALIDATION_STRICT_COLLECTIONS", false)?;

        Ok(Self {
            future_window_days,
            expiry_notice_days,
            slow_rule_threshold: Duration::from_millis(slow_rule_ms),
            strict_collections,
        })
    }
}

fn parse_var<F, V>(lookup: &F, key: &str, default: V) -> Result<V, CoreError>
where
    F: Fn(&str) -> Option<String>,
    V: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Config(format!("{key} has invalid value '{raw}'"))),
    }
}
