//! Engine timing knobs read from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Leaderboard recomputation window per session.
    pub leaderboard_debounce: Duration,
    /// Schedule sweeper tick.
    pub sweep_interval: Duration,
    pub ws_heartbeat_interval: Duration,
    pub ws_client_timeout: Duration,
    /// Attempts for a transition that keeps losing the optimistic lock.
    pub max_transition_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            leaderboard_debounce: Duration::from_millis(2_000),
            sweep_interval: Duration::from_secs(5),
            ws_heartbeat_interval: Duration::from_secs(20),
            ws_client_timeout: Duration::from_secs(40),
            max_transition_attempts: 3,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();
        let config = Self {
            leaderboard_debounce: parse_or(&lookup, "LEADERBOARD_DEBOUNCE_MS", Duration::from_millis)?
                .unwrap_or(defaults.leaderboard_debounce),
            sweep_interval: parse_or(&lookup, "SWEEP_INTERVAL_SECS", Duration::from_secs)?
                .unwrap_or(defaults.sweep_interval),
            ws_heartbeat_interval: parse_or(&lookup, "WS_HEARTBEAT_SECS", Duration::from_secs)?
                .unwrap_or(defaults.ws_heartbeat_interval),
            ws_client_timeout: parse_or(&lookup, "WS_CLIENT_TIMEOUT_SECS", Duration::from_secs)?
                .unwrap_or(defaults.ws_client_timeout),
            max_transition_attempts: parse_or(&lookup, "MAX_TRANSITION_ATTEMPTS", |v| {
                u32::try_from(v).unwrap_or(u32::MAX)
            })?
            .unwrap_or(defaults.max_transition_attempts),
        };

        if config.sweep_interval.is_zero() {
            return Err(AppError::config("SWEEP_INTERVAL_SECS must be positive"));
        }
        if config.max_transition_attempts == 0 {
            return Err(AppError::config("MAX_TRANSITION_ATTEMPTS must be at least 1"));
        }
        if config.ws_client_timeout <= config.ws_heartbeat_interval {
            return Err(AppError::config(
                "WS_CLIENT_TIMEOUT_SECS must exceed WS_HEARTBEAT_SECS",
            ));
        }
        Ok(config)
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    wrap: impl Fn(u64) -> T,
) -> Result<Option<T>, AppError> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => u64::from_str(raw.trim())
            .map(|v| Some(wrap(v)))
            .map_err(|_| AppError::config(format!("{name} must be a non-negative integer, got '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        let cfg = EngineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn overrides_and_validation() {
        let cfg = EngineConfig::from_lookup(|name| match name {
            "LEADERBOARD_DEBOUNCE_MS" => Some("250".into()),
            "SWEEP_INTERVAL_SECS" => Some("1".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.leaderboard_debounce, Duration::from_millis(250));
        assert_eq!(cfg.sweep_interval, Duration::from_secs(1));

        let err = EngineConfig::from_lookup(|name| {
            (name == "SWEEP_INTERVAL_SECS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }

    #[test]
    fn transition_attempts_are_configurable_but_never_zero() {
        let cfg = EngineConfig::from_lookup(|name| {
            (name == "MAX_TRANSITION_ATTEMPTS").then(|| "5".to_string())
        })
        .unwrap();
        assert_eq!(cfg.max_transition_attempts, 5);

        let err = EngineConfig::from_lookup(|name| {
            (name == "MAX_TRANSITION_ATTEMPTS").then(|| "0".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }
}
