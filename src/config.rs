//! Environment-driven configuration for the tracking service.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::logging::LogFormat;
use crate::tracking::TrackerSettings;

pub const BIND_ADDR_VAR: &str = "RUSTYTRACK_BIND_ADDR";
pub const DEFAULT_WEIGHT_VAR: &str = "RUSTYTRACK_DEFAULT_WEIGHT_KG";
pub const ROUTE_BUDGET_VAR: &str = "RUSTYTRACK_ROUTE_BUDGET";
pub const CLOCK_SKEW_VAR: &str = "RUSTYTRACK_CLOCK_SKEW_TOLERANCE_SECS";
pub const STORE_TIMEOUT_VAR: &str = "RUSTYTRACK_STORE_TIMEOUT_MS";
pub const LOG_FORMAT_VAR: &str = "RUSTYTRACK_LOG_FORMAT";

const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    pub tracker: TrackerSettings,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build from an arbitrary variable source; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = TrackerSettings::default();

        let bind_addr = match parse_var(&lookup, BIND_ADDR_VAR)? {
            Some(addr) => addr,
            None => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        };
        let log_format = parse_var(&lookup, LOG_FORMAT_VAR)?.unwrap_or(LogFormat::Pretty);

        let default_weight_kg: f64 =
            parse_var(&lookup, DEFAULT_WEIGHT_VAR)?.unwrap_or(defaults.default_weight_kg);
        if !default_weight_kg.is_finite() || default_weight_kg <= 0.0 {
            return Err(invalid(DEFAULT_WEIGHT_VAR, default_weight_kg, "must be positive"));
        }

        let route_budget: usize = parse_var(&lookup, ROUTE_BUDGET_VAR)?.unwrap_or(defaults.route_budget);
        if route_budget < 2 {
            return Err(invalid(ROUTE_BUDGET_VAR, route_budget, "must be at least 2"));
        }

        let clock_skew_tolerance_secs: Option<f64> = parse_var(&lookup, CLOCK_SKEW_VAR)?;
        if let Some(tolerance) = clock_skew_tolerance_secs {
            if !tolerance.is_finite() || tolerance < 0.0 {
                return Err(invalid(CLOCK_SKEW_VAR, tolerance, "must be non-negative"));
            }
        }

        let store_timeout = match parse_var::<_, u64>(&lookup, STORE_TIMEOUT_VAR)? {
            Some(0) => return Err(invalid(STORE_TIMEOUT_VAR, 0, "must be positive")),
            Some(ms) => Duration::from_millis(ms),
            None => defaults.store_timeout,
        };

        Ok(Self {
            bind_addr,
            log_format,
            tracker: TrackerSettings {
                default_weight_kg,
                route_budget,
                clock_skew_tolerance_secs,
                store_timeout,
            },
        })
    }
}

/// `Ok(None)` when the variable is unset or blank.
fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(var).map(|raw| raw.trim().to_string()) else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(|err: T::Err| ConfigError::Invalid {
        var,
        value: raw.clone(),
        reason: err.to_string(),
    })
}

fn invalid(var: &'static str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.tracker.default_weight_kg, 70.0);
        assert_eq!(config.tracker.route_budget, 500);
        assert_eq!(config.tracker.clock_skew_tolerance_secs, None);
        assert_eq!(config.tracker.store_timeout, Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            (BIND_ADDR_VAR, "127.0.0.1:8080"),
            (DEFAULT_WEIGHT_VAR, "82.5"),
            (ROUTE_BUDGET_VAR, "120"),
            (CLOCK_SKEW_VAR, "2"),
            (STORE_TIMEOUT_VAR, "250"),
            (LOG_FORMAT_VAR, "json"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.tracker.default_weight_kg, 82.5);
        assert_eq!(config.tracker.route_budget, 120);
        assert_eq!(config.tracker.clock_skew_tolerance_secs, Some(2.0));
        assert_eq!(config.tracker.store_timeout, Duration::from_millis(250));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn malformed_values_fail() {
        assert!(config_from(&[(ROUTE_BUDGET_VAR, "lots")]).is_err());
        assert!(config_from(&[(ROUTE_BUDGET_VAR, "1")]).is_err());
        assert!(config_from(&[(DEFAULT_WEIGHT_VAR, "-4")]).is_err());
        assert!(config_from(&[(CLOCK_SKEW_VAR, "-1")]).is_err());
        assert!(config_from(&[(LOG_FORMAT_VAR, "xml")]).is_err());
    }
}
