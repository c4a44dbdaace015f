// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::AgentError;
use monitor_core::{ManagerConfig, RawMonitorConfig};
use std::env;
use std::time::Duration;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 30;
const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STATUS_INTERVAL_SECS: u64 = 60;
const DEFAULT_UNHEALTHY_AFTER: u32 = 3;

/// Agent configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Interval for monitors that do not set `sample_interval`
    pub sample_interval: Duration,
    /// Bound on the graceful stop at shutdown
    pub stop_timeout: Duration,
    /// How often the status summary is logged
    pub status_interval: Duration,
    /// Consecutive failures after which a monitor is reported unhealthy
    pub unhealthy_after: u32,
    pub monitors: Vec<RawMonitorConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            sample_interval: Duration::from_secs(DEFAULT_SAMPLE_INTERVAL_SECS),
            stop_timeout: Duration::from_secs(DEFAULT_STOP_TIMEOUT_SECS),
            status_interval: Duration::from_secs(DEFAULT_STATUS_INTERVAL_SECS),
            unhealthy_after: DEFAULT_UNHEALTHY_AFTER,
            monitors: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, AgentError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`AgentConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AgentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_level = lookup("AGENT_LOG_LEVEL")
            .map(|val| val.trim().to_lowercase())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let sample_interval = seconds(&lookup, "AGENT_SAMPLE_INTERVAL_SECS", DEFAULT_SAMPLE_INTERVAL_SECS)?;
        let stop_timeout = seconds(&lookup, "AGENT_STOP_TIMEOUT_SECS", DEFAULT_STOP_TIMEOUT_SECS)?;
        let status_interval = seconds(&lookup, "AGENT_STATUS_INTERVAL_SECS", DEFAULT_STATUS_INTERVAL_SECS)?;
        let unhealthy_after = match lookup("AGENT_UNHEALTHY_AFTER") {
            Some(val) => val.trim().parse::<u32>().map_err(|_| {
                AgentError::InvalidConfig(format!(
                    "AGENT_UNHEALTHY_AFTER must be a non-negative integer, got '{val}'"
                ))
            })?,
            None => DEFAULT_UNHEALTHY_AFTER,
        };
        let monitors = match lookup("AGENT_MONITORS") {
            Some(val) if !val.trim().is_empty() => parse_monitors(&val)?,
            _ => Vec::new(),
        };

        let config = Self {
            log_level,
            sample_interval,
            stop_timeout,
            status_interval,
            unhealthy_after,
            monitors,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AgentError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(AgentError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        if self.sample_interval.is_zero() {
            return Err(AgentError::InvalidConfig(
                "AGENT_SAMPLE_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        if self.status_interval.is_zero() {
            return Err(AgentError::InvalidConfig(
                "AGENT_STATUS_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            default_sample_interval: self.sample_interval,
            unhealthy_after: self.unhealthy_after,
        }
    }
}

fn seconds<F>(lookup: &F, key: &str, default: u64) -> Result<Duration, AgentError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| {
                AgentError::InvalidConfig(format!("{key} must be a whole number of seconds, got '{val}'"))
            }),
        None => Ok(Duration::from_secs(default)),
    }
}

fn parse_monitors(raw: &str) -> Result<Vec<RawMonitorConfig>, AgentError> {
    serde_json::from_str(raw)
        .map_err(|e| AgentError::InvalidConfig(format!("AGENT_MONITORS is not a valid monitor list: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = AgentConfig::from_lookup(lookup(&[])).expect("defaults are valid");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.sample_interval, Duration::from_secs(30));
        assert_eq!(config.stop_timeout, Duration::from_secs(10));
        assert_eq!(config.status_interval, Duration::from_secs(60));
        assert!(config.monitors.is_empty());
        assert_eq!(config.manager_config(), ManagerConfig::default());
    }

    #[test]
    fn test_monitors_from_json() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("AGENT_LOG_LEVEL", "DEBUG"),
            ("AGENT_SAMPLE_INTERVAL_SECS", "15"),
            (
                "AGENT_MONITORS",
                r#"[{"module": "tomcat_monitor", "id": "tomcat", "sample_interval": 5,
                    "monitor_url": "http://localhost:8080/manager/status"}]"#,
            ),
        ]))
        .expect("valid config");

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.sample_interval, Duration::from_secs(15));
        assert_eq!(config.monitors.len(), 1);
        let monitor = &config.monitors[0];
        assert_eq!(monitor.module, "tomcat_monitor");
        assert_eq!(monitor.id.as_deref(), Some("tomcat"));
        assert_eq!(monitor.sample_interval, Some(5.0));
        assert_eq!(
            monitor.options.get("monitor_url").and_then(|v| v.as_str()),
            Some("http://localhost:8080/manager/status")
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AgentConfig::from_lookup(lookup(&[("AGENT_LOG_LEVEL", "loud")])).unwrap_err();
        assert!(err.to_string().contains("Invalid log level 'loud'"));

        let err = AgentConfig::from_lookup(lookup(&[("AGENT_SAMPLE_INTERVAL_SECS", "0")])).unwrap_err();
        assert!(err.to_string().contains("greater than 0"));

        let err = AgentConfig::from_lookup(lookup(&[("AGENT_STOP_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("AGENT_STOP_TIMEOUT_SECS"));

        let err = AgentConfig::from_lookup(lookup(&[("AGENT_MONITORS", r#"{"module": "x"}"#)])).unwrap_err();
        assert!(err.to_string().contains("AGENT_MONITORS"));

        let err = AgentConfig::from_lookup(lookup(&[("AGENT_MONITORS", r#"[{"id": "x"}]"#)])).unwrap_err();
        assert!(err.to_string().contains("module"));
    }
}
