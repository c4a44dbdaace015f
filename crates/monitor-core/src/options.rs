// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-instance monitor configuration: the raw mapping as read from the agent
//! configuration, and its resolved, type-converted form.

use crate::error::ConfigError;
use crate::registry::MonitorDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Type converter applied to a declared option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    String,
    Integer,
    Float,
    Bool,
}

impl OptionType {
    fn expected(self) -> &'static str {
        match self {
            OptionType::String => "a string",
            OptionType::Integer => "an integer",
            OptionType::Float => "a number",
            OptionType::Bool => "a boolean",
        }
    }

    /// Converts a raw configuration value.
    ///
    /// Strings accept any scalar. Numbers and booleans also accept their string
    /// spelling, so `"8080"` is a valid integer.
    pub fn convert(self, option: &str, raw: &Value) -> Result<OptionValue, ConfigError> {
        let converted = match (self, raw) {
            (OptionType::String, Value::String(s)) => Some(OptionValue::String(s.clone())),
            (OptionType::String, Value::Number(n)) => Some(OptionValue::String(n.to_string())),
            (OptionType::String, Value::Bool(b)) => Some(OptionValue::String(b.to_string())),
            (OptionType::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .map(OptionValue::Integer),
            (OptionType::Integer, Value::String(s)) => {
                s.trim().parse::<i64>().ok().map(OptionValue::Integer)
            }
            (OptionType::Float, Value::Number(n)) => n.as_f64().map(OptionValue::Float),
            (OptionType::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(OptionValue::Float),
            (OptionType::Bool, Value::Bool(b)) => Some(OptionValue::Bool(*b)),
            (OptionType::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(OptionValue::Bool(true)),
                "false" => Some(OptionValue::Bool(false)),
                _ => None,
            },
            _ => None,
        };

        converted.ok_or_else(|| ConfigError::InvalidValue {
            option: option.to_string(),
            expected: self.expected(),
            got: raw.to_string(),
        })
    }
}

/// A resolved option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OptionValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Integer(v) => Some(*v as f64),
            OptionValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Best-effort conversion for options a module did not declare.
    fn from_json(raw: &Value) -> Option<Self> {
        match raw {
            Value::Bool(b) => Some(OptionValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(OptionValue::Integer)
                .or_else(|| n.as_f64().map(OptionValue::Float)),
            Value::String(s) => Some(OptionValue::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "{v}"),
            OptionValue::Integer(v) => write!(f, "{v}"),
            OptionValue::Float(v) => write!(f, "{v}"),
            OptionValue::String(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::String(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Integer(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

/// One monitor entry exactly as configured:
///
/// ```json
/// {"module": "tomcat_monitor", "id": "tomcat", "sample_interval": 30,
///  "monitor_url": "http://localhost:8080/manager/status"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMonitorConfig {
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Seconds between samples; the agent default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_interval: Option<f64>,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl RawMonitorConfig {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            id: None,
            sample_interval: None,
            options: Map::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_sample_interval(mut self, secs: f64) -> Self {
        self.sample_interval = Some(secs);
        self
    }

    #[must_use]
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// The raw value for `name`; `module` and `id` are answered from their
    /// dedicated fields and JSON `null` counts as absent.
    fn raw_value(&self, name: &str) -> Option<Value> {
        match name {
            "module" => Some(Value::String(self.module.clone())),
            "id" => self.id.clone().map(Value::String),
            _ => self.options.get(name).filter(|v| !v.is_null()).cloned(),
        }
    }
}

/// Resolved configuration of one monitor instance. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorInstanceConfig {
    module: String,
    id: Option<String>,
    sample_interval: Duration,
    values: BTreeMap<String, OptionValue>,
}

impl MonitorInstanceConfig {
    /// Validates `raw` against the options `definition` declares, applying
    /// converters and defaults.
    pub fn resolve(
        definition: &MonitorDefinition,
        raw: &RawMonitorConfig,
        default_interval: Duration,
    ) -> Result<Self, ConfigError> {
        let sample_interval = match raw.sample_interval {
            None if default_interval.is_zero() => {
                return Err(ConfigError::InvalidInterval(format!("{default_interval:?}")))
            }
            None => default_interval,
            Some(secs) => match Duration::try_from_secs_f64(secs) {
                Ok(interval) if !interval.is_zero() => interval,
                _ => return Err(ConfigError::InvalidInterval(secs.to_string())),
            },
        };

        let mut values = BTreeMap::new();
        for option in definition.options() {
            match raw.raw_value(&option.name) {
                Some(value) => {
                    let converted = option.option_type.convert(&option.name, &value)?;
                    values.insert(option.name.clone(), converted);
                }
                None => match &option.default {
                    Some(default) => {
                        values.insert(option.name.clone(), default.clone());
                    }
                    None if option.required => {
                        return Err(ConfigError::MissingRequired {
                            module: definition.module().to_string(),
                            option: option.name.clone(),
                        });
                    }
                    None => {}
                },
            }
        }

        for (name, value) in &raw.options {
            if values.contains_key(name) || definition.option(name).is_some() {
                continue;
            }
            match OptionValue::from_json(value) {
                Some(v) => {
                    debug!(
                        "Option '{name}' is not declared by {}, keeping it unconverted",
                        definition.module()
                    );
                    values.insert(name.clone(), v);
                }
                None => debug!("Ignoring non-scalar option '{name}' for {}", definition.module()),
            }
        }

        Ok(Self {
            module: raw.module.clone(),
            id: raw.id.clone(),
            sample_interval,
            values,
        })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn sample_interval(&self) -> Duration {
        self.sample_interval
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(OptionValue::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConfigOption, Registry};
    use serde_json::json;

    const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

    fn definition() -> MonitorDefinition {
        let mut registry = Registry::new();
        let owner = "test_monitor";
        registry.register_config_option(owner, ConfigOption::new("module", "module").required());
        registry.register_config_option(owner, ConfigOption::new("monitor_url", "url").required());
        registry.register_config_option(
            owner,
            ConfigOption::new("port", "port").with_type(OptionType::Integer),
        );
        registry.register_config_option(
            owner,
            ConfigOption::new("verbose", "verbose")
                .with_type(OptionType::Bool)
                .with_default(false),
        );
        registry.register_config_option(
            owner,
            ConfigOption::new("source_address", "source").with_default("127.0.0.1"),
        );
        registry
            .definition(owner)
            .cloned()
            .expect("definition registered")
    }

    #[test]
    fn test_resolve_applies_defaults_and_converters() {
        let raw = RawMonitorConfig::new("test_monitor")
            .with_id("a")
            .with_option("monitor_url", "http://localhost")
            .with_option("port", "8080")
            .with_option("extra", 3);
        let config = MonitorInstanceConfig::resolve(&definition(), &raw, DEFAULT_INTERVAL)
            .expect("valid config");

        assert_eq!(config.id(), Some("a"));
        assert_eq!(config.sample_interval(), DEFAULT_INTERVAL);
        assert_eq!(config.get_str("module"), Some("test_monitor"));
        assert_eq!(config.get("port"), Some(&OptionValue::Integer(8080)));
        assert_eq!(config.get("verbose"), Some(&OptionValue::Bool(false)));
        assert_eq!(config.get_str("source_address"), Some("127.0.0.1"));
        assert_eq!(config.get("extra"), Some(&OptionValue::Integer(3)));
    }

    #[test]
    fn test_missing_required_option() {
        let raw = RawMonitorConfig::new("test_monitor");
        let err = MonitorInstanceConfig::resolve(&definition(), &raw, DEFAULT_INTERVAL)
            .expect_err("monitor_url is required");
        assert_eq!(
            err,
            ConfigError::MissingRequired {
                module: "test_monitor".to_string(),
                option: "monitor_url".to_string(),
            }
        );
    }

    #[test]
    fn test_null_counts_as_missing() {
        let raw = RawMonitorConfig::new("test_monitor").with_option("monitor_url", Value::Null);
        assert!(MonitorInstanceConfig::resolve(&definition(), &raw, DEFAULT_INTERVAL).is_err());
    }

    #[test]
    fn test_invalid_value() {
        let raw = RawMonitorConfig::new("test_monitor")
            .with_option("monitor_url", "http://localhost")
            .with_option("port", "eighty");
        let err = MonitorInstanceConfig::resolve(&definition(), &raw, DEFAULT_INTERVAL)
            .expect_err("port is not an integer");
        assert!(matches!(err, ConfigError::InvalidValue { ref option, .. } if option == "port"));
    }

    #[test]
    fn test_sample_interval_override_and_validation() {
        let raw = RawMonitorConfig::new("test_monitor")
            .with_option("monitor_url", "http://localhost")
            .with_sample_interval(0.5);
        let config = MonitorInstanceConfig::resolve(&definition(), &raw, DEFAULT_INTERVAL)
            .expect("valid config");
        assert_eq!(config.sample_interval(), Duration::from_millis(500));

        let raw = raw.with_sample_interval(0.0);
        assert!(matches!(
            MonitorInstanceConfig::resolve(&definition(), &raw, DEFAULT_INTERVAL),
            Err(ConfigError::InvalidInterval(_))
        ));
    }

    #[test]
    fn test_sample_interval_out_of_duration_range() {
        // Rounds to a zero period, or does not fit in a Duration at all.
        for secs in [1e-10, -1.0, 1e30, f64::NAN, f64::INFINITY] {
            let raw = RawMonitorConfig::new("test_monitor")
                .with_option("monitor_url", "http://localhost")
                .with_sample_interval(secs);
            assert!(
                matches!(
                    MonitorInstanceConfig::resolve(&definition(), &raw, DEFAULT_INTERVAL),
                    Err(ConfigError::InvalidInterval(_))
                ),
                "sample_interval {secs} accepted"
            );
        }

        let raw = RawMonitorConfig::new("test_monitor").with_option("monitor_url", "http://localhost");
        assert!(matches!(
            MonitorInstanceConfig::resolve(&definition(), &raw, Duration::ZERO),
            Err(ConfigError::InvalidInterval(_))
        ));
    }

    #[test]
    fn test_converters() {
        assert_eq!(
            OptionType::String.convert("x", &json!(12)),
            Ok(OptionValue::String("12".to_string()))
        );
        assert_eq!(
            OptionType::Integer.convert("x", &json!(12.0)),
            Ok(OptionValue::Integer(12))
        );
        assert!(OptionType::Integer.convert("x", &json!(12.5)).is_err());
        assert_eq!(
            OptionType::Float.convert("x", &json!("0.25")),
            Ok(OptionValue::Float(0.25))
        );
        assert_eq!(
            OptionType::Bool.convert("x", &json!("TRUE")),
            Ok(OptionValue::Bool(true))
        );
        assert!(OptionType::String.convert("x", &json!([1, 2])).is_err());
    }

    #[test]
    fn test_deserialize_raw_config() {
        let raw: RawMonitorConfig = serde_json::from_value(json!({
            "module": "tomcat_monitor",
            "id": "tomcat",
            "sample_interval": 10,
            "monitor_url": "http://localhost:8080/manager/status"
        }))
        .expect("valid raw config");
        assert_eq!(raw.module, "tomcat_monitor");
        assert_eq!(raw.id.as_deref(), Some("tomcat"));
        assert_eq!(raw.sample_interval, Some(10.0));
        assert_eq!(
            raw.options.get("monitor_url"),
            Some(&json!("http://localhost:8080/manager/status"))
        );
        assert!(!raw.options.contains_key("module"));
    }
}
