// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Value objects produced by an emission.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Extra dimensions attached to a sample. Keys are unique and unordered.
pub type Fields = BTreeMap<String, String>;

/// Identity of one configured monitor instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MonitorId {
    module: String,
    instance: Option<String>,
}

impl MonitorId {
    pub fn new(module: impl Into<String>, instance: Option<String>) -> Self {
        Self {
            module: module.into(),
            instance,
        }
    }

    /// The owning module, also used as the metric namespace in logs.
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Some(instance) => write!(f, "{}({})", self.module, instance),
            None => write!(f, "{}", self.module),
        }
    }
}

/// A canonical measured value. Unit conversion happens before this point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SampleValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl SampleValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Integer(v) => Some(*v as f64),
            SampleValue::Float(v) => Some(*v),
            SampleValue::Text(_) => None,
        }
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Integer(v) => write!(f, "{v}"),
            SampleValue::Float(v) => write!(f, "{v}"),
            SampleValue::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for SampleValue {
    fn from(value: i64) -> Self {
        SampleValue::Integer(value)
    }
}

impl From<i32> for SampleValue {
    fn from(value: i32) -> Self {
        SampleValue::Integer(i64::from(value))
    }
}

impl From<u32> for SampleValue {
    fn from(value: u32) -> Self {
        SampleValue::Integer(i64::from(value))
    }
}

impl From<u64> for SampleValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => SampleValue::Integer(v),
            Err(_) => SampleValue::Float(value as f64),
        }
    }
}

impl From<f64> for SampleValue {
    fn from(value: f64) -> Self {
        SampleValue::Float(value)
    }
}

impl From<f32> for SampleValue {
    fn from(value: f32) -> Self {
        SampleValue::Float(f64::from(value))
    }
}

impl From<String> for SampleValue {
    fn from(value: String) -> Self {
        SampleValue::Text(value)
    }
}

impl From<&str> for SampleValue {
    fn from(value: &str) -> Self {
        SampleValue::Text(value.to_string())
    }
}

/// One emitted measurement, handed to the transport and then dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRecord {
    pub monitor: MonitorId,
    pub metric: String,
    pub value: SampleValue,
    pub timestamp: DateTime<Utc>,
    pub fields: Fields,
}

impl fmt::Display for SampleRecord {
    /// Renders the record as a metric log line: `metric value key=value ...`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.metric, self.value)?;
        for (key, value) in &self.fields {
            if value.is_empty() || value.contains(|c: char| c.is_whitespace() || c == '"' || c == '=')
            {
                write!(f, " {key}={value:?}")?;
            } else {
                write!(f, " {key}={value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: Fields) -> SampleRecord {
        SampleRecord {
            monitor: MonitorId::new("tomcat_monitor", Some("tomcat".to_string())),
            metric: "tomcat.runtime.threads".to_string(),
            value: SampleValue::Integer(200),
            timestamp: Utc::now(),
            fields,
        }
    }

    #[test]
    fn test_monitor_id_display() {
        assert_eq!(
            MonitorId::new("tomcat_monitor", Some("a".to_string())).to_string(),
            "tomcat_monitor(a)"
        );
        assert_eq!(MonitorId::new("linux_system", None).to_string(), "linux_system");
    }

    #[test]
    fn test_record_line_format() {
        let mut fields = Fields::new();
        fields.insert("type".to_string(), "max".to_string());
        fields.insert("pool".to_string(), "Eden Space".to_string());
        assert_eq!(
            record(fields).to_string(),
            "tomcat.runtime.threads 200 pool=\"Eden Space\" type=max"
        );
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(SampleValue::from(3_u32), SampleValue::Integer(3));
        assert_eq!(SampleValue::from(u64::MAX).as_f64(), Some(u64::MAX as f64));
        assert_eq!(SampleValue::from(6.38), SampleValue::Float(6.38));
        assert_eq!(SampleValue::from("up").as_f64(), None);
        assert_eq!(SampleValue::from("up").to_string(), "\"up\"");
    }
}
