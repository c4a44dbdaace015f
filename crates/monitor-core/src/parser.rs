// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Report parsing capability for monitors that scrape semi-structured text.
//!
//! Parsers are plain functions of the report text. They live outside the
//! runtime's state machine, so a parser bug can only cost metrics, never a
//! scheduling slot.

use crate::emitter::SampleEmitter;
use crate::sample::{Fields, SampleValue};
use tracing::debug;

/// One metric extracted from a report.
///
/// `value` is `None` when the metric was located but could not be converted;
/// such entries are skipped at emission time.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedValue {
    pub metric: String,
    pub value: Option<SampleValue>,
    pub fields: Fields,
}

impl ParsedValue {
    pub fn new<V: Into<SampleValue>>(metric: impl Into<String>, value: Option<V>) -> Self {
        Self {
            metric: metric.into(),
            value: value.map(Into::into),
            fields: Fields::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

pub trait ReportParser: Send + Sync {
    fn parse(&self, report: &str) -> Vec<ParsedValue>;
}

/// Emits every parsed value that has one. Returns how many were skipped.
pub fn emit_parsed(emitter: &SampleEmitter, values: Vec<ParsedValue>) -> usize {
    let mut skipped = 0;
    for parsed in values {
        match parsed.value {
            Some(value) => {
                let fields = (!parsed.fields.is_empty()).then_some(parsed.fields);
                emitter.emit_value(&parsed.metric, value, fields);
            }
            None => {
                debug!(
                    monitor = %emitter.identity(),
                    "Skipping '{}' for this sample: value could not be parsed",
                    parsed.metric
                );
                skipped += 1;
            }
        }
    }
    skipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MetricDefinition, Registry};
    use crate::sample::MonitorId;
    use crate::transport::ChannelTransport;
    use std::sync::Arc;

    struct KeyValueParser;

    impl ReportParser for KeyValueParser {
        fn parse(&self, report: &str) -> Vec<ParsedValue> {
            report
                .lines()
                .filter_map(|line| line.split_once('='))
                .map(|(k, v)| ParsedValue::new(k.trim(), v.trim().parse::<i64>().ok()))
                .collect()
        }
    }

    #[tokio::test]
    async fn test_unparsable_values_are_skipped_not_zeroed() {
        let mut registry = Registry::new();
        registry.register_metric("kv", MetricDefinition::new("a", "a"));
        registry.register_metric("kv", MetricDefinition::new("b", "b"));
        registry.register_metric("kv", MetricDefinition::new("c", "c"));

        let (transport, mut rx) = ChannelTransport::new();
        let emitter = SampleEmitter::new(
            MonitorId::new("kv", None),
            Arc::new(registry),
            Arc::new(transport),
        );

        let values = KeyValueParser.parse("a=1\nb=not a number\nc=3");
        let skipped = emit_parsed(&emitter, values);
        assert_eq!(skipped, 1);

        let first = rx.recv().await.expect("a emitted");
        let second = rx.recv().await.expect("c emitted");
        assert_eq!((first.metric.as_str(), first.value), ("a", SampleValue::Integer(1)));
        assert_eq!((second.metric.as_str(), second.value), ("c", SampleValue::Integer(3)));
        assert!(rx.try_recv().is_err());
    }
}
