// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Catalog of what each monitor module declares: config options, metrics and
//! log fields.
//!
//! Registration happens once, while the [`crate::MonitorCatalog`] is being
//! built. The registry is then frozen behind an `Arc` and shared read-only by
//! every runtime and emitter, so lookups never take a lock.

use crate::options::{OptionType, OptionValue};
use crate::sample::Fields;
use serde::Serialize;
use std::collections::BTreeMap;

/// A configuration option declared by a monitor module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigOption {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub option_type: OptionType,
    pub default: Option<OptionValue>,
}

impl ConfigOption {
    /// An optional string option with no default.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
            option_type: OptionType::String,
            default: None,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_type(mut self, option_type: OptionType) -> Self {
        self.option_type = option_type;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<OptionValue>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// A metric declared by a monitor module.
///
/// The same metric name may be declared several times with different static
/// `extra_fields`, one declaration per documented dimension value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDefinition {
    pub name: String,
    pub description: String,
    pub extra_fields: Fields,
    pub cumulative: bool,
    pub category: Option<String>,
}

impl MetricDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            extra_fields: Fields::new(),
            cumulative: false,
            category: None,
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn cumulative(mut self) -> Self {
        self.cumulative = true;
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// How many static fields agree with `fields`, or `None` if one conflicts.
    fn agreement(&self, fields: &Fields) -> Option<usize> {
        let mut agreeing = 0;
        for (key, value) in &self.extra_fields {
            match fields.get(key) {
                Some(v) if v == value => agreeing += 1,
                Some(_) => return None,
                None => {}
            }
        }
        Some(agreeing)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogField {
    pub name: String,
    pub description: String,
}

/// Everything one monitor module declared.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorDefinition {
    module: String,
    options: Vec<ConfigOption>,
    metrics: Vec<MetricDefinition>,
    log_fields: Vec<LogField>,
}

impl MonitorDefinition {
    fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            ..Default::default()
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn options(&self) -> &[ConfigOption] {
        &self.options
    }

    pub fn option(&self, name: &str) -> Option<&ConfigOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn metrics(&self) -> &[MetricDefinition] {
        &self.metrics
    }

    /// All declarations of `name`, in registration order.
    pub fn metric_variants<'a, 'b: 'a>(
        &'b self,
        name: &'a str,
    ) -> impl Iterator<Item = &'b MetricDefinition> + 'a {
        self.metrics.iter().filter(move |m| m.name == name)
    }

    pub fn log_fields(&self) -> &[LogField] {
        &self.log_fields
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    modules: BTreeMap<String, MonitorDefinition>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, owner: &str) -> &mut MonitorDefinition {
        self.modules
            .entry(owner.to_string())
            .or_insert_with(|| MonitorDefinition::new(owner))
    }

    /// Makes `owner` known even if it declares nothing else.
    pub fn declare_module(&mut self, owner: &str) {
        self.entry(owner);
    }

    /// Declares a config option; re-declaring the same name replaces it.
    pub fn register_config_option(&mut self, owner: &str, option: ConfigOption) {
        let definition = self.entry(owner);
        match definition.options.iter_mut().find(|o| o.name == option.name) {
            Some(existing) => *existing = option,
            None => definition.options.push(option),
        }
    }

    /// Declares a metric. The key is `(name, extra_fields)`; re-declaring an
    /// existing key replaces its documentation.
    pub fn register_metric(&mut self, owner: &str, metric: MetricDefinition) {
        let definition = self.entry(owner);
        match definition
            .metrics
            .iter_mut()
            .find(|m| m.name == metric.name && m.extra_fields == metric.extra_fields)
        {
            Some(existing) => *existing = metric,
            None => definition.metrics.push(metric),
        }
    }

    pub fn register_log_field(&mut self, owner: &str, name: &str, description: &str) {
        let definition = self.entry(owner);
        let field = LogField {
            name: name.to_string(),
            description: description.to_string(),
        };
        match definition.log_fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => *existing = field,
            None => definition.log_fields.push(field),
        }
    }

    pub fn definition(&self, owner: &str) -> Option<&MonitorDefinition> {
        self.modules.get(owner)
    }

    /// First declaration of `name` under `owner`.
    pub fn lookup(&self, owner: &str, name: &str) -> Option<&MetricDefinition> {
        self.definition(owner)?.metric_variants(name).next()
    }

    /// The declaration of `name` whose static fields best match `fields`.
    ///
    /// Declarations with a static field that contradicts the call site are
    /// skipped unless every declaration contradicts it, in which case the
    /// first one is returned (the call-site values win when merged anyway).
    pub fn resolve(&self, owner: &str, name: &str, fields: &Fields) -> Option<&MetricDefinition> {
        let definition = self.definition(owner)?;
        let mut best: Option<(&MetricDefinition, usize)> = None;
        for metric in definition.metric_variants(name) {
            if let Some(score) = metric.agreement(fields) {
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((metric, score));
                }
            }
        }
        best.map(|(m, _)| m)
            .or_else(|| definition.metric_variants(name).next())
    }

    /// Static fields to attach to an emission of `name` with `fields`.
    ///
    /// Only fields shared by every best-matching declaration are returned, so
    /// a tie between variants never picks a dimension the caller did not give.
    /// `None` if `name` is not declared for `owner`.
    pub fn resolve_fields(&self, owner: &str, name: &str, fields: &Fields) -> Option<Fields> {
        let definition = self.definition(owner)?;
        let mut best_score = None;
        let mut tied: Vec<&MetricDefinition> = Vec::new();
        for metric in definition.metric_variants(name) {
            let Some(score) = metric.agreement(fields) else {
                continue;
            };
            match best_score {
                Some(best) if score < best => {}
                Some(best) if score == best => tied.push(metric),
                _ => {
                    best_score = Some(score);
                    tied.clear();
                    tied.push(metric);
                }
            }
        }
        if tied.is_empty() {
            tied = definition.metric_variants(name).collect();
        }

        let (first, rest) = tied.split_first()?;
        let mut shared = first.extra_fields.clone();
        shared.retain(|key, value| {
            rest.iter()
                .all(|m| m.extra_fields.get(key) == Some(&*value))
        });
        Some(shared)
    }

    /// Every registered module, sorted by module name.
    pub fn modules(&self) -> impl Iterator<Item = &MonitorDefinition> {
        self.modules.values()
    }
}
