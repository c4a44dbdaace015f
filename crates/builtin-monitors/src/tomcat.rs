// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tomcat server status monitor.
//!
//! Fetches the manager status page (`/manager/status`, role `manager-status`)
//! and reports JVM memory, connector thread and request counters, and the
//! memory pool table. Each instance can watch a different server.
//!
//! ```json
//! { "module": "tomcat_monitor", "id": "tomcat",
//!   "monitor_url": "http://localhost:8080/manager/status",
//!   "monitor_user": "statusmon", "monitor_password": "getstatus" }
//! ```

use async_trait::async_trait;
use monitor_core::units::{convert_to_megabytes, convert_to_milliseconds};
use monitor_core::{
    emit_parsed, ConfigError, ConfigOption, MetricDefinition, Monitor, MonitorError,
    MonitorInstanceConfig, MonitorKind, ParsedValue, Registry, ReportParser, SampleContext,
    SampleValue, TransientKind,
};
use regex::Regex;
use reqwest::Url;
use std::net::IpAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const MODULE: &str = "tomcat_monitor";

const DEFAULT_SOURCE_ADDRESS: &str = "127.0.0.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const JVM_HEADER: &str = "<h1>JVM</h1>";

const MEMORY_POOLS: &[(&str, &str, &str)] = &[
    (
        "cms_old_gen",
        "CMS Old Gen",
        "The memory pool for objects that have existed for some time in the survivor space / are long lived.",
    ),
    (
        "eden_space",
        "Eden Space",
        "The memory space from which objects are initially allocated.",
    ),
    (
        "survivor_space",
        "Survivor Space",
        "The memory pool for objects that have survived garbage collection of the Eden Space.",
    ),
    (
        "cms_perm_gen",
        "CMS Perm Gen",
        "Memory used for storing loaded classes.",
    ),
    (
        "code_cache",
        "Code Cache",
        "Memory used for caching the compilation and storage of native code.",
    ),
];

/// Pool table columns after the name and type cells, in page order.
const POOL_COLUMNS: &[(&str, &str)] = &[
    ("initial", "The initial amount of memory allocated to the memory pool."),
    ("allocated", "The total amount of memory allocated to the memory pool."),
    ("max", "The maximum amount of memory allocated to the memory pool."),
    ("used", "The total amount of memory used within the memory pool."),
];

#[derive(Debug, Clone, Copy)]
enum Unit {
    Megabytes,
    Milliseconds,
    Count,
}

impl Unit {
    fn value_pattern(self) -> &'static str {
        match self {
            Unit::Megabytes | Unit::Milliseconds => r"([^\s<]+ [^\s<]+)",
            Unit::Count => r"([^\s<]+)",
        }
    }

    fn convert(self, raw: &str) -> Option<SampleValue> {
        match self {
            Unit::Megabytes => convert_to_megabytes(raw).map(SampleValue::Float),
            Unit::Milliseconds => convert_to_milliseconds(raw).map(SampleValue::Float),
            Unit::Count => raw.parse::<i64>().ok().map(SampleValue::Integer),
        }
    }
}

struct GeneralStat {
    label: &'static str,
    metric: &'static str,
    kind: Option<&'static str>,
    unit: Unit,
}

const GENERAL_STATS: &[GeneralStat] = &[
    GeneralStat { label: "Free memory", metric: "tomcat.runtime.memory_bytes", kind: Some("free"), unit: Unit::Megabytes },
    GeneralStat { label: "Total memory", metric: "tomcat.runtime.memory_bytes", kind: Some("total"), unit: Unit::Megabytes },
    GeneralStat { label: "Max memory", metric: "tomcat.runtime.memory_bytes", kind: Some("max"), unit: Unit::Megabytes },
    GeneralStat { label: "Max threads", metric: "tomcat.runtime.threads", kind: Some("max"), unit: Unit::Count },
    GeneralStat { label: "Current thread count", metric: "tomcat.runtime.threads", kind: Some("active"), unit: Unit::Count },
    GeneralStat { label: "Current threads? busy", metric: "tomcat.runtime.threads", kind: Some("busy"), unit: Unit::Count },
    GeneralStat { label: "Max processing time", metric: "tomcat.runtime.processing_time_max", kind: None, unit: Unit::Milliseconds },
    GeneralStat { label: "Processing time", metric: "tomcat.runtime.processing_time", kind: None, unit: Unit::Milliseconds },
    GeneralStat { label: "Request count", metric: "tomcat.runtime.request_count", kind: None, unit: Unit::Count },
    GeneralStat { label: "Error count", metric: "tomcat.runtime.error_count", kind: None, unit: Unit::Count },
    GeneralStat { label: "Bytes received", metric: "tomcat.runtime.network_bytes", kind: Some("received"), unit: Unit::Megabytes },
    GeneralStat { label: "Bytes sent", metric: "tomcat.runtime.network_bytes", kind: Some("sent"), unit: Unit::Megabytes },
];

/// Extracts metrics from the Tomcat manager status page.
///
/// Each value is located on its own, so a renamed or missing label only
/// loses that one metric.
pub struct TomcatStatusParser {
    general: Vec<(&'static GeneralStat, Regex)>,
    pool_row: Regex,
}

impl TomcatStatusParser {
    pub fn new() -> Result<Self, regex::Error> {
        let general = GENERAL_STATS
            .iter()
            .map(|stat| {
                // Labels are case sensitive: "Processing time" must not match
                // inside "Max processing time".
                let pattern = format!(r"{}:\s*{}", stat.label, stat.unit.value_pattern());
                Regex::new(&pattern).map(|re| (stat, re))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let names = MEMORY_POOLS
            .iter()
            .map(|(_, label, _)| regex::escape(label))
            .collect::<Vec<_>>()
            .join("|");
        let cell = r"</td>\s*<td>([^<]*)";
        let pool_row = Regex::new(&format!(
            r"<td>[^<]*?({names}){cell}{cell}{cell}{cell}{cell}</td>"
        ))?;

        Ok(Self { general, pool_row })
    }

    fn parse_general(&self, jvm: &str, out: &mut Vec<ParsedValue>) {
        for (stat, re) in &self.general {
            let Some(raw) = re.captures(jvm).and_then(|c| c.get(1)) else {
                debug!("'{}' not found in Tomcat status page", stat.label);
                continue;
            };
            let mut parsed = ParsedValue::new(stat.metric, stat.unit.convert(raw.as_str()));
            if let Some(kind) = stat.kind {
                parsed = parsed.with_field("type", kind);
            }
            out.push(parsed);
        }
    }

    fn parse_pools(&self, jvm: &str, out: &mut Vec<ParsedValue>) {
        for row in self.pool_row.captures_iter(jvm) {
            let Some(pool) = row
                .get(1)
                .and_then(|label| MEMORY_POOLS.iter().find(|(_, l, _)| *l == label.as_str()))
                .map(|(name, _, _)| *name)
            else {
                continue;
            };
            // Group 2 is the pool type ("Heap memory"), not reported.
            for (offset, (column, _)) in POOL_COLUMNS.iter().enumerate() {
                let value = row
                    .get(offset + 3)
                    .and_then(|cell| convert_to_megabytes(cell.as_str().trim()));
                out.push(
                    ParsedValue::new(format!("tomcat.memory_pools.{column}"), value)
                        .with_field("pool", pool),
                );
            }
        }
    }
}

impl ReportParser for TomcatStatusParser {
    fn parse(&self, report: &str) -> Vec<ParsedValue> {
        let Some(start) = report.find(JVM_HEADER) else {
            return Vec::new();
        };
        let jvm = &report[start + JVM_HEADER.len()..];

        let mut out = Vec::new();
        self.parse_general(jvm, &mut out);
        self.parse_pools(jvm, &mut out);
        out
    }
}

pub struct TomcatMonitorKind;

impl MonitorKind for TomcatMonitorKind {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn describe_metrics(&self, registry: &mut Registry) {
        registry.register_config_option(MODULE, ConfigOption::new("module", "Always `tomcat_monitor`.").required());
        registry.register_config_option(
            MODULE,
            ConfigOption::new(
                "id",
                "Included in each log message generated by this monitor, as a field named `instance`.",
            ),
        );
        registry.register_config_option(
            MODULE,
            ConfigOption::new("monitor_url", "URL of the Tomcat manager status page.").required(),
        );
        registry.register_config_option(
            MODULE,
            ConfigOption::new("monitor_user", "The username required to access the monitor URL."),
        );
        registry.register_config_option(
            MODULE,
            ConfigOption::new(
                "monitor_password",
                "The password associated with `monitor_user`.",
            ),
        );
        registry.register_config_option(
            MODULE,
            ConfigOption::new(
                "source_address",
                "The IP address used as the source address when fetching the monitor URL. \
                 Some servers only serve the status page to requests from localhost.",
            )
            .with_default(DEFAULT_SOURCE_ADDRESS),
        );

        let general = |name: &str, description: &str| {
            MetricDefinition::new(name, description).category("general")
        };
        for (kind, description) in [
            ("free", "The amount of memory free."),
            ("total", "The total amount of memory available."),
            ("max", "The maximum amount of memory available."),
        ] {
            registry.register_metric(
                MODULE,
                general("tomcat.runtime.memory_bytes", description).with_field("type", kind),
            );
        }
        for (kind, description) in [
            ("max", "The maximum number of threads available/configured."),
            ("active", "The number of threads currently active."),
            ("busy", "The number of threads currently busy."),
        ] {
            registry.register_metric(
                MODULE,
                general("tomcat.runtime.threads", description).with_field("type", kind),
            );
        }
        registry.register_metric(
            MODULE,
            general(
                "tomcat.runtime.processing_time_max",
                "The largest amount of time spent processing a single request.",
            ),
        );
        registry.register_metric(
            MODULE,
            general(
                "tomcat.runtime.processing_time",
                "Total time spent processing requests.",
            ),
        );
        registry.register_metric(
            MODULE,
            general("tomcat.runtime.request_count", "The total number of requests made.").cumulative(),
        );
        registry.register_metric(
            MODULE,
            general(
                "tomcat.runtime.error_count",
                "The total number of requests that resulted in errors.",
            )
            .cumulative(),
        );
        for (kind, description) in [
            ("received", "The total number of bytes received by the server."),
            ("sent", "The total number of bytes sent by the server."),
        ] {
            registry.register_metric(
                MODULE,
                general("tomcat.runtime.network_bytes", description)
                    .with_field("type", kind)
                    .cumulative(),
            );
        }

        for (pool, _, pool_description) in MEMORY_POOLS {
            for (column, column_description) in POOL_COLUMNS {
                registry.register_metric(
                    MODULE,
                    MetricDefinition::new(
                        format!("tomcat.memory_pools.{column}"),
                        format!("{pool_description} {column_description}"),
                    )
                    .with_field("pool", *pool)
                    .category("memory"),
                );
            }
        }

        registry.register_log_field(MODULE, "monitor", "Always `tomcat_monitor`.");
        registry.register_log_field(MODULE, "instance", "The `id` value from the monitor configuration.");
        registry.register_log_field(MODULE, "metric", "The name of a metric being measured, e.g. \"tomcat.runtime.threads\".");
        registry.register_log_field(MODULE, "value", "The metric value.");
    }

    fn create(&self, config: &MonitorInstanceConfig) -> Result<Box<dyn Monitor>, MonitorError> {
        Ok(Box::new(TomcatMonitor::from_config(config)?))
    }
}

pub struct TomcatMonitor {
    url: Url,
    credentials: Option<(String, String)>,
    client: reqwest::Client,
    parser: TomcatStatusParser,
}

impl TomcatMonitor {
    /// Validates the instance options and builds the HTTP client bound to
    /// `source_address`.
    pub fn from_config(config: &MonitorInstanceConfig) -> Result<Self, MonitorError> {
        let raw_url = config
            .get_str("monitor_url")
            .ok_or_else(|| ConfigError::MissingRequired {
                module: MODULE.to_string(),
                option: "monitor_url".to_string(),
            })?;
        let url = Url::parse(raw_url).map_err(|e| ConfigError::InvalidValue {
            option: "monitor_url".to_string(),
            expected: "a valid URL",
            got: format!("{raw_url} ({e})"),
        })?;

        let credentials = match (config.get_str("monitor_user"), config.get_str("monitor_password")) {
            (Some(user), Some(password)) => Some((user.to_string(), password.to_string())),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Conflict(
                    "if monitor_user or monitor_password is specified, both must be specified"
                        .to_string(),
                )
                .into())
            }
        };

        let raw_source = config
            .get_str("source_address")
            .unwrap_or(DEFAULT_SOURCE_ADDRESS);
        let source_address: IpAddr = raw_source.parse().map_err(|_| ConfigError::InvalidValue {
            option: "source_address".to_string(),
            expected: "an IP address",
            got: raw_source.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .local_address(source_address)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MonitorError::Other(format!("Failed to build HTTP client: {e}")))?;
        let parser = TomcatStatusParser::new()
            .map_err(|e| MonitorError::Other(format!("Failed to build status parser: {e}")))?;

        Ok(Self {
            url,
            credentials,
            client,
            parser,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetches the status page. Returns `Ok(None)` when `stop` fired before
    /// the page arrived.
    pub async fn fetch_status(
        &self,
        stop: &CancellationToken,
    ) -> Result<Option<String>, MonitorError> {
        let mut request = self.client.get(self.url.clone());
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = tokio::select! {
            biased;
            () = stop.cancelled() => return Ok(None),
            response = request.send() => response.map_err(|e| self.classify(&e))?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::http_status(status.as_u16(), self.url.as_str()));
        }

        let body = tokio::select! {
            biased;
            () = stop.cancelled() => return Ok(None),
            body = response.text() => body.map_err(|e| self.classify(&e))?,
        };
        Ok(Some(body))
    }

    fn classify(&self, error: &reqwest::Error) -> MonitorError {
        let detail = error.to_string();
        if error.is_timeout() {
            MonitorError::transient(TransientKind::Timeout, self.url.as_str(), Some(&detail))
        } else if error.is_connect() {
            MonitorError::transient(TransientKind::HostUnreachable, &self.netloc(), Some(&detail))
        } else {
            MonitorError::transient(TransientKind::Other, self.url.as_str(), Some(&detail))
        }
    }

    fn netloc(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port_or_known_default() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }
}

#[async_trait]
impl Monitor for TomcatMonitor {
    async fn gather_sample(&mut self, ctx: &SampleContext<'_>) -> Result<(), MonitorError> {
        let Some(page) = self.fetch_status(ctx.stop_token()).await? else {
            debug!(monitor = %ctx.emitter().identity(), "Stop requested, abandoning status request");
            return Ok(());
        };

        let values = self.parser.parse(&page);
        if values.is_empty() {
            return Err(MonitorError::Parse(format!(
                "no JVM section found in the status page at {}",
                self.url
            )));
        }
        let skipped = emit_parsed(ctx.emitter(), values);
        if skipped > 0 {
            debug!(
                monitor = %ctx.emitter().identity(),
                "{skipped} Tomcat metric(s) could not be parsed this sample"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_core::RawMonitorConfig;

    const STATUS_PAGE: &str = r#"<html><body>
<h1>Server Information</h1><p>Tomcat Version: Apache Tomcat/7.0.52</p>
<h1>JVM</h1><p> Free memory: 6.38 MB Total memory: 16.87 MB Max memory: 123.75 MB</p>
<table border="0"><thead><tr><th>Memory Pool</th><th>Type</th><th>Initial</th><th>Total</th><th>Maximum</th><th>Used</th></tr></thead><tbody>
<tr><td>CMS Old Gen</td><td>Heap memory</td><td>10.50 MB</td><td>13.12 MB</td><td>87.37 MB</td><td>8.29 MB (9%)</td></tr>
<tr><td>Par Eden Space</td><td>Heap memory</td><td>2.75 MB</td><td>3.25 MB</td><td>33.18 MB</td><td>2.21 MB (6%)</td></tr>
<tr><td>Par Survivor Space</td><td>Heap memory</td><td>0.31 MB</td><td>0.50 MB</td><td>4.12 MB</td><td>0.17 MB (4%)</td></tr>
<tr><td>CMS Perm Gen</td><td>Non-heap memory</td><td>20.75 MB</td><td>22.31 MB</td><td>82.00 MB</td><td>22.07 MB (26%)</td></tr>
<tr><td>Code Cache</td><td>Non-heap memory</td><td>2.43 MB</td><td>2.56 MB</td><td>48.00 MB</td><td>bogus MB</td></tr>
</tbody></table>
<h1>"http-bio-8080"</h1><p> Max threads: 200 Current thread count: 10 Current thread busy: 1</p>
<p> Max processing time: 749 ms Processing time: 0.952 s Request count: 42 Error count: 5 Bytes received: 0.00 MB Bytes sent: 0.18 MB</p><table></table>
</body></html>"#;

    fn find<'a>(values: &'a [ParsedValue], metric: &str, key: &str, field: &str) -> &'a ParsedValue {
        values
            .iter()
            .find(|v| v.metric == metric && v.fields.get(key).map(String::as_str) == Some(field))
            .unwrap_or_else(|| panic!("{metric} {key}={field} not parsed"))
    }

    fn only<'a>(values: &'a [ParsedValue], metric: &str) -> &'a ParsedValue {
        values
            .iter()
            .find(|v| v.metric == metric)
            .unwrap_or_else(|| panic!("{metric} not parsed"))
    }

    fn float(value: &ParsedValue) -> f64 {
        value.value.as_ref().and_then(SampleValue::as_f64).expect("numeric value")
    }

    #[test]
    fn test_parse_general_status() {
        let parser = TomcatStatusParser::new().expect("patterns compile");
        let values = parser.parse(STATUS_PAGE);

        assert!((float(find(&values, "tomcat.runtime.memory_bytes", "type", "free")) - 6.38).abs() < 1e-9);
        assert!((float(find(&values, "tomcat.runtime.memory_bytes", "type", "max")) - 123.75).abs() < 1e-9);
        assert_eq!(
            find(&values, "tomcat.runtime.threads", "type", "active").value,
            Some(SampleValue::Integer(10))
        );
        assert_eq!(
            find(&values, "tomcat.runtime.threads", "type", "busy").value,
            Some(SampleValue::Integer(1))
        );
        assert!((float(only(&values, "tomcat.runtime.processing_time_max")) - 749.0).abs() < 1e-9);
        assert!((float(only(&values, "tomcat.runtime.processing_time")) - 952.0).abs() < 1e-9);
        assert_eq!(only(&values, "tomcat.runtime.request_count").value, Some(SampleValue::Integer(42)));
        assert_eq!(only(&values, "tomcat.runtime.error_count").value, Some(SampleValue::Integer(5)));
        assert!((float(find(&values, "tomcat.runtime.network_bytes", "type", "sent")) - 0.18).abs() < 1e-9);
    }

    #[test]
    fn test_parse_memory_pools() {
        let parser = TomcatStatusParser::new().expect("patterns compile");
        let values = parser.parse(STATUS_PAGE);

        let pools: Vec<_> = values
            .iter()
            .filter(|v| v.metric.starts_with("tomcat.memory_pools."))
            .collect();
        assert_eq!(pools.len(), 20);

        assert!((float(find(&values, "tomcat.memory_pools.used", "pool", "cms_old_gen")) - 8.29).abs() < 1e-9);
        assert!((float(find(&values, "tomcat.memory_pools.allocated", "pool", "eden_space")) - 3.25).abs() < 1e-9);
        assert!((float(find(&values, "tomcat.memory_pools.initial", "pool", "survivor_space")) - 0.31).abs() < 1e-9);
        assert!((float(find(&values, "tomcat.memory_pools.max", "pool", "cms_perm_gen")) - 82.0).abs() < 1e-9);
        // Located but unparsable: skipped at emission, never zero.
        assert_eq!(find(&values, "tomcat.memory_pools.used", "pool", "code_cache").value, None);
    }

    #[test]
    fn test_parse_without_jvm_section() {
        let parser = TomcatStatusParser::new().expect("patterns compile");
        assert!(parser.parse("<html><h1>Forbidden</h1></html>").is_empty());
    }

    fn resolve(raw: RawMonitorConfig) -> Result<MonitorInstanceConfig, ConfigError> {
        let mut registry = Registry::new();
        TomcatMonitorKind.describe_metrics(&mut registry);
        let definition = registry.definition(MODULE).expect("registered");
        MonitorInstanceConfig::resolve(definition, &raw, Duration::from_secs(30))
    }

    #[test]
    fn test_every_parsed_metric_is_registered() {
        let mut registry = Registry::new();
        TomcatMonitorKind.describe_metrics(&mut registry);
        let parser = TomcatStatusParser::new().expect("patterns compile");

        for value in parser.parse(STATUS_PAGE) {
            let resolved = registry
                .resolve(MODULE, &value.metric, &value.fields)
                .unwrap_or_else(|| panic!("{} is not registered", value.metric));
            assert_eq!(resolved.extra_fields, value.fields);
        }
    }

    #[test]
    fn test_credentials_must_come_in_pairs() {
        let config = resolve(
            RawMonitorConfig::new(MODULE)
                .with_option("monitor_url", "http://localhost:8080/manager/status")
                .with_option("monitor_user", "statusmon"),
        )
        .expect("options resolve");
        let err = TomcatMonitor::from_config(&config).err().expect("password missing");
        assert!(matches!(err, MonitorError::Config(ConfigError::Conflict(_))));

        let config = resolve(
            RawMonitorConfig::new(MODULE)
                .with_option("monitor_url", "http://localhost:8080/manager/status")
                .with_option("monitor_password", "getstatus"),
        )
        .expect("options resolve");
        assert!(TomcatMonitor::from_config(&config).is_err());
    }

    #[test]
    fn test_invalid_url_and_source_address() {
        let config = resolve(RawMonitorConfig::new(MODULE).with_option("monitor_url", "not a url"))
            .expect("options resolve");
        assert!(matches!(
            TomcatMonitor::from_config(&config).err(),
            Some(MonitorError::Config(ConfigError::InvalidValue { .. }))
        ));

        let config = resolve(
            RawMonitorConfig::new(MODULE)
                .with_option("monitor_url", "http://localhost:8080/manager/status")
                .with_option("source_address", "localhost"),
        )
        .expect("options resolve");
        assert!(matches!(
            TomcatMonitor::from_config(&config).err(),
            Some(MonitorError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_missing_url_fails_resolution() {
        let err = resolve(RawMonitorConfig::new(MODULE)).expect_err("monitor_url is required");
        assert_eq!(
            err,
            ConfigError::MissingRequired {
                module: MODULE.to_string(),
                option: "monitor_url".to_string(),
            }
        );
    }

    #[test]
    fn test_source_address_default_applied() {
        let config = resolve(
            RawMonitorConfig::new(MODULE).with_option("monitor_url", "http://localhost:8080/manager/status"),
        )
        .expect("options resolve");
        assert_eq!(config.get_str("source_address"), Some("127.0.0.1"));
        assert!(TomcatMonitor::from_config(&config).is_ok());
    }
}
