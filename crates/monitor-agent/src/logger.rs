// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log line format for the agent.
//!
//! ```text
//! MONITOR_AGENT | INFO | metrics | tomcat.runtime.threads 10 type=active monitor="tomcat_monitor" instance="tomcat"
//! MONITOR_AGENT | ERROR | monitor_core::runtime | Failed to gather sample: ... monitor=tomcat_monitor(tomcat)
//! ```

use crate::error::AgentError;
use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

const PREFIX: &str = "MONITOR_AGENT";

/// Prefixes every line with the agent name, level and target.
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        write!(
            &mut writer,
            "{PREFIX} | {} | {} | ",
            metadata.level(),
            metadata.target()
        )?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Filter directive for `level`, muting the HTTP stack's own chatter.
pub fn filter_directive(level: &str) -> String {
    format!("h2=off,hyper=off,hyper_util=off,reqwest=off,rustls=off,{level}")
}

/// Installs the global subscriber.
pub fn init(level: &str) -> Result<(), AgentError> {
    let filter = EnvFilter::try_new(filter_directive(level))
        .map_err(|e| AgentError::Logging(format!("could not parse log level '{level}': {e}")))?;

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .event_format(Formatter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AgentError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_format_prefix_level_target() {
        let buffer = Buffer::default();
        let subscriber = tracing_subscriber::fmt::Subscriber::builder()
            .with_writer(buffer.clone())
            .with_ansi(false)
            .event_format(Formatter)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "metrics", monitor = "tomcat_monitor", "tomcat.runtime.threads 10");
        });

        let output = String::from_utf8(buffer.0.lock().expect("lock").clone()).expect("utf8");
        assert_eq!(
            output,
            "MONITOR_AGENT | INFO | metrics | tomcat.runtime.threads 10 monitor=\"tomcat_monitor\"\n"
        );
    }

    #[test]
    fn test_filter_directive_parses() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(EnvFilter::try_new(filter_directive(level)).is_ok());
        }
    }
}
