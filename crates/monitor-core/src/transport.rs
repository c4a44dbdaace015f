// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The boundary between the emitter and whatever ships records off the host.

use crate::error::TransportError;
use crate::sample::SampleRecord;
use tokio::sync::mpsc;
use tracing::info;

/// Receives emitted records.
///
/// Every runtime submits from its own task, so implementations must accept
/// concurrent calls. `submit` must not block on the network.
pub trait Transport: Send + Sync {
    fn submit(&self, record: SampleRecord) -> Result<(), TransportError>;
}

/// Writes each record as a metric log line on the `metrics` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl Transport for LogTransport {
    fn submit(&self, record: SampleRecord) -> Result<(), TransportError> {
        info!(
            target: "metrics",
            monitor = record.monitor.module(),
            instance = record.monitor.instance().unwrap_or_default(),
            timestamp = %record.timestamp.to_rfc3339(),
            "{record}"
        );
        Ok(())
    }
}

/// Forwards records to a downstream consumer over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<SampleRecord>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SampleRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn submit(&self, record: SampleRecord) -> Result<(), TransportError> {
        self.tx.send(record).map_err(|_| TransportError::Closed)
    }
}
