// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Process-level failures surfaced at the entry point.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to install logging: {0}")]
    Logging(String),

    #[error("Failed to listen for shutdown signals: {0}")]
    Signal(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AgentError::InvalidConfig("AGENT_MONITORS is not a JSON array".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: AGENT_MONITORS is not a JSON array"
        );
    }

    #[test]
    fn test_signal_error_from_io() {
        let error: AgentError = std::io::Error::other("no signal driver").into();
        assert!(error.to_string().contains("no signal driver"));
    }
}
