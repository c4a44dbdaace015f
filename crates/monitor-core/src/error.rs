// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while resolving a monitor instance's configuration.
///
/// All of them are fatal to the instance being configured and to nothing else.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required option '{option}' for module {module}")]
    MissingRequired { module: String, option: String },

    #[error("Invalid value for option '{option}': expected {expected}, got {got}")]
    InvalidValue {
        option: String,
        expected: &'static str,
        got: String,
    },

    #[error("sample_interval must be a positive number of seconds, got {0}")]
    InvalidInterval(String),

    #[error("Unknown monitor module '{0}'")]
    UnknownModule(String),

    #[error("Conflicting options: {0}")]
    Conflict(String),
}

/// Classification of a failure talking to a monitored target.
///
/// The classification only drives the wording of the log message; every kind is
/// handled the same way by the runtime (count it, wait for the next interval).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// The target answered with a 4xx status.
    EndpointMisconfigured(u16),
    /// The target answered with a 5xx status.
    ServerFailure(u16),
    /// The connection could not be established (refused, no route).
    HostUnreachable,
    Timeout,
    Other,
}

impl TransientKind {
    /// Maps an HTTP status code to a kind, `None` for non-error statuses.
    pub fn from_status(code: u16) -> Option<Self> {
        match code {
            400..=499 => Some(TransientKind::EndpointMisconfigured(code)),
            500..=599 => Some(TransientKind::ServerFailure(code)),
            _ => None,
        }
    }

    /// Human-actionable description of the failure for `target`.
    pub fn describe(&self, target: &str, detail: Option<&str>) -> String {
        match self {
            TransientKind::EndpointMisconfigured(404) => format!(
                "The URL used to request the status page appears to be incorrect ({target}). \
                 Please verify the correct URL and update the monitor configuration."
            ),
            TransientKind::EndpointMisconfigured(403) | TransientKind::EndpointMisconfigured(401) => format!(
                "The server is denying access to {target}. Please verify that permissions to \
                 access the status page are correctly configured on the server and that the \
                 monitor configuration reflects the same credentials."
            ),
            TransientKind::EndpointMisconfigured(code) => format!(
                "The request for {target} was rejected with HTTP error code {code}. \
                 Please verify the monitor configuration."
            ),
            TransientKind::ServerFailure(code) => format!(
                "The server failed to fulfill the request to {target}. Please consult the \
                 server logs to determine the cause. HTTP error code: {code}"
            ),
            TransientKind::HostUnreachable => format!(
                "The server does not appear to be running or cannot be reached. Please check \
                 that it is running and is reachable at the address: {target}"
            ),
            TransientKind::Timeout => {
                format!("Timed out waiting for {target} to respond.")
            }
            TransientKind::Other => format!(
                "An error occurred attempting to request {target}: {}",
                detail.unwrap_or("unknown error")
            ),
        }
    }
}

/// Errors returned by monitor code, during initialization or sampling.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{message}")]
    Transient { kind: TransientKind, message: String },

    #[error("Unexpected response format: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}

impl MonitorError {
    /// Builds a transient error for a non-success HTTP status.
    pub fn http_status(code: u16, target: &str) -> Self {
        let kind = TransientKind::from_status(code).unwrap_or(TransientKind::Other);
        let detail = format!("unexpected HTTP status {code}");
        MonitorError::Transient {
            kind,
            message: kind.describe(target, Some(&detail)),
        }
    }

    pub fn transient(kind: TransientKind, target: &str, detail: Option<&str>) -> Self {
        MonitorError::Transient {
            kind,
            message: kind.describe(target, detail),
        }
    }

    pub fn transient_kind(&self) -> Option<TransientKind> {
        match self {
            MonitorError::Transient { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Errors reported by a [`crate::Transport`] when a record cannot be accepted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("Transport channel closed")]
    Closed,

    #[error("Transport rejected record: {0}")]
    Rejected(String),
}

/// Reasons an emission did not reach the transport.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmitError {
    #[error("Metric '{metric}' is not registered for module {module}")]
    Unregistered { module: String, metric: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors from [`crate::MonitorManager`] bookkeeping.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ManagerError {
    #[error("Unknown monitor module '{0}'")]
    UnknownModule(String),

    #[error("A monitor with id '{0}' is already configured")]
    DuplicateId(String),

    #[error("Monitors already started")]
    AlreadyStarted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ConfigError::MissingRequired {
            module: "tomcat_monitor".to_string(),
            option: "monitor_url".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Missing required option 'monitor_url' for module tomcat_monitor"
        );
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(
            TransientKind::from_status(404),
            Some(TransientKind::EndpointMisconfigured(404))
        );
        assert_eq!(
            TransientKind::from_status(503),
            Some(TransientKind::ServerFailure(503))
        );
        assert_eq!(TransientKind::from_status(200), None);
        assert_eq!(TransientKind::from_status(302), None);
    }

    #[test]
    fn test_messages_distinguish_failure_kinds() {
        let not_found = MonitorError::http_status(404, "http://localhost:8080/manager/status");
        assert!(not_found.to_string().contains("appears to be incorrect"));

        let denied = MonitorError::http_status(403, "http://localhost:8080/manager/status");
        assert!(denied.to_string().contains("denying access"));

        let server = MonitorError::http_status(500, "http://localhost:8080/manager/status");
        assert!(server.to_string().contains("HTTP error code: 500"));
        assert_eq!(
            server.transient_kind(),
            Some(TransientKind::ServerFailure(500))
        );

        let unreachable =
            MonitorError::transient(TransientKind::HostUnreachable, "localhost:8080", None);
        assert!(unreachable.to_string().contains("cannot be reached"));
    }

    #[test]
    fn test_config_error_converts_into_monitor_error() {
        let error: MonitorError = ConfigError::Conflict("a without b".to_string()).into();
        assert!(matches!(error, MonitorError::Config(_)));
        assert_eq!(error.transient_kind(), None);
    }
}
