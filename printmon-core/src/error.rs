//! Error taxonomy for the monitoring engine.
//!
//! | Kind                  | Raised by                     | Outcome                              |
//! |-----------------------|-------------------------------|--------------------------------------|
//! | Evidence failure      | snapshot / classifier         | recovered in-round as `inconclusive` |
//! | Tick failure          | process control, config       | counted by the circuit breaker       |
//! | Side-effect failure   | queue manager                 | logged only                          |
//!
//! Evidence failures never leave the voting sequence, so they are only ever
//! seen as [`CollaboratorError`]. Anything that escapes a tick is a
//! [`MonitorError`].

use thiserror::Error;

/// Failure reported by an external collaborator (snapshot source,
/// classifier, printer control, queue manager).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Network-level failure: connect, timeout, TLS, body read.
    #[error("Request to {target} failed: {message}")]
    Transport { target: String, message: String },

    /// The collaborator answered with a non-success HTTP status.
    #[error("{target} returned HTTP {status}: {body}")]
    Status {
        target: String,
        status: u16,
        body: String,
    },

    /// The collaborator answered, but the reply could not be used.
    #[error("Unusable reply from {target}: {message}")]
    InvalidReply { target: String, message: String },

    /// No endpoint / URL configured for this collaborator.
    #[error("{0} is not configured")]
    NotConfigured(String),
}

impl CollaboratorError {
    pub fn transport(target: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            target: target.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_reply(target: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidReply {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Whether the collaborator never produced a response at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::NotConfigured(_))
    }
}

/// Errors that escape a voting cycle. Each one counts towards the
/// consecutive-failure threshold.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A pause / cancel request to the monitored process failed.
    #[error("Process control failed [{operation}]: {source}")]
    ProcessControl {
        operation: &'static str,
        source: CollaboratorError,
    },

    /// Settings could not be turned into a usable session.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl MonitorError {
    pub fn process_control(operation: &'static str, source: CollaboratorError) -> Self {
        Self::ProcessControl { operation, source }
    }
}

/// Result type for engine operations.
pub type MonitorResult<T> = Result<T, MonitorError>;
