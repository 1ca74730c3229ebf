//! Events published by the monitor.
//!
//! Each event knows the wire name UI consumers subscribe to and the JSON
//! payload that goes with it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::rules::EscalationAction;
use crate::verdict::Verdict;
use crate::voting::VotingRound;

/// Reason reported when the triggering verdict carried none.
pub const UNKNOWN_REASON: &str = "Unknown";

/// Payload of an escalation notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub action: EscalationAction,
    pub votes: VotingRound,
    pub reason: String,
    /// Seconds since the Unix epoch.
    #[serde(rename = "timestamp")]
    pub timestamp_secs: f64,
}

impl ActionEvent {
    pub fn new(action: EscalationAction, votes: VotingRound, verdict: Option<&Verdict>) -> Self {
        let reason = verdict
            .and_then(Verdict::reason)
            .unwrap_or(UNKNOWN_REASON)
            .to_string();
        Self {
            action,
            votes,
            reason,
            timestamp_secs: Utc::now().timestamp_millis() as f64 / 1000.0,
        }
    }
}

/// Everything the monitor announces on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// Out-of-band failure of the monitor itself.
    Error { message: String },
    Warning(ActionEvent),
    Critical(ActionEvent),
    /// A cycle saw failing votes but not enough to escalate.
    CheckPassed(ActionEvent),
}

impl MonitorEvent {
    pub const ERROR: &'static str = "plugin_ai_printmon_error";
    pub const WARNING: &'static str = "plugin_ai_printmon_warning";
    pub const CRITICAL: &'static str = "plugin_ai_printmon_critical";
    pub const CHECK_PASSED: &'static str = "plugin_ai_printmon_check_passed";

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Name consumers subscribe to.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Error { .. } => Self::ERROR,
            Self::Warning(_) => Self::WARNING,
            Self::Critical(_) => Self::CRITICAL,
            Self::CheckPassed(_) => Self::CHECK_PASSED,
        }
    }

    /// JSON payload as delivered to consumers.
    pub fn payload(&self) -> Value {
        match self {
            Self::Error { message } => json!({ "message": message }),
            Self::Warning(e) | Self::Critical(e) | Self::CheckPassed(e) => {
                serde_json::to_value(e).unwrap_or_default()
            }
        }
    }

    pub fn action_event(&self) -> Option<&ActionEvent> {
        match self {
            Self::Error { .. } => None,
            Self::Warning(e) | Self::Critical(e) | Self::CheckPassed(e) => Some(e),
        }
    }
}
