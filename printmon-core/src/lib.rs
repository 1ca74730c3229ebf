//! Print failure detection and escalation engine.
//!
//! Periodically samples a camera frame, asks an external classifier whether
//! the print looks failed, aggregates several rounds into a vote and
//! escalates through increasingly severe actions.
//!
//! ```text
//! Monitor timer ──▶ circuit breaker ──▶ VotingSequence
//!                                         │  per round:
//!                                         │   SnapshotSource::capture
//!                                         │   Classifier::classify
//!                                         │   verdict::parse_reply → Vote
//!                                         │   RulePolicy::evaluate
//!                                         ▼
//!                                   ActionDispatcher ──▶ EventBus
//!                                                   └──▶ PrinterControl / QueueManager
//! ```
//!
//! The HTTP implementations of the collaborator traits, the settings store
//! and the command surface live in the `printmon-agent` crate.

pub mod circuit_breaker;
pub mod collaborators;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod rules;
pub mod scheduler;
pub mod session;
pub mod verdict;
pub mod voting;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use collaborators::{Classifier, PrinterControl, QueueManager, SnapshotSource};
pub use dispatch::ActionDispatcher;
pub use error::{CollaboratorError, MonitorError, MonitorResult};
pub use events::{ActionEvent, EventBus, MonitorEvent, SharedEventBus};
pub use rules::{evaluate, EscalationAction, FailureRule, RulePolicy, Threshold};
pub use scheduler::{Monitor, MonitorStatus, PrintEvent, SchedulerState};
pub use session::{MonitoringSession, SessionConfig, DEFAULT_SYSTEM_PROMPT};
pub use verdict::{parse_reply, Verdict};
pub use voting::{CycleOutcome, CyclePlan, Vote, VotingRound, VotingSequence};
