//! Boundaries to the outside world.
//!
//! The engine only ever talks to these traits; HTTP implementations live in
//! the agent crate and tests use in-process fakes.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CollaboratorError;

/// Source of camera frames. Best-effort: a failure becomes an
/// inconclusive vote.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn capture(&self) -> Result<Vec<u8>, CollaboratorError>;
}

/// External oracle judging a frame. The reply is opaque JSON and goes
/// through [`crate::verdict::parse_reply`].
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &[u8], system_prompt: &str)
        -> Result<Value, CollaboratorError>;
}

/// Control surface of the monitored print job.
#[async_trait]
pub trait PrinterControl: Send + Sync {
    async fn pause_print(&self) -> Result<(), CollaboratorError>;
    async fn cancel_print(&self) -> Result<(), CollaboratorError>;
}

/// External print queue that keeps starting new jobs unless told to stop.
#[async_trait]
pub trait QueueManager: Send + Sync {
    async fn deactivate(&self) -> Result<(), CollaboratorError>;
}
