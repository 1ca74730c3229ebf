//! Side effects of an escalation action.
//!
//! | Action              | Notification   | Process control               |
//! |---------------------|----------------|-------------------------------|
//! | `warn`              | warning        | none                          |
//! | `pause`             | critical       | pause                         |
//! | `cancel`            | critical       | cancel                        |
//! | `cancel_stop_queue` | critical       | stop queue (best-effort), cancel |
//! | `none` with fails   | check passed   | none                          |
//!
//! Process-control failures propagate; queue failures are only logged.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::collaborators::{PrinterControl, QueueManager};
use crate::error::{MonitorError, MonitorResult};
use crate::events::{ActionEvent, MonitorEvent, SharedEventBus};
use crate::rules::EscalationAction;

/// Suppresses repeated warnings inside a window.
#[derive(Debug)]
struct WarnCooldown {
    window: Duration,
    last_fired: Option<Instant>,
}

impl WarnCooldown {
    /// Returns `false` when the previous warning is still inside the window.
    fn try_fire(&mut self) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_fired {
            if now.duration_since(last) < self.window {
                return false;
            }
        }
        self.last_fired = Some(now);
        true
    }
}

pub struct ActionDispatcher {
    events: SharedEventBus,
    printer: Arc<dyn PrinterControl>,
    queue: Option<Arc<dyn QueueManager>>,
    warn_cooldown: Mutex<WarnCooldown>,
}

impl ActionDispatcher {
    pub fn new(events: SharedEventBus, printer: Arc<dyn PrinterControl>) -> Self {
        Self {
            events,
            printer,
            queue: None,
            warn_cooldown: Mutex::new(WarnCooldown {
                window: Duration::ZERO,
                last_fired: None,
            }),
        }
    }

    pub fn with_queue_manager(mut self, queue: Arc<dyn QueueManager>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Minimum spacing between two `warn` notifications. Zero disables it.
    pub async fn set_warn_cooldown(&self, window: Duration) {
        self.warn_cooldown.lock().await.window = window;
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    pub async fn dispatch(&self, event: &ActionEvent) -> MonitorResult<()> {
        info!(action = %event.action, votes = %event.votes, "Executing action");

        match event.action {
            EscalationAction::Warn => {
                if !self.warn_cooldown.lock().await.try_fire() {
                    info!(votes = %event.votes, "Warning suppressed by cooldown");
                    return Ok(());
                }
                self.events.publish(MonitorEvent::Warning(event.clone()));
                self.alert(event);
            }
            EscalationAction::Pause => {
                self.events.publish(MonitorEvent::Critical(event.clone()));
                self.alert(event);
                info!("Pausing print");
                self.printer
                    .pause_print()
                    .await
                    .map_err(|e| MonitorError::process_control("pause", e))?;
            }
            EscalationAction::Cancel | EscalationAction::CancelStopQueue => {
                self.events.publish(MonitorEvent::Critical(event.clone()));
                self.alert(event);
                if event.action == EscalationAction::CancelStopQueue {
                    self.stop_queue().await;
                }
                info!("Cancelling print");
                self.printer
                    .cancel_print()
                    .await
                    .map_err(|e| MonitorError::process_control("cancel", e))?;
            }
            EscalationAction::None => {
                if event.votes.contains_fail() {
                    self.events.publish(MonitorEvent::CheckPassed(event.clone()));
                }
            }
        }
        Ok(())
    }

    fn alert(&self, event: &ActionEvent) {
        warn!(
            action = %event.action,
            votes = %event.votes,
            reason = %event.reason,
            "Print failure suspected"
        );
    }

    async fn stop_queue(&self) {
        let Some(queue) = &self.queue else {
            debug!("No queue manager configured; skipping queue stop");
            return;
        };
        match queue.deactivate().await {
            Ok(()) => info!("Print queue stopped"),
            Err(e) => error!(error = %e, "Failed to stop print queue; cancelling anyway"),
        }
    }
}
