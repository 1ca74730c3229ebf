//! Monitor: run/stop state machine and the recurring tick timer.
//!
//! ```text
//!              start / resume
//!   ┌─────────┐ ───────────────▶ ┌─────────┐
//!   │ Stopped │                  │ Running │──┐ sleep(interval) → tick
//!   └─────────┘ ◀─────────────── └─────────┘◀─┘ (re-armed after each tick)
//!              stop / pause / breaker open
//! ```
//!
//! While running, one timer task sleeps for the session interval, runs one
//! voting cycle through the circuit breaker, then sleeps again. Ticks never
//! overlap: the next sleep starts only after the previous tick returned,
//! and a cycle gate keeps a restarted monitor from racing a tick that is
//! still finishing. Cadence therefore drifts by the tick's own duration.
//!
//! `stop()` cancels the timer's token: a pending sleep is abandoned and a
//! running cycle ends at its next round boundary or round delay.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::circuit_breaker::CircuitState;
use crate::error::{MonitorError, MonitorResult};
use crate::events::{MonitorEvent, SharedEventBus};
use crate::session::{MonitoringSession, SessionConfig};
use crate::voting::{CycleOutcome, VotingSequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Lifecycle notifications from the print host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrintEvent {
    PrintStarted,
    PrintDone,
    PrintFailed,
    PrintCancelled,
    PrintPaused,
    PrintResumed,
}

impl FromStr for PrintEvent {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PrintStarted" => Ok(Self::PrintStarted),
            "PrintDone" => Ok(Self::PrintDone),
            "PrintFailed" => Ok(Self::PrintFailed),
            "PrintCancelled" => Ok(Self::PrintCancelled),
            "PrintPaused" => Ok(Self::PrintPaused),
            "PrintResumed" => Ok(Self::PrintResumed),
            other => Err(MonitorError::Configuration(format!(
                "unknown print event '{other}'"
            ))),
        }
    }
}

impl fmt::Display for PrintEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Point-in-time view of the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub enabled: bool,
    pub consecutive_errors: u32,
    pub interval_seconds: u64,
    pub rounds: u32,
}

struct TimerHandle {
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

struct Core {
    session: MonitoringSession,
    /// Bumped whenever the session is replaced.
    generation: u64,
    timer: Option<TimerHandle>,
}

impl Core {
    /// Mark stopped and cancel the armed timer, if any.
    fn halt(&mut self) -> bool {
        let was_running = self.session.is_running();
        self.session.set_running(false);
        if let Some(timer) = self.timer.take() {
            timer.cancel.cancel();
        }
        was_running
    }
}

struct Shared {
    core: Mutex<Core>,
    cycle_gate: Mutex<()>,
    sequence: VotingSequence,
    events: SharedEventBus,
}

/// Owns the monitoring session and drives voting cycles on a timer.
#[derive(Clone)]
pub struct Monitor {
    shared: Arc<Shared>,
}

impl Monitor {
    pub fn new(config: SessionConfig, sequence: VotingSequence, events: SharedEventBus) -> Self {
        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(Core {
                    session: MonitoringSession::new(config),
                    generation: 0,
                    timer: None,
                }),
                cycle_gate: Mutex::new(()),
                sequence,
                events,
            }),
        }
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.shared.events
    }

    /// Stopped → Running. No-op when already running.
    pub async fn start(&self) {
        let mut core = self.shared.core.lock().await;
        if core.session.is_running() {
            debug!("Monitoring already running");
            return;
        }
        core.session.set_running(true);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_timer(self.shared.clone(), cancel.clone()));
        core.timer = Some(TimerHandle {
            cancel,
            _task: task,
        });
        info!(
            interval_secs = core.session.interval().as_secs(),
            rounds = core.session.rounds(),
            "Monitoring started"
        );
    }

    /// Running → Stopped. No-op when already stopped.
    pub async fn stop(&self) {
        if self.shared.core.lock().await.halt() {
            info!("Monitoring stopped");
        }
    }

    /// Paused is the same state as stopped; there is no mid-cycle resume.
    pub async fn pause(&self) {
        self.stop().await;
    }

    pub async fn resume(&self) {
        self.start().await;
    }

    pub async fn state(&self) -> SchedulerState {
        if self.is_running().await {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    pub async fn is_running(&self) -> bool {
        self.shared.core.lock().await.session.is_running()
    }

    pub async fn consecutive_errors(&self) -> u32 {
        self.shared.core.lock().await.session.consecutive_errors()
    }

    pub async fn status(&self) -> MonitorStatus {
        let core = self.shared.core.lock().await;
        MonitorStatus {
            running: core.session.is_running(),
            enabled: core.session.config().enabled,
            consecutive_errors: core.session.consecutive_errors(),
            interval_seconds: core.session.interval().as_secs(),
            rounds: core.session.rounds(),
        }
    }

    /// Replace the session with one built from `config`.
    ///
    /// The error counter starts over, and a cycle already in flight does not
    /// count against the new session. A running timer keeps going and picks
    /// up the new interval when it is next armed; monitoring is then started
    /// or stopped to match `config.enabled`.
    pub async fn reconfigure(&self, config: SessionConfig) {
        let enabled = config.enabled;
        self.shared
            .sequence
            .dispatcher()
            .set_warn_cooldown(config.cooldown)
            .await;

        let was_running = {
            let mut core = self.shared.core.lock().await;
            let was_running = core.session.is_running();
            core.session = MonitoringSession::new(config);
            core.session.set_running(was_running);
            core.generation += 1;
            was_running
        };

        if enabled && !was_running {
            info!("Settings applied: starting monitoring");
            self.start().await;
        } else if !enabled && was_running {
            info!("Settings applied: stopping monitoring");
            self.stop().await;
        }
    }

    /// React to a print lifecycle event.
    pub async fn on_print_event(&self, event: PrintEvent) {
        debug!(%event, "Print event received");
        match event {
            PrintEvent::PrintStarted | PrintEvent::PrintResumed => {
                let enabled = self.shared.core.lock().await.session.config().enabled;
                if !enabled {
                    info!(%event, "Monitoring disabled in settings; not starting");
                    return;
                }
                if event == PrintEvent::PrintStarted {
                    self.start().await;
                } else {
                    self.resume().await;
                }
            }
            PrintEvent::PrintPaused => self.pause().await,
            PrintEvent::PrintDone | PrintEvent::PrintFailed | PrintEvent::PrintCancelled => {
                self.stop().await
            }
        }
    }

    /// Run one voting cycle immediately, outside the timer and the breaker.
    pub async fn run_cycle_now(&self) -> MonitorResult<CycleOutcome> {
        let _gate = self.shared.cycle_gate.lock().await;
        let plan = self.shared.core.lock().await.session.cycle_plan();
        let span = info_span!("cycle", cycle_id = %Uuid::new_v4(), manual = true);
        self.shared
            .sequence
            .run(&plan, &CancellationToken::new())
            .instrument(span)
            .await
    }
}

async fn run_timer(shared: Arc<Shared>, cancel: CancellationToken) {
    loop {
        let interval = shared.core.lock().await.session.interval();
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        shared.tick(&cancel).await;
        if cancel.is_cancelled() {
            break;
        }
    }
    debug!("Timer loop exited");
}

impl Shared {
    /// One tick: a voting cycle wrapped by the circuit breaker.
    async fn tick(&self, cancel: &CancellationToken) {
        let _gate = self.cycle_gate.lock().await;
        if cancel.is_cancelled() {
            return;
        }

        let (plan, generation) = {
            let core = self.core.lock().await;
            (core.session.cycle_plan(), core.generation)
        };
        let span = info_span!("cycle", cycle_id = %Uuid::new_v4());
        let result = self.sequence.run(&plan, cancel).instrument(span).await;

        let mut core = self.core.lock().await;
        if core.generation != generation {
            debug!("Session replaced during cycle; breaker untouched");
            return;
        }
        match result {
            Ok(CycleOutcome::Cancelled { votes }) => {
                debug!(votes = %votes, "Cycle cancelled; breaker untouched");
            }
            Ok(outcome) => {
                core.session.breaker_mut().record_success();
                info!(
                    action = %outcome.action(),
                    votes = %outcome.votes(),
                    "Voting cycle finished"
                );
            }
            Err(err) => {
                let state = core.session.breaker_mut().record_failure();
                let failures = core.session.consecutive_errors();
                error!(consecutive = failures, error = %err, "Error during voting sequence");

                if state == CircuitState::Open {
                    let threshold = core.session.breaker().failure_threshold;
                    error!("Too many consecutive errors. Disabling monitoring.");
                    core.halt();
                    drop(core);
                    self.events.publish(MonitorEvent::error(format!(
                        "Monitoring disabled after {threshold} consecutive errors"
                    )));
                }
            }
        }
    }
}
