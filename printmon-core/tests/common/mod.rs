//! In-process collaborators for engine tests. No camera, model or printer
//! required.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use printmon_core::{
    ActionDispatcher, Classifier, CollaboratorError, CyclePlan, PrinterControl, QueueManager,
    RulePolicy, SharedEventBus, SnapshotSource, VotingSequence, DEFAULT_SYSTEM_PROMPT,
};
use serde_json::{json, Value};

pub fn ok_reply() -> Value {
    json!({ "choices": [ { "message": { "content": "{\"status\": \"ok\"}" } } ] })
}

pub fn fail_reply(reason: &str) -> Value {
    let content = json!({ "status": "fail", "reason": reason }).to_string();
    json!({ "choices": [ { "message": { "content": content } } ] })
}

pub fn noise_reply() -> Value {
    json!({ "choices": [ { "message": { "content": "I cannot tell from this angle." } } ] })
}

pub struct FakeSnapshot {
    pub fail: bool,
    pub calls: AtomicU32,
}

impl FakeSnapshot {
    pub fn working() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicU32::new(0),
        })
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl SnapshotSource for FakeSnapshot {
    async fn capture(&self) -> Result<Vec<u8>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CollaboratorError::transport("snapshot", "connection refused"));
        }
        Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }
}

/// Answers from a script, then repeats `fallback` forever.
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<Result<Value, CollaboratorError>>>,
    fallback: Value,
    pub calls: AtomicU32,
}

impl ScriptedClassifier {
    pub fn new(script: Vec<Value>, fallback: Value) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().map(Ok).collect()),
            fallback,
            calls: AtomicU32::new(0),
        })
    }

    pub fn always(reply: Value) -> Arc<Self> {
        Self::new(Vec::new(), reply)
    }

    pub fn with_results(script: Vec<Result<Value, CollaboratorError>>, fallback: Value) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            calls: AtomicU32::new(0),
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(
        &self,
        _image: &[u8],
        _system_prompt: &str,
    ) -> Result<Value, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Printer whose requests succeed or fail per a script (`true` = success).
pub struct FakePrinter {
    script: Mutex<VecDeque<bool>>,
    default_ok: bool,
    pub pauses: AtomicU32,
    pub cancels: AtomicU32,
}

impl FakePrinter {
    pub fn healthy() -> Arc<Self> {
        Self::scripted(Vec::new(), true)
    }

    pub fn offline() -> Arc<Self> {
        Self::scripted(Vec::new(), false)
    }

    pub fn scripted(script: Vec<bool>, default_ok: bool) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            default_ok,
            pauses: AtomicU32::new(0),
            cancels: AtomicU32::new(0),
        })
    }

    fn outcome(&self, operation: &str) -> Result<(), CollaboratorError> {
        let ok = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default_ok);
        if ok {
            Ok(())
        } else {
            Err(CollaboratorError::transport("printer", format!("{operation} refused")))
        }
    }

    pub fn cancel_count(&self) -> u32 {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn pause_count(&self) -> u32 {
        self.pauses.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PrinterControl for FakePrinter {
    async fn pause_print(&self) -> Result<(), CollaboratorError> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        self.outcome("pause")
    }

    async fn cancel_print(&self) -> Result<(), CollaboratorError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.outcome("cancel")
    }
}

#[derive(Default)]
pub struct FakeQueue {
    pub deactivations: AtomicU32,
}

#[async_trait]
impl QueueManager for FakeQueue {
    async fn deactivate(&self) -> Result<(), CollaboratorError> {
        self.deactivations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Route engine logs through the test harness; `RUST_LOG` narrows them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_test_writer()
        .try_init();
}

pub fn sequence(
    snapshots: Arc<FakeSnapshot>,
    classifier: Arc<ScriptedClassifier>,
    printer: Arc<FakePrinter>,
    queue: Arc<FakeQueue>,
    bus: SharedEventBus,
) -> VotingSequence {
    init_tracing();
    let dispatcher = ActionDispatcher::new(bus, printer).with_queue_manager(queue);
    VotingSequence::new(snapshots, classifier, dispatcher)
}

pub fn plan(rounds: u32) -> CyclePlan {
    CyclePlan {
        rounds,
        round_delay: Duration::ZERO,
        policy: RulePolicy::default(),
        system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
    }
}
