//! Command surface used by the settings UI.
//!
//! Every command answers with a JSON object. Expected failures (bad input,
//! unreachable endpoint) come back as `{"success": false, "message": ..}`;
//! anything unexpected is logged and reported as `"internal error"`.

use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use printmon_core::{
    parse_reply, ActionDispatcher, CycleOutcome, EventBus, Monitor, MonitorResult, MonitorStatus,
    PrintEvent, VotingSequence,
};
use regex::Regex;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::clients::{
    ChatCompletionsClassifier, HttpSnapshotSource, OctoPrintClient, ProbeBody, ProviderSettings,
    SharedProvider,
};
use crate::config::{HostConfig, Settings, SettingsStore};
use crate::presets::preset;

static ENDPOINT_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://").expect("ENDPOINT_URL_RE regex should compile"));

fn reply(success: bool, message: impl Into<String>) -> Value {
    json!({ "success": success, "message": message.into() })
}

fn str_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

pub struct CommandHandler {
    monitor: Monitor,
    store: Mutex<SettingsStore>,
    provider: SharedProvider,
    classifier: Arc<ChatCompletionsClassifier>,
}

impl CommandHandler {
    pub fn new(
        monitor: Monitor,
        store: SettingsStore,
        provider: SharedProvider,
        classifier: Arc<ChatCompletionsClassifier>,
    ) -> Self {
        Self {
            monitor,
            store: Mutex::new(store),
            provider,
            classifier,
        }
    }

    /// Wire the HTTP collaborators, the engine and the store together.
    /// Nothing runs until [`Self::apply_saved_settings`].
    pub fn assemble(store: SettingsStore, host: HostConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        let provider = ProviderSettings::from_settings(store.settings()).shared();
        let classifier = Arc::new(ChatCompletionsClassifier::new(http.clone(), provider.clone()));
        let snapshots = Arc::new(HttpSnapshotSource::new(http.clone(), provider.clone()));
        let octoprint = Arc::new(OctoPrintClient::new(http, host));

        let events = EventBus::new().shared();
        let dispatcher =
            ActionDispatcher::new(events.clone(), octoprint.clone()).with_queue_manager(octoprint);
        let sequence = VotingSequence::new(snapshots, classifier.clone(), dispatcher);
        let monitor = Monitor::new(store.settings().to_session_config(), sequence, events);

        Ok(Self::new(monitor, store, provider, classifier))
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub async fn settings(&self) -> Settings {
        self.store.lock().await.settings().clone()
    }

    /// Push the stored settings into the monitor and the clients, starting
    /// monitoring when enabled.
    pub async fn apply_saved_settings(&self) {
        let settings = self.settings().await;
        self.apply_to_runtime(&settings).await;
    }

    async fn apply_to_runtime(&self, settings: &Settings) {
        *self.provider.write().await = ProviderSettings::from_settings(settings);
        self.monitor
            .reconfigure(settings.to_session_config())
            .await;
    }

    pub async fn handle(&self, command: &str, data: &Value) -> Value {
        info!(command, "API command received");
        let result = match command {
            "test_connection" => Ok(self.test_connection(data).await),
            "get_preset" => Ok(self.get_preset(data)),
            "apply_settings" => self.apply_settings(data).await,
            _ => return json!({ "unknown": true }),
        };
        result.unwrap_or_else(|e| {
            error!(command, error = %format!("{e:#}"), "Error in API command");
            reply(false, "internal error")
        })
    }

    /// Send a text-only request to an endpoint and describe the answer.
    /// Missing key or model fall back to the saved settings.
    pub async fn test_connection(&self, data: &Value) -> Value {
        let Some(endpoint) = str_field(data, "endpoint").filter(|e| ENDPOINT_URL_RE.is_match(e))
        else {
            return reply(false, "Invalid endpoint URL");
        };

        let saved = self.settings().await;
        let api_key = str_field(data, "api_key").unwrap_or(saved.api_key.as_str());
        let model = str_field(data, "model").unwrap_or(saved.model.as_str());

        match self
            .classifier
            .probe(endpoint, api_key, model, &saved.system_prompt)
            .await
        {
            Ok(probe) => {
                let latency = probe.latency.as_secs_f64();
                let message = match probe.body {
                    ProbeBody::Json(body) => match parse_reply(&body) {
                        Some(v) if v.status() == Some("ok") => format!("ok (latency {latency:.2}s)"),
                        Some(v) => format!("connected, LLM responded: {v} (latency {latency:.2}s)"),
                        None => format!("connected, LLM responded: none (latency {latency:.2}s)"),
                    },
                    ProbeBody::Text(_) => {
                        format!("connected (non-JSON response) latency {latency:.2}s")
                    }
                };
                info!(endpoint, %message, "Test connection OK");
                reply(true, message)
            }
            Err(e) => {
                warn!(endpoint, error = %e, "Test connection failed");
                reply(false, e.to_string())
            }
        }
    }

    pub fn get_preset(&self, data: &Value) -> Value {
        let Some(name) = str_field(data, "preset") else {
            return reply(false, "missing preset");
        };
        match preset(name) {
            Some(p) => {
                info!(preset = name, "Providing preset");
                json!({ "success": true, "preset": p })
            }
            None => reply(false, "unknown preset"),
        }
    }

    /// Validate, apply to the live monitor and clients, then persist.
    pub async fn apply_settings(&self, data: &Value) -> Result<Value> {
        let updates: &Map<String, Value> = match data.get("settings").and_then(Value::as_object) {
            Some(map) if !map.is_empty() => map,
            _ => return Ok(reply(false, "missing settings")),
        };

        let mut store = self.store.lock().await;
        let candidate = match store.settings().merged(updates) {
            Ok(settings) => settings,
            Err(e) => return Ok(reply(false, e.to_string())),
        };
        if let Err(e) = candidate.validate() {
            return Ok(reply(false, e.to_string()));
        }

        self.apply_to_runtime(&candidate).await;
        for (key, value) in updates {
            store
                .set(key, value.clone())
                .with_context(|| format!("Failed to store setting '{key}'"))?;
        }
        store.save().context("Failed to save settings")?;

        info!(keys = updates.len(), "Settings applied");
        Ok(reply(true, "settings applied and saved"))
    }

    pub async fn on_print_event(&self, event: PrintEvent) {
        self.monitor.on_print_event(event).await;
    }

    pub async fn status(&self) -> MonitorStatus {
        self.monitor.status().await
    }

    pub async fn check_now(&self) -> MonitorResult<CycleOutcome> {
        self.monitor.run_cycle_now().await
    }
}
