//! OctoPrint REST client: job control and the Continuous Print queue.

use std::time::Duration;

use async_trait::async_trait;
use printmon_core::{CollaboratorError, PrinterControl, QueueManager};
use serde_json::{json, Value};
use tracing::info;

use super::{ensure_success, transport_error};
use crate::config::HostConfig;

const JOB_TIMEOUT: Duration = Duration::from_secs(10);
const QUEUE_TIMEOUT: Duration = Duration::from_secs(5);

const JOB_PATH: &str = "/api/job";
const QUEUE_PATH: &str = "/plugin/continuousprint/set_active";

pub struct OctoPrintClient {
    http: reqwest::Client,
    host: HostConfig,
}

impl OctoPrintClient {
    pub fn new(http: reqwest::Client, host: HostConfig) -> Self {
        Self { http, host }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host.octoprint_url.trim_end_matches('/'), path)
    }

    async fn post(
        &self,
        target: &str,
        path: &str,
        body: Value,
        timeout: Duration,
    ) -> Result<(), CollaboratorError> {
        let mut builder = self.http.post(self.url(path)).json(&body).timeout(timeout);
        if let Some(key) = self.host.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.header("X-Api-Key", key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(target, e))?;
        ensure_success(target, response).await?;
        Ok(())
    }
}

#[async_trait]
impl PrinterControl for OctoPrintClient {
    async fn pause_print(&self) -> Result<(), CollaboratorError> {
        self.post(
            "printer",
            JOB_PATH,
            json!({ "command": "pause", "action": "pause" }),
            JOB_TIMEOUT,
        )
        .await
    }

    async fn cancel_print(&self) -> Result<(), CollaboratorError> {
        self.post("printer", JOB_PATH, json!({ "command": "cancel" }), JOB_TIMEOUT)
            .await
    }
}

#[async_trait]
impl QueueManager for OctoPrintClient {
    async fn deactivate(&self) -> Result<(), CollaboratorError> {
        info!("Attempting to stop Continuous Print queue");
        self.post("queue", QUEUE_PATH, json!({ "active": false }), QUEUE_TIMEOUT)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = OctoPrintClient::new(
            reqwest::Client::new(),
            HostConfig {
                octoprint_url: "http://octopi.local/".into(),
                api_key: None,
            },
        );
        assert_eq!(client.url(JOB_PATH), "http://octopi.local/api/job");
    }
}
