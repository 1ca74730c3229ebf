//! Camera snapshots over HTTP (e.g. mjpg-streamer's `?action=snapshot`).

use std::time::Duration;

use async_trait::async_trait;
use printmon_core::{CollaboratorError, SnapshotSource};
use tracing::debug;

use super::{ensure_success, transport_error, SharedProvider};

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);
const TARGET: &str = "snapshot";

pub struct HttpSnapshotSource {
    http: reqwest::Client,
    provider: SharedProvider,
}

impl HttpSnapshotSource {
    pub fn new(http: reqwest::Client, provider: SharedProvider) -> Self {
        Self { http, provider }
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn capture(&self) -> Result<Vec<u8>, CollaboratorError> {
        let url = self.provider.read().await.snapshot_url.clone();
        if url.trim().is_empty() {
            return Err(CollaboratorError::NotConfigured("snapshot_url".into()));
        }

        let response = self
            .http
            .get(&url)
            .timeout(SNAPSHOT_TIMEOUT)
            .send()
            .await
            .map_err(|e| transport_error(TARGET, e))?;
        let bytes = ensure_success(TARGET, response)
            .await?
            .bytes()
            .await
            .map_err(|e| transport_error(TARGET, e))?;

        debug!(url = %url, bytes = bytes.len(), "Snapshot captured");
        Ok(bytes.to_vec())
    }
}
