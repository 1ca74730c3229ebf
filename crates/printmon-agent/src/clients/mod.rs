//! HTTP implementations of the engine's collaborator traits.
//!
//! Provider values (endpoint, key, model, snapshot URL) are read from a
//! shared [`ProviderSettings`] on every request, so applying new settings
//! takes effect on the next round without rebuilding the clients.

pub mod classifier;
pub mod octoprint;
pub mod snapshot;

use std::sync::Arc;

use printmon_core::CollaboratorError;
use tokio::sync::RwLock;

use crate::config::Settings;

pub use classifier::{ChatCompletionsClassifier, ProbeBody, ProbeReply};
pub use octoprint::OctoPrintClient;
pub use snapshot::HttpSnapshotSource;

/// The slice of [`Settings`] the HTTP clients need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_endpoint: String,
    pub api_key: String,
    pub model: String,
    pub snapshot_url: String,
}

impl ProviderSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            api_endpoint: settings.api_endpoint.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            snapshot_url: settings.snapshot_url.clone(),
        }
    }

    pub fn shared(self) -> SharedProvider {
        Arc::new(RwLock::new(self))
    }
}

pub type SharedProvider = Arc<RwLock<ProviderSettings>>;

fn transport_error(target: &str, err: reqwest::Error) -> CollaboratorError {
    let message = if err.is_timeout() {
        format!("timed out: {err}")
    } else {
        err.to_string()
    };
    CollaboratorError::transport(target, message)
}

/// Turn a non-2xx response into [`CollaboratorError::Status`].
async fn ensure_success(
    target: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CollaboratorError::Status {
        target: target.to_string(),
        status: status.as_u16(),
        body,
    })
}
