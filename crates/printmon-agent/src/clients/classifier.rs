//! Vision classifier over an OpenAI-compatible chat completions endpoint.
//!
//! Works with OpenAI, Gemini's OpenAI shim and Ollama. The frame is sent
//! inline as a base64 JPEG data URL next to a short text instruction.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use printmon_core::{Classifier, CollaboratorError};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{ensure_success, transport_error, SharedProvider};

const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);
const TARGET: &str = "classifier";

const FRAME_INSTRUCTION: &str = "Here is the latest webcam frame of the print.";
const PROBE_INSTRUCTION: &str = "Test connectivity from AI Print Monitor. \
Reply with a short JSON object like {\"status\": \"ok\"}.";

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Value,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    n: u32,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, system_prompt: &str, user: Value) -> Self {
        Self {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: Value::String(system_prompt.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            n: 1,
        }
    }
}

fn frame_content(image: &[u8]) -> Value {
    let data_url = format!("data:image/jpeg;base64,{}", STANDARD.encode(image));
    json!([
        { "type": "text", "text": FRAME_INSTRUCTION },
        { "type": "image_url", "image_url": { "url": data_url } },
    ])
}

/// Body of a probe reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeBody {
    Json(Value),
    /// The endpoint answered 2xx with something that is not JSON.
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReply {
    pub latency: Duration,
    pub body: ProbeBody,
}

pub struct ChatCompletionsClassifier {
    http: reqwest::Client,
    provider: SharedProvider,
}

impl ChatCompletionsClassifier {
    pub fn new(http: reqwest::Client, provider: SharedProvider) -> Self {
        Self { http, provider }
    }

    async fn post(
        &self,
        endpoint: &str,
        api_key: &str,
        request: &ChatRequest<'_>,
        timeout: Duration,
    ) -> Result<reqwest::Response, CollaboratorError> {
        let mut builder = self.http.post(endpoint).json(request).timeout(timeout);
        if !api_key.is_empty() {
            builder = builder.bearer_auth(api_key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(TARGET, e))?;
        ensure_success(TARGET, response).await
    }

    /// Text-only round trip used to check an endpoint before saving it.
    pub async fn probe(
        &self,
        endpoint: &str,
        api_key: &str,
        model: &str,
        system_prompt: &str,
    ) -> Result<ProbeReply, CollaboratorError> {
        let request = ChatRequest::new(
            model,
            system_prompt,
            Value::String(PROBE_INSTRUCTION.to_string()),
        );

        let started = Instant::now();
        let response = self.post(endpoint, api_key, &request, PROBE_TIMEOUT).await?;
        let latency = started.elapsed();

        let text = response
            .text()
            .await
            .map_err(|e| transport_error(TARGET, e))?;
        let body = match serde_json::from_str::<Value>(&text) {
            Ok(json) => ProbeBody::Json(json),
            Err(_) => ProbeBody::Text(text),
        };
        Ok(ProbeReply { latency, body })
    }
}

#[async_trait]
impl Classifier for ChatCompletionsClassifier {
    async fn classify(
        &self,
        image: &[u8],
        system_prompt: &str,
    ) -> Result<Value, CollaboratorError> {
        let provider = self.provider.read().await.clone();
        if provider.api_endpoint.trim().is_empty() {
            return Err(CollaboratorError::NotConfigured("api_endpoint".into()));
        }

        let request = ChatRequest::new(&provider.model, system_prompt, frame_content(image));
        let response = self
            .post(&provider.api_endpoint, &provider.api_key, &request, CLASSIFY_TIMEOUT)
            .await?;
        let reply: Value = response
            .json()
            .await
            .map_err(|e| CollaboratorError::invalid_reply(TARGET, e))?;

        debug!(model = %provider.model, "Classifier replied");
        Ok(reply)
    }
}
