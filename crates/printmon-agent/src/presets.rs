//! Provider presets offered by the settings UI.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderPreset {
    pub endpoint: &'static str,
    pub api_key: &'static str,
    pub model: &'static str,
}

pub const PRESET_NAMES: [&str; 3] = ["Ollama", "OpenAI", "Google Gemini"];

/// Look up a preset by its display name.
pub fn preset(name: &str) -> Option<ProviderPreset> {
    let (endpoint, model) = match name {
        "Ollama" => ("http://localhost:11434/v1/chat/completions", "llava:latest"),
        "OpenAI" => ("https://api.openai.com/v1/chat/completions", "gpt-4o"),
        "Google Gemini" => (
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
            "gemini-2.0",
        ),
        _ => return None,
    };
    Some(ProviderPreset {
        endpoint,
        api_key: "",
        model,
    })
}
