//! Settings: the flat key/value store behind the settings UI.
//!
//! Values live in a TOML file. Keys are the field names of [`Settings`];
//! anything else is rejected on write. A handful of provider values can be
//! overridden from the environment:
//!
//! | Variable                | Key            |
//! |-------------------------|----------------|
//! | `PRINTMON_API_KEY`      | `api_key`      |
//! | `PRINTMON_API_ENDPOINT` | `api_endpoint` |
//! | `PRINTMON_MODEL`        | `model`        |
//! | `PRINTMON_SNAPSHOT_URL` | `snapshot_url` |

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use printmon_core::{
    EscalationAction, FailureRule, RulePolicy, SessionConfig, DEFAULT_SYSTEM_PROMPT,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown setting '{0}'")]
    UnknownKey(String),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Upper bound for `cooldown_minutes`: one day.
pub const MAX_COOLDOWN_MINUTES: u64 = 24 * 60;

/// Every recognized setting with its stock default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider_preset: String,
    pub api_endpoint: String,
    pub api_key: String,
    pub model: String,
    pub monitor_enabled: bool,
    pub snapshot_url: String,
    #[serde(deserialize_with = "lenient")]
    pub interval_minutes: u64,
    #[serde(deserialize_with = "lenient")]
    pub rounds: u32,
    /// Seconds between rounds.
    #[serde(deserialize_with = "lenient")]
    pub round_delay: u64,
    #[serde(deserialize_with = "lenient")]
    pub cooldown_minutes: u64,
    pub system_prompt: String,
    // Kept last: TOML writes arrays of tables after plain values.
    pub failure_rules: Vec<FailureRule>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider_preset: "OpenAI".into(),
            api_endpoint: "https://api.openai.com/v1/chat/completions".into(),
            api_key: String::new(),
            model: "gpt-4o".into(),
            monitor_enabled: true,
            snapshot_url: "http://localhost:8080/?action=snapshot".into(),
            interval_minutes: 5,
            rounds: 3,
            round_delay: 3,
            cooldown_minutes: 15,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            failure_rules: stock_rules(),
        }
    }
}

fn stock_rules() -> Vec<FailureRule> {
    [
        ("1/3", EscalationAction::None),
        ("1/2", EscalationAction::Warn),
        ("3/3", EscalationAction::CancelStopQueue),
    ]
    .into_iter()
    .filter_map(|(threshold, action)| {
        Some(FailureRule {
            threshold: threshold.parse().ok()?,
            action,
        })
    })
    .collect()
}

/// Accepts numbers and numeric strings, since form inputs post the latter.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText<T> {
        Number(T),
        Text(String),
    }

    match NumberOrText::<T>::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl Settings {
    /// Build settings from a flat key/value map; missing keys take defaults.
    pub fn from_map(map: Map<String, Value>) -> ConfigResult<Self> {
        serde_json::from_value(Value::Object(map)).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Copy of these settings with `updates` applied. Unknown keys are
    /// rejected.
    pub fn merged(&self, updates: &Map<String, Value>) -> ConfigResult<Self> {
        let mut map = self.to_map();
        for (key, value) in updates {
            if !map.contains_key(key) {
                return Err(ConfigError::UnknownKey(key.clone()));
            }
            map.insert(key.clone(), value.clone());
        }
        Self::from_map(map)
    }

    /// Server-side checks run before settings are applied.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=30).contains(&self.interval_minutes) {
            return Err(ConfigError::Invalid(format!(
                "interval_minutes must be between 1 and 30, got {}",
                self.interval_minutes
            )));
        }
        if self.rounds == 0 {
            return Err(ConfigError::Invalid("rounds must be at least 1".into()));
        }
        if self.cooldown_minutes > MAX_COOLDOWN_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "cooldown_minutes must be at most {MAX_COOLDOWN_MINUTES}, got {}",
                self.cooldown_minutes
            )));
        }
        if self.api_endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("api_endpoint must not be empty".into()));
        }
        Ok(())
    }

    pub fn policy(&self) -> RulePolicy {
        RulePolicy::new(self.failure_rules.clone())
    }

    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            enabled: self.monitor_enabled,
            interval: Duration::from_secs(self.interval_minutes.saturating_mul(60)),
            rounds: self.rounds,
            round_delay: Duration::from_secs(self.round_delay),
            cooldown: Duration::from_secs(self.cooldown_minutes.saturating_mul(60)),
            policy: self.policy(),
            system_prompt: self.system_prompt.clone(),
        }
    }

    /// Apply `PRINTMON_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let targets: [(&str, &mut String); 4] = [
            ("PRINTMON_API_KEY", &mut self.api_key),
            ("PRINTMON_API_ENDPOINT", &mut self.api_endpoint),
            ("PRINTMON_MODEL", &mut self.model),
            ("PRINTMON_SNAPSHOT_URL", &mut self.snapshot_url),
        ];
        for (var, field) in targets {
            if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
                debug!(var, "Setting overridden from environment");
                *field = value;
            }
        }
    }
}

/// Settings persisted to a TOML file.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Read `path` if it exists, otherwise start from defaults. Environment
    /// overrides are applied once, here, and the result must validate.
    pub fn load(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let mut settings = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            info!(path = %path.display(), "No settings file; using defaults");
            Settings::default()
        };
        settings.apply_env_overrides(|var| std::env::var(var).ok());
        settings.validate()?;
        Ok(Self { path, settings })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.settings.to_map().remove(key)
    }

    /// Set one key. The value must deserialize into the key's type.
    pub fn set(&mut self, key: &str, value: Value) -> ConfigResult<()> {
        let mut update = Map::new();
        update.insert(key.to_string(), value);
        self.settings = self.settings.merged(&update)?;
        Ok(())
    }

    pub fn all(&self) -> Map<String, Value> {
        self.settings.to_map()
    }

    pub fn save(&self) -> ConfigResult<()> {
        let text = toml::to_string_pretty(&self.settings)?;
        let write_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(&self.path, text).map_err(write_err)?;
        info!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

/// Where the print host lives. The same API key authorizes both job control
/// and the queue plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub octoprint_url: String,
    pub api_key: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            octoprint_url: "http://localhost:5000".into(),
            api_key: None,
        }
    }
}
