//! Print monitor agent.
//!
//! Wires the `printmon-core` engine to the outside world: HTTP clients for
//! the camera, the vision model and OctoPrint, a TOML-backed settings
//! store, the settings UI command surface and its `axum` routes.

pub mod api;
pub mod clients;
pub mod commands;
pub mod config;
pub mod presets;

pub use commands::CommandHandler;
pub use config::{ConfigError, HostConfig, Settings, SettingsStore};
