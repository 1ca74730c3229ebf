//! Notifications emitted by the monitor.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Dispatcher  │────▶│  Event Bus   │────▶│  Subscribers │
//! │  / breaker   │     │  (broadcast) │     │  (UI, logs)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

pub mod bus;
pub mod types;

pub use bus::{EventBus, SharedEventBus};
pub use types::{ActionEvent, MonitorEvent, UNKNOWN_REASON};
