//! Rolling-window alert detection and process metrics (spec §4.J).

pub mod alerts;
pub mod cost;
pub mod error;
pub mod metrics;
pub mod window;

pub use alerts::{AlertCenter, AlertEvent, AlertKind, AlertSink, AlertThresholds, LoggingAlertSink, Severity};
pub use cost::estimate_llm_cost;
pub use error::{AlertError, Result};
pub use metrics::{Metrics, MetricsSnapshot, METRICS};
pub use window::WindowKey;
