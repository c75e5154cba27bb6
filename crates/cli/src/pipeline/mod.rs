//! Measurement orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{metrics_port, Measurement, MeasurementConfig};
pub use stats::RunReport;
