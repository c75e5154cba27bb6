//! # Ingestion Pipeline
//!
//! Event source ingestion module.
//!
//! Responsibilities:
//! - Run every event source on its own thread (serial device, external commands, scripts)
//! - Split raw output into timestamped lines
//! - Hand messages to the coordinator through one ordered queue
//! - Gate the first power-on on the readiness of mandatory sources
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{DeviceLineSource, IngestionPipeline, QueueConfig};
//!
//! let mut pipeline = IngestionPipeline::new(QueueConfig::new(0), stop.clone(), clock);
//! pipeline.register_source(Box::new(DeviceLineSource::new(&serial_config)))?;
//!
//! let rx = pipeline.take_receiver().unwrap();
//! pipeline.start_all()?;
//! while let Ok(msg) = rx.recv().await {
//!     // Hand to the correlator
//! }
//! ```

mod config;
mod error;
mod pipeline;
mod readiness;
mod source;
mod sources;
mod splitter;

// Re-exports
pub use config::{IngestionMetrics, MetricsSnapshot, QueueConfig};
pub use error::{IngestionError, Result};
pub use pipeline::IngestionPipeline;
pub use readiness::ReadinessMask;
pub use source::{EventSource, SourceLink, WorkerThread};
pub use sources::{
    CommandMode, CommandSource, DeviceLineSource, ScriptStep, ScriptedSource, STDIN_DEVICE,
};
pub use splitter::{clean_line, LineSplitter};
