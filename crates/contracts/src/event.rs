//! Event model - what adapters hand to the coordinator
//!
//! Every adapter, whatever its transport, reduces its input to `SourceMessage`s.
//! The coordinator is the single consumer.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::SourceTag;

/// One timestamped line of output from a device or log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootEvent {
    /// Receipt time (seconds, f64)
    pub timestamp: f64,

    /// Raw line, control characters already stripped
    pub payload: Bytes,

    /// Channel the line arrived on
    pub source: SourceTag,
}

impl BootEvent {
    pub fn new(timestamp: f64, payload: impl Into<Bytes>, source: impl Into<SourceTag>) -> Self {
        Self {
            timestamp,
            payload: payload.into(),
            source: source.into(),
        }
    }

    /// Payload as lossy UTF-8, for display only
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Observed supply state of the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    /// Parse a digital level as produced by a logic analyzer (`1` / `0`)
    pub fn from_level(level: &str) -> Option<Self> {
        match level.trim() {
            "1" => Some(Self::On),
            "0" => Some(Self::Off),
            _ => None,
        }
    }
}

/// Message sent from an adapter (or task) to the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum SourceMessage {
    /// A line of output
    Event(BootEvent),

    /// A digital power-state transition
    Power { timestamp: f64, state: PowerState },

    /// Every mandatory adapter reported ready; the first power-on may start
    Ready,
}
