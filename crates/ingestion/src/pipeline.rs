//! Ingestion Pipeline main entry

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_channel::{Receiver, Sender};
use contracts::{Clock, SourceMessage, SourceTag};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{IngestionMetrics, QueueConfig};
use crate::readiness::ReadinessMask;
use crate::source::{EventSource, SourceLink};

struct Registered {
    source: Box<dyn EventSource>,
    bit: Option<u32>,
}

/// Ingestion Pipeline
///
/// Owns every registered source and the single hand-off queue they share.
/// The coordinator takes the receiver; sources never see core state.
pub struct IngestionPipeline {
    sources: Vec<Registered>,

    /// Readiness of mandatory sources
    readiness: ReadinessMask,

    /// Shared metrics
    metrics: Arc<IngestionMetrics>,

    /// Sender (shared by all sources and tasks)
    tx: Sender<SourceMessage>,

    /// Receiver, taken once by the coordinator
    rx: Option<Receiver<SourceMessage>>,

    stop: CancellationToken,
    clock: Arc<dyn Clock>,
    started: bool,
}

impl IngestionPipeline {
    /// Create new Ingestion Pipeline
    ///
    /// # Arguments
    /// * `config` - Queue configuration (capacity 0 = unbounded)
    /// * `stop` - Process-wide stop token, polled by every source thread
    /// * `clock` - Receipt-time clock
    pub fn new(config: QueueConfig, stop: CancellationToken, clock: Arc<dyn Clock>) -> Self {
        let (tx, rx) = if config.is_unbounded() {
            async_channel::unbounded()
        } else {
            async_channel::bounded(config.capacity)
        };

        Self {
            sources: Vec::new(),
            readiness: ReadinessMask::new(),
            metrics: Arc::new(IngestionMetrics::new()),
            tx,
            rx: Some(rx),
            stop,
            clock,
            started: false,
        }
    }

    /// Register an event source
    ///
    /// Mandatory sources get a readiness bit; the first power-on waits for all of them.
    #[instrument(name = "ingestion_register_source", skip(self, source), fields(source = %source.name()))]
    pub fn register_source(&mut self, source: Box<dyn EventSource>) -> crate::Result<()> {
        let bit = if source.is_mandatory() {
            let bit = self.readiness.register().ok_or_else(|| {
                crate::IngestionError::Spawn {
                    source_id: source.name().to_string(),
                    source: std::io::Error::other("too many mandatory sources"),
                }
            })?;
            Some(bit)
        } else {
            None
        };
        debug!(source = %source.name(), mandatory = bit.is_some(), "registered source");
        self.sources.push(Registered { source, bit });
        Ok(())
    }

    /// Start all registered sources
    ///
    /// Announces `Ready` immediately when no source is mandatory.
    #[instrument(name = "ingestion_start_all", skip(self))]
    pub fn start_all(&mut self) -> crate::Result<()> {
        if self.started {
            return Ok(());
        }
        info!(
            count = self.sources.len(),
            mandatory = self.readiness.required_count(),
            "starting all sources"
        );
        for registered in &mut self.sources {
            let link = SourceLink::new(
                SourceTag::new(registered.source.name()),
                self.tx.clone(),
                self.readiness.clone(),
                registered.bit,
                self.metrics.clone(),
                self.stop.clone(),
                self.clock.clone(),
            );
            debug!(source = %registered.source.name(), "starting source");
            registered.source.start(link)?;
        }
        self.started = true;

        if self.readiness.announce_if_complete() {
            debug!("no mandatory sources, ready immediately");
            self.tx
                .try_send(SourceMessage::Ready)
                .map_err(|_| crate::IngestionError::ChannelClosed {
                    source_id: "pipeline".to_string(),
                })?;
        }
        Ok(())
    }

    /// Stop all sources and join their threads
    ///
    /// A source still blocked after `timeout` is detached with a warning.
    #[instrument(name = "ingestion_stop_all", skip(self))]
    pub fn stop_all(&mut self, timeout: Duration) {
        if !self.started {
            return;
        }
        info!(count = self.sources.len(), "stopping all sources");
        self.stop.cancel();
        for registered in &mut self.sources {
            registered.source.stop();
        }
        let deadline = Instant::now() + timeout;
        for registered in &mut self.sources {
            if !registered.source.join(deadline) {
                warn!(source = %registered.source.name(), "source did not stop in time, detaching");
            }
        }
        self.started = false;
    }

    /// Get the message receiver
    ///
    /// Note: Can only be called once, subsequent calls return None
    pub fn take_receiver(&mut self) -> Option<Receiver<SourceMessage>> {
        self.rx.take()
    }

    /// Sender for in-process producers (task plugins)
    pub fn sender(&self) -> Sender<SourceMessage> {
        self.tx.clone()
    }

    /// Process-wide stop token shared with every source
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Receipt-time clock handed to every source
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn readiness(&self) -> &ReadinessMask {
        &self.readiness
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn is_source_running(&self, name: &str) -> bool {
        self.sources
            .iter()
            .any(|r| r.source.name() == name && r.source.is_running())
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.stop_all(Duration::from_millis(200));
    }
}
