//! Measurement orchestrator - wires sources, power driver and coordinator.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{BootBlueprint, Clock, SystemClock};
use coordinator::{Coordinator, TaskRegistry};
use ingestion::{CommandSource, DeviceLineSource, IngestionPipeline, QueueConfig};
use power_control::CommandPowerDriver;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::RunReport;

/// Measurement configuration
#[derive(Debug, Clone)]
pub struct MeasurementConfig {
    /// Effective configuration (file + overrides), already validated
    pub blueprint: BootBlueprint,

    /// Ingestion queue capacity (0 = unbounded)
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Runs one measurement session from start to statistics
pub struct Measurement {
    config: MeasurementConfig,
}

impl Measurement {
    pub fn new(config: MeasurementConfig) -> Self {
        Self { config }
    }

    /// Run until every iteration is measured or Ctrl-C / SIGTERM
    pub async fn run(self) -> Result<RunReport> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
        }

        let stop = CancellationToken::new();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let pipeline = self.build_pipeline(stop.clone(), clock)?;

        let driver = CommandPowerDriver::from_settings(&blueprint.settings);
        let registry = TaskRegistry::with_builtins();
        let coordinator = Coordinator::new(blueprint, driver, pipeline, &registry)
            .context("Failed to prepare the measurement")?;

        let signals = tokio::spawn(cancel_on_shutdown_signal(stop));

        info!(
            iterations = blueprint.settings.iterations,
            triggers = blueprint.triggers.len(),
            intervals = blueprint.intervals.len(),
            "Starting measurements..."
        );
        let outcome = coordinator.run().await;
        signals.abort();
        let outcome = outcome.context("Measurement failed")?;

        Ok(RunReport::new(outcome, start_time.elapsed()))
    }

    /// One adapter per configured source
    fn build_pipeline(
        &self,
        stop: CancellationToken,
        clock: Arc<dyn Clock>,
    ) -> Result<IngestionPipeline> {
        let blueprint = &self.config.blueprint;
        let mut pipeline =
            IngestionPipeline::new(QueueConfig::new(self.config.buffer_size), stop, clock);

        if let Some(serial) = &blueprint.serial {
            info!(device = %serial.device, reconnect = serial.reconnect, "serial source");
            pipeline
                .register_source(Box::new(DeviceLineSource::new(serial)))
                .context("Failed to register serial source")?;
        }
        if let Some(journal) = &blueprint.journal {
            info!(command = %journal.command, source = %journal.source, "log source");
            pipeline
                .register_source(Box::new(CommandSource::journal(journal)))
                .context("Failed to register log source")?;
        }
        if let Some(signal) = &blueprint.power_signal {
            info!(command = %signal.command, source = %signal.source, "power signal source");
            pipeline
                .register_source(Box::new(CommandSource::power_signal(signal)))
                .context("Failed to register power signal source")?;
        }

        if pipeline.source_count() == 0 {
            warn!("no event source configured, nothing can match");
        }
        Ok(pipeline)
    }
}

/// Cancel `stop` on Ctrl-C or SIGTERM
async fn cancel_on_shutdown_signal(stop: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping measurements...");
    stop.cancel();
}

/// Zero disables the Prometheus endpoint
pub fn metrics_port(port: u16) -> Option<u16> {
    (port != 0).then_some(port)
}
