//! Coordinator - the single-threaded run loop
//!
//! Owns the correlator, the power controller, the timers, the task plugins
//! and the mirrors. Adapter threads only reach it through the ingestion queue.

use std::sync::Arc;
use std::time::Duration;

use async_channel::Receiver;
use contracts::{BootBlueprint, BootEvent, Catalog, Clock, History, SourceMessage, SourceTag};
use correlator::{Correlator, IngestOutcome, MatchReport, TaskHook};
use ingestion::{IngestionPipeline, MetricsSnapshot};
use observability::{record_queue_depth, record_timer_fired, RunCounters};
use power_control::{
    PowerAction, PowerCommand, PowerConfig, PowerController, PowerDriver,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::CoordinatorError;
use crate::handle::CoreHandle;
use crate::metrics::MirrorMetrics;
use crate::sinks::{ConsoleMirror, FileMirror, MirrorSet, MirrorSink};
use crate::tasks::{TaskRegistry, TaskSet};
use crate::timer::{TimerFired, TimerHandle, TimerService, TimerTarget};

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How long shutdown waits for each adapter thread
    pub join_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(2),
        }
    }
}

/// Result of a run
#[derive(Debug)]
pub struct RunOutcome {
    /// Samples of completed iterations only
    pub history: History,
    pub catalog: Catalog,
    /// Completed (counted) iterations
    pub iterations: usize,
    /// Stopped before the configured iteration count
    pub interrupted: bool,
    pub counters: RunCounters,
    pub ingestion: MetricsSnapshot,
    pub mirrors: Vec<(String, MirrorMetrics)>,
}

/// The run loop
pub struct Coordinator<D: PowerDriver> {
    correlator: Correlator,
    controller: PowerController,
    driver: D,
    pipeline: IngestionPipeline,
    rx: Receiver<SourceMessage>,
    timers: TimerService,
    timer_rx: mpsc::UnboundedReceiver<TimerFired>,
    tasks: TaskSet,
    mirrors: MirrorSet,
    clock: Arc<dyn Clock>,
    stop: CancellationToken,
    config: CoordinatorConfig,
    /// Deferred power-off after a completion
    pending_off: Option<TimerHandle>,
    /// Next power-on after cooldown
    pending_start: Option<TimerHandle>,
    counters: RunCounters,
    started: bool,
    finished: bool,
}

impl<D: PowerDriver> Coordinator<D> {
    /// Build a coordinator over a pipeline whose sources are already registered
    ///
    /// Mirrors come from `blueprint.mirror`; task references are checked
    /// against `registry` here, before anything runs.
    ///
    /// # Errors
    /// `UnknownTask`, an uncompilable pattern, or a mirror file that cannot be created.
    pub fn new(
        blueprint: &BootBlueprint,
        driver: D,
        mut pipeline: IngestionPipeline,
        registry: &TaskRegistry,
    ) -> Result<Self, CoordinatorError> {
        let correlator = Correlator::new(blueprint)?;
        let controller = PowerController::new(PowerConfig::from_blueprint(blueprint));
        let rx = pipeline
            .take_receiver()
            .ok_or(CoordinatorError::ReceiverTaken)?;
        let clock = pipeline.clock();
        let (timers, timer_rx) = TimerService::new();

        let sender = pipeline.sender();
        let tasks = TaskSet::build(blueprint, registry, |task_id| {
            CoreHandle::new(task_id, sender.clone(), timers.clone(), clock.clone())
        })?;

        let mut mirrors = MirrorSet::new();
        let mirror = &blueprint.mirror;
        if mirror.show_console || mirror.show_console_diff {
            mirrors.push(Box::new(ConsoleMirror::new(mirror.show_console_diff)));
        }
        if let Some(path) = &mirror.log_file {
            let source = SourceTag::new(&blueprint.settings.default_source);
            let file = FileMirror::create(path, Some(source))
                .map_err(|e| CoordinatorError::mirror(path, e))?;
            mirrors.push(Box::new(file));
        }

        Ok(Self {
            correlator,
            controller,
            driver,
            stop: pipeline.stop_token(),
            pipeline,
            rx,
            timers,
            timer_rx,
            tasks,
            mirrors,
            clock,
            config: CoordinatorConfig::default(),
            pending_off: None,
            pending_start: None,
            counters: RunCounters::new(),
            started: false,
            finished: false,
        })
    }

    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a mirror besides the configured ones
    pub fn with_mirror(mut self, mirror: Box<dyn MirrorSink>) -> Self {
        self.mirrors.push(mirror);
        self
    }

    /// Token that stops the run (Ctrl-C, SIGTERM)
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Start the sources and run until every iteration is done or the stop
    /// token fires
    ///
    /// # Errors
    /// Fatal errors only. No partial statistics are returned with them.
    #[instrument(
        name = "coordinator_run",
        skip(self),
        fields(iterations = self.controller.config().iterations, driver = %self.driver.name())
    )]
    pub async fn run(mut self) -> Result<RunOutcome, CoordinatorError> {
        info!(
            tasks = self.tasks.len(),
            mirrors = self.mirrors.len(),
            sources = self.pipeline.source_count(),
            "coordinator started, waiting for sources"
        );

        let result = match self.pipeline.start_all() {
            Ok(()) => self.event_loop().await,
            Err(e) => Err(e.into()),
        };

        let interrupted = match &result {
            Ok(interrupted) => *interrupted,
            Err(_) => true,
        };
        if interrupted {
            self.correlator.abort_window();
        }
        self.shutdown();

        match result {
            Ok(interrupted) => Ok(self.into_outcome(interrupted)),
            Err(e) => {
                error!(error = %e, "run aborted");
                Err(e)
            }
        }
    }

    /// Returns whether the run was interrupted
    async fn event_loop(&mut self) -> Result<bool, CoordinatorError> {
        loop {
            if self.finished {
                return Ok(false);
            }

            tokio::select! {
                biased;

                _ = self.stop.cancelled() => {
                    info!(completed = self.controller.completed(), "stop requested");
                    return Ok(true);
                }

                Some(fired) = self.timer_rx.recv() => {
                    self.on_timer(fired).await?;
                }

                msg = self.rx.recv() => match msg {
                    Ok(msg) => self.on_message(msg).await?,
                    Err(_) => {
                        warn!("ingestion queue closed");
                        return Ok(true);
                    }
                },
            }
        }
    }

    async fn on_message(&mut self, msg: SourceMessage) -> Result<(), CoordinatorError> {
        record_queue_depth(self.rx.len());
        match msg {
            SourceMessage::Ready => self.on_ready().await,
            SourceMessage::Event(event) => self.on_event(event).await,
            SourceMessage::Power { timestamp, state } => {
                self.counters.power_signals += 1;
                debug!(?state, timestamp, "power signal");
                let actions = self.controller.on_power_signal(
                    state,
                    timestamp,
                    self.correlator.matched_any(),
                );
                self.apply(actions).await
            }
        }
    }

    async fn on_ready(&mut self) -> Result<(), CoordinatorError> {
        if self.started {
            debug!("duplicate ready ignored");
            return Ok(());
        }
        self.started = true;
        info!("all mandatory sources ready, starting measurements");
        let actions = self.controller.begin(self.clock.now());
        self.apply(actions).await
    }

    async fn on_event(&mut self, event: BootEvent) -> Result<(), CoordinatorError> {
        self.counters.events += 1;
        if let Some(task_id) = event.source.strip_prefix("task_") {
            self.counters.task_injected(task_id);
        }
        self.mirrors.write(&event);

        match self.correlator.ingest(&event) {
            IngestOutcome::Discarded => {
                self.counters.discarded += 1;
                trace!(source = %event.source, "no window open, event discarded");
                Ok(())
            }
            IngestOutcome::NoMatch => Ok(()),
            IngestOutcome::Blocked { .. } => {
                self.counters.blocked += 1;
                Ok(())
            }
            IngestOutcome::Duplicate { .. } => {
                self.counters.duplicates += 1;
                Ok(())
            }
            IngestOutcome::Matched(report) => {
                self.counters.matches += 1;
                self.on_match(report).await
            }
        }
    }

    async fn on_match(&mut self, report: MatchReport) -> Result<(), CoordinatorError> {
        for hook in &report.task_hooks {
            match hook {
                TaskHook::Start { task, point } => {
                    self.tasks.start(task, point);
                }
                TaskHook::Stop { task, point } => {
                    self.tasks.stop(task, point);
                }
            }
        }

        if let Some(completion) = report.completion {
            self.schedule_power_off(completion.delay).await?;
        }
        Ok(())
    }

    async fn schedule_power_off(&mut self, delay: Duration) -> Result<(), CoordinatorError> {
        if self.pending_off.is_some() {
            debug!("power-off already pending, completion ignored");
            return Ok(());
        }
        if delay.is_zero() {
            return self.power_off_now().await;
        }
        info!(delay_secs = delay.as_secs_f64(), "power-off deferred");
        self.pending_off = Some(self.timers.schedule_once(delay, TimerTarget::PowerOff));
        Ok(())
    }

    async fn power_off_now(&mut self) -> Result<(), CoordinatorError> {
        let actions = self
            .controller
            .request_power_off(self.clock.now(), self.correlator.matched_any())?;
        self.apply(actions).await
    }

    async fn on_timer(&mut self, fired: TimerFired) -> Result<(), CoordinatorError> {
        record_timer_fired(fired.target.kind());
        match fired.target {
            TimerTarget::PowerOff => {
                if !Self::take_if_current(&mut self.pending_off, fired.id) {
                    debug!(id = fired.id, "stale power-off timer");
                    return Ok(());
                }
                self.power_off_now().await
            }
            TimerTarget::Start => {
                if !Self::take_if_current(&mut self.pending_start, fired.id) {
                    debug!(id = fired.id, "stale start timer");
                    return Ok(());
                }
                let actions = self.controller.start_scheduled(self.clock.now());
                self.apply(actions).await
            }
            TimerTarget::Task { task_id, timer_id } => {
                self.tasks.on_timer(&task_id, timer_id);
                Ok(())
            }
        }
    }

    fn take_if_current(slot: &mut Option<TimerHandle>, id: u64) -> bool {
        if slot.as_ref().map(TimerHandle::id) == Some(id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    /// Execute controller actions in order
    ///
    /// A window edge that follows a power command is stamped when the command
    /// returns, not when the controller computed it.
    async fn apply(&mut self, actions: Vec<PowerAction>) -> Result<(), CoordinatorError> {
        let mut commanded = false;
        for action in actions {
            trace!(?action, "power action");
            match action {
                PowerAction::Command(command) => {
                    self.execute(command).await?;
                    commanded = true;
                }
                PowerAction::Prompt(prompt) => debug!(prompt, "waiting for operator"),
                PowerAction::OpenWindow { at } => {
                    let at = if commanded { self.clock.now() } else { at };
                    self.correlator.begin_window(at);
                    self.mirrors.begin_run(self.correlator.iteration());
                }
                PowerAction::CloseWindow { at, counted } => {
                    if let Some(pending) = self.pending_off.take() {
                        pending.cancel();
                    }
                    let at = if commanded { self.clock.now() } else { at };
                    let start = self.correlator.window_start().unwrap_or(at);
                    self.correlator.end_window(at, counted);
                    self.counters.window_closed(at - start, counted);
                }
                PowerAction::ScheduleStart { after } => {
                    if let Some(previous) = self.pending_start.take() {
                        previous.cancel();
                    }
                    debug!(cooldown_secs = after.as_secs_f64(), "next start scheduled");
                    self.pending_start = Some(self.timers.schedule_once(after, TimerTarget::Start));
                }
                PowerAction::Finished => {
                    info!(iterations = self.controller.completed(), "all iterations done");
                    self.finished = true;
                }
            }
        }
        Ok(())
    }

    /// Failed power commands are warnings; only contract violations are fatal
    async fn execute(&mut self, command: PowerCommand) -> Result<(), CoordinatorError> {
        match self.driver.execute(command).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                warn!(%command, driver = %self.driver.name(), error = %e, "power command failed");
                Ok(())
            }
        }
    }

    #[instrument(name = "coordinator_shutdown", skip(self))]
    fn shutdown(&mut self) {
        if let Some(pending) = self.pending_off.take() {
            if pending.cancel() {
                debug!("pending power-off cancelled");
            }
        }
        if let Some(pending) = self.pending_start.take() {
            if pending.cancel() {
                debug!("pending start cancelled");
            }
        }
        self.tasks.finish_all();
        self.pipeline.stop_all(self.config.join_timeout);
        self.mirrors.flush_all();
        info!(counters = %self.counters, "coordinator stopped");
    }

    fn into_outcome(self, interrupted: bool) -> RunOutcome {
        let ingestion = self.pipeline.metrics().snapshot();
        let mirrors = self.mirrors.metrics();
        let iterations = self.correlator.iteration();
        let (history, catalog) = self.correlator.into_parts();
        RunOutcome {
            history,
            catalog,
            iterations,
            interrupted,
            counters: self.counters,
            ingestion,
            mirrors,
        }
    }
}
