//! Built-in `heartbeat` task
//!
//! While running, injects `heartbeat <n>` every `period_ms` (default 1000).

use std::time::Duration;

use contracts::{ContractError, TaskConfig};
use tracing::{debug, warn};

use super::TaskPlugin;
use crate::handle::CoreHandle;
use crate::timer::TimerHandle;

pub const HEARTBEAT_TASK: &str = "heartbeat";

const DEFAULT_PERIOD_MS: u64 = 1000;

#[derive(Debug, Default)]
pub struct HeartbeatTask {
    core: Option<CoreHandle>,
    timer: Option<TimerHandle>,
    count: u64,
}

impl HeartbeatTask {
    pub fn new() -> Self {
        Self::default()
    }

    fn period(config: &TaskConfig) -> Duration {
        let ms = match config.param("period_ms") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => {
                    warn!(task = %config.id, value = raw, "invalid period_ms, using default");
                    DEFAULT_PERIOD_MS
                }
            },
            None => DEFAULT_PERIOD_MS,
        };
        Duration::from_millis(ms)
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

impl TaskPlugin for HeartbeatTask {
    fn init(&mut self, core: CoreHandle, _task_id: &str) -> Result<(), ContractError> {
        self.core = Some(core);
        Ok(())
    }

    fn start(&mut self, point: &str, config: &TaskConfig) {
        self.cancel_timer();
        let Some(core) = &self.core else {
            return;
        };
        let period = Self::period(config);
        debug!(point, period_ms = period.as_millis() as u64, "heartbeat started");
        self.count = 0;
        self.timer = Some(core.schedule_periodic(period, 0));
    }

    fn stop(&mut self, point: &str, _config: &TaskConfig) {
        debug!(point, beats = self.count, "heartbeat stopped");
        self.cancel_timer();
    }

    fn on_timer(&mut self, _timer_id: u64) {
        if self.timer.is_none() {
            return;
        }
        if let Some(core) = &self.core {
            self.count += 1;
            core.inject(format!("heartbeat {}", self.count));
        }
    }

    fn finish(&mut self) {
        self.cancel_timer();
        self.core = None;
    }
}
