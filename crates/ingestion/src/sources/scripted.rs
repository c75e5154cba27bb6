//! 脚本事件源
//!
//! 按顺序发送预先写好的行或电源状态变化，用于测试和演示。

use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{PowerState, SourceTag};
use tracing::debug;

use crate::source::{sleep_unless_stopped, EventSource, SourceLink, WorkerThread};

/// One scripted step
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Emit a line; `at` pins the timestamp instead of reading the clock
    Line { at: Option<f64>, payload: Bytes },
    /// Emit a power transition
    Power { at: Option<f64>, state: PowerState },
    /// Pause before the next step
    Wait(Duration),
}

/// Plays back a fixed script on its own thread
pub struct ScriptedSource {
    tag: SourceTag,
    mandatory: bool,
    steps: Vec<ScriptStep>,
    worker: WorkerThread,
}

impl ScriptedSource {
    pub fn new(tag: impl Into<SourceTag>) -> Self {
        Self {
            tag: tag.into(),
            mandatory: false,
            steps: Vec::new(),
            worker: WorkerThread::default(),
        }
    }

    /// Mandatory scripted sources report ready before their first step
    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }

    pub fn line(mut self, text: impl Into<Bytes>) -> Self {
        self.steps.push(ScriptStep::Line {
            at: None,
            payload: text.into(),
        });
        self
    }

    pub fn line_at(mut self, at: f64, text: impl Into<Bytes>) -> Self {
        self.steps.push(ScriptStep::Line {
            at: Some(at),
            payload: text.into(),
        });
        self
    }

    pub fn power_at(mut self, at: f64, state: PowerState) -> Self {
        self.steps.push(ScriptStep::Power {
            at: Some(at),
            state,
        });
        self
    }

    pub fn wait(mut self, duration: Duration) -> Self {
        self.steps.push(ScriptStep::Wait(duration));
        self
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }
}

impl EventSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.tag
    }

    fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    fn start(&mut self, link: SourceLink) -> crate::Result<()> {
        if self.worker.is_running() {
            return Err(crate::IngestionError::AlreadyRunning {
                source_id: self.tag.to_string(),
            });
        }
        let steps = self.steps.clone();
        let link = link.with_tag(self.tag.clone());
        self.worker = WorkerThread::spawn(&self.tag, move || {
            link.mark_ready();
            play(&link, steps);
            debug!(source = %link.tag(), "script finished");
        })?;
        Ok(())
    }

    fn stop(&mut self) {}

    fn join(&mut self, deadline: Instant) -> bool {
        self.worker.join(deadline)
    }

    fn is_running(&self) -> bool {
        self.worker.is_running()
    }
}

fn play(link: &SourceLink, steps: Vec<ScriptStep>) {
    for step in steps {
        if link.should_stop() {
            return;
        }
        match step {
            ScriptStep::Line { at, payload } => {
                link.emit_line(at.unwrap_or_else(|| link.now()), payload);
            }
            ScriptStep::Power { at, state } => {
                link.emit_power(at.unwrap_or_else(|| link.now()), state);
            }
            ScriptStep::Wait(duration) => {
                if !sleep_unless_stopped(link, duration) {
                    return;
                }
            }
        }
    }
}
