//! CoreHandle - what a task plugin may do to the running core

use std::sync::Arc;
use std::time::Duration;

use async_channel::{Sender, TrySendError};
use bytes::Bytes;
use contracts::{BootEvent, Clock, SourceMessage, SourceTag};
use tracing::{trace, warn};

use crate::timer::{TimerHandle, TimerService, TimerTarget};

/// Handle given to a task plugin at `init`
///
/// Injected events go through the same hand-off queue as adapter output,
/// tagged `task_<id>`. Timer firings come back through `TaskPlugin::on_timer`.
#[derive(Clone)]
pub struct CoreHandle {
    task_id: String,
    tag: SourceTag,
    tx: Sender<SourceMessage>,
    timers: TimerService,
    clock: Arc<dyn Clock>,
}

impl CoreHandle {
    pub(crate) fn new(
        task_id: &str,
        tx: Sender<SourceMessage>,
        timers: TimerService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            task_id: task_id.to_string(),
            tag: SourceTag::for_task(task_id),
            tx,
            timers,
            clock,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Tag carried by injected events
    pub fn tag(&self) -> &SourceTag {
        &self.tag
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Inject one line, stamped now
    ///
    /// Returns false when the queue is full or closed; the line is dropped.
    pub fn inject(&self, payload: impl Into<Bytes>) -> bool {
        let event = BootEvent::new(self.now(), payload, self.tag.clone());
        match self.tx.try_send(SourceMessage::Event(event)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!(task = %self.task_id, "queue full, injected line dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(task = %self.task_id, "queue closed, injected line dropped");
                false
            }
        }
    }

    /// `on_timer(timer_id)` once after `after`
    pub fn schedule_once(&self, after: Duration, timer_id: u64) -> TimerHandle {
        self.timers.schedule_once(after, self.target(timer_id))
    }

    /// `on_timer(timer_id)` every `period`
    pub fn schedule_periodic(&self, period: Duration, timer_id: u64) -> TimerHandle {
        self.timers.schedule_periodic(period, self.target(timer_id))
    }

    fn target(&self, timer_id: u64) -> TimerTarget {
        TimerTarget::Task {
            task_id: self.task_id.clone(),
            timer_id,
        }
    }
}

impl std::fmt::Debug for CoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreHandle")
            .field("task_id", &self.task_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ManualClock;

    #[tokio::test]
    async fn test_inject_tags_event() {
        let (tx, rx) = async_channel::bounded(1);
        let (timers, _timer_rx) = TimerService::new();
        let core = CoreHandle::new("heartbeat", tx, timers, Arc::new(ManualClock::new(4.5)));

        assert!(core.inject("heartbeat 1"));
        // Queue of one is now full
        assert!(!core.inject("heartbeat 2"));

        match rx.recv().await.unwrap() {
            SourceMessage::Event(event) => {
                assert_eq!(event.source, "task_heartbeat");
                assert_eq!(event.timestamp, 4.5);
                assert_eq!(event.text(), "heartbeat 1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_targets_task() {
        let (tx, _rx) = async_channel::unbounded();
        let (timers, mut timer_rx) = TimerService::new();
        let core = CoreHandle::new("recorder", tx, timers, Arc::new(ManualClock::new(0.0)));

        core.schedule_once(Duration::from_millis(10), 3);
        let fired = timer_rx.recv().await.unwrap();
        assert_eq!(
            fired.target,
            TimerTarget::Task {
                task_id: "recorder".into(),
                timer_id: 3
            }
        );
    }
}
