//! Timers owned by the coordinator
//!
//! Every timer runs as a small tokio task that sleeps and then reports back
//! through one channel, so firing is handled on the coordinator's own task.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::trace;

pub type TimerId = u64;

/// What a fired timer is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerTarget {
    /// Deferred power-off after a completion
    PowerOff,
    /// Next scheduled power-on after cooldown
    Start,
    /// Delivered to a task plugin's `on_timer`
    Task { task_id: String, timer_id: u64 },
}

impl TimerTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PowerOff => "power_off",
            Self::Start => "start",
            Self::Task { .. } => "task",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFired {
    pub id: TimerId,
    pub target: TimerTarget,
}

/// Spawns timers that report into the coordinator's timer channel
#[derive(Debug, Clone)]
pub struct TimerService {
    tx: mpsc::UnboundedSender<TimerFired>,
    next_id: Arc<AtomicU64>,
}

impl TimerService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                next_id: Arc::new(AtomicU64::new(1)),
            },
            rx,
        )
    }

    /// Fire `target` once after `after`
    pub fn schedule_once(&self, after: Duration, target: TimerTarget) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let done = Arc::new(AtomicBool::new(false));
        let tx = self.tx.clone();
        let flag = done.clone();

        let task = tokio::spawn(async move {
            time::sleep(after).await;
            // cancel() may have won the race
            if !flag.swap(true, Ordering::AcqRel) {
                trace!(id, kind = target.kind(), "timer fired");
                let _ = tx.send(TimerFired { id, target });
            }
        });

        TimerHandle {
            id,
            abort: task.abort_handle(),
            done,
        }
    }

    /// Fire `target` every `period`, first after one period
    pub fn schedule_periodic(&self, period: Duration, target: TimerTarget) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let done = Arc::new(AtomicBool::new(false));
        let tx = self.tx.clone();
        let flag = done.clone();

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                let fired = TimerFired {
                    id,
                    target: target.clone(),
                };
                if tx.send(fired).is_err() {
                    break;
                }
            }
        });

        TimerHandle {
            id,
            abort: task.abort_handle(),
            done,
        }
    }
}

/// Handle to a scheduled timer
#[derive(Debug)]
pub struct TimerHandle {
    id: TimerId,
    abort: AbortHandle,
    done: Arc<AtomicBool>,
}

impl TimerHandle {
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Still pending (one-shot) or still ticking (periodic)
    pub fn is_active(&self) -> bool {
        !self.done.load(Ordering::Acquire)
    }

    /// Stop the timer
    ///
    /// Idempotent. Returns `true` only when this call stopped a live timer.
    pub fn cancel(&self) -> bool {
        if self.done.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.abort.abort();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_once_fires_after_delay() {
        let (timers, mut rx) = TimerService::new();
        let handle = timers.schedule_once(Duration::from_millis(300), TimerTarget::PowerOff);
        assert!(handle.is_active());

        time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.id, handle.id());
        assert_eq!(fired.target, TimerTarget::PowerOff);
        assert!(!handle.is_active());
        // Already fired: nothing left to cancel
        assert!(!handle.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let (timers, mut rx) = TimerService::new();
        let handle = timers.schedule_once(Duration::from_secs(1), TimerTarget::Start);
        assert!(handle.cancel());
        assert!(!handle.cancel());

        time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_ticks_until_cancelled() {
        let (timers, mut rx) = TimerService::new();
        let target = TimerTarget::Task {
            task_id: "heartbeat".into(),
            timer_id: 7,
        };
        let handle = timers.schedule_periodic(Duration::from_millis(100), target.clone());

        for _ in 0..3 {
            assert_eq!(rx.recv().await.unwrap().target, target);
        }
        assert!(handle.cancel());
        time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_ids_are_unique() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let (timers, _rx) = TimerService::new();
            let a = timers.schedule_once(Duration::from_secs(5), TimerTarget::Start);
            let b = timers.schedule_once(Duration::from_secs(5), TimerTarget::Start);
            assert_ne!(a.id(), b.id());
            a.cancel();
            b.cancel();
        });
    }
}
