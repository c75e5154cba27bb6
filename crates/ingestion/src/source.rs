//! 事件源 trait
//!
//! 每个事件源在自己的线程上做阻塞 I/O，只通过 `SourceLink` 向协调器交付消息，
//! 从不直接触碰核心状态。

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use async_channel::{Sender, TrySendError};
use bytes::Bytes;
use contracts::{BootEvent, Clock, PowerState, SourceMessage, SourceTag};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::IngestionMetrics;
use crate::readiness::ReadinessMask;

/// 事件源 trait
///
/// 实现者负责：
/// 1. 在 `start` 中启动自己的工作线程
/// 2. 把读到的内容通过 `SourceLink` 交付
/// 3. 在 `stop` 后尽快关闭底层传输并退出线程
pub trait EventSource: Send {
    /// 事件源名称 (日志用)
    fn name(&self) -> &str;

    /// 必需事件源在就绪前阻止第一次上电
    fn is_mandatory(&self) -> bool {
        false
    }

    /// 启动采集
    fn start(&mut self, link: SourceLink) -> crate::Result<()>;

    /// 请求停止 (不等待)
    fn stop(&mut self);

    /// 等待工作线程退出，超过 `deadline` 返回 `false`
    fn join(&mut self, deadline: Instant) -> bool;

    /// 检查工作线程是否仍在运行
    fn is_running(&self) -> bool;
}

/// Everything a source needs to hand messages to the coordinator
#[derive(Clone)]
pub struct SourceLink {
    tag: SourceTag,
    tx: Sender<SourceMessage>,
    readiness: ReadinessMask,
    bit: Option<u32>,
    metrics: Arc<IngestionMetrics>,
    stop: CancellationToken,
    clock: Arc<dyn Clock>,
}

impl SourceLink {
    pub fn new(
        tag: SourceTag,
        tx: Sender<SourceMessage>,
        readiness: ReadinessMask,
        bit: Option<u32>,
        metrics: Arc<IngestionMetrics>,
        stop: CancellationToken,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tag,
            tx,
            readiness,
            bit,
            metrics,
            stop,
            clock,
        }
    }

    /// Same link under a different tag (sources emitting more than one channel)
    pub fn with_tag(&self, tag: impl Into<SourceTag>) -> Self {
        Self {
            tag: tag.into(),
            ..self.clone()
        }
    }

    pub fn tag(&self) -> &SourceTag {
        &self.tag
    }

    /// Receipt time from the pipeline clock
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn should_stop(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    pub fn metrics(&self) -> &IngestionMetrics {
        &self.metrics
    }

    /// Hand off one line under this link's tag
    pub fn emit_line(&self, timestamp: f64, payload: Bytes) -> bool {
        self.emit_event(BootEvent::new(timestamp, payload, self.tag.clone()))
    }

    /// Hand off an event without blocking; a full queue drops it
    pub fn emit_event(&self, event: BootEvent) -> bool {
        self.metrics.record_received(&self.tag);
        self.send(SourceMessage::Event(event))
    }

    pub fn emit_power(&self, timestamp: f64, state: PowerState) -> bool {
        self.metrics.record_power_transition();
        self.send(SourceMessage::Power { timestamp, state })
    }

    /// Set this source's readiness bit; the caller completing the mask sends `Ready`
    pub fn mark_ready(&self) {
        let Some(bit) = self.bit else { return };
        if self.readiness.is_ready(bit) {
            return;
        }
        debug!(source = %self.tag, "source ready");
        if self.readiness.mark_ready(bit) {
            debug!("all mandatory sources ready");
            // Ready must not be dropped; adapters run on their own threads
            if self.tx.send_blocking(SourceMessage::Ready).is_err() {
                warn!(source = %self.tag, "coordinator gone before ready");
            }
        }
    }

    pub fn mark_lost(&self) {
        if let Some(bit) = self.bit {
            debug!(source = %self.tag, "source lost");
            self.readiness.mark_lost(bit);
        }
    }

    fn send(&self, msg: SourceMessage) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => {
                trace!(source = %self.tag, "message handed off");
                true
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.record_dropped(&self.tag);
                trace!(source = %self.tag, "queue full, message dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                trace!(source = %self.tag, "queue closed");
                false
            }
        }
    }
}

/// Join handle of a source's worker thread
#[derive(Debug, Default)]
pub struct WorkerThread {
    handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    /// Spawn a named worker thread
    pub fn spawn<F>(name: &str, f: F) -> crate::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = std::thread::Builder::new()
            .name(format!("src-{name}"))
            .spawn(f)
            .map_err(|source| crate::IngestionError::Spawn {
                source_id: name.to_string(),
                source,
            })?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Join with a deadline. A thread still blocked afterwards is detached.
    pub fn join(&mut self, deadline: Instant) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                // Dropping the handle detaches the thread
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        if handle.join().is_err() {
            warn!("source thread panicked");
        }
        true
    }
}

/// Sleep in small steps so a stop request is seen promptly
pub(crate) fn sleep_unless_stopped(link: &SourceLink, total: Duration) -> bool {
    let step = Duration::from_millis(20);
    let deadline = Instant::now() + total;
    loop {
        if link.should_stop() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(step.min(deadline - now));
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_queue_drops_and_counts() {
        let (link, rx, _) = test_support::link("serial", 1);
        assert!(link.emit_line(1.0, Bytes::from_static(b"a")));
        assert!(!link.emit_line(2.0, Bytes::from_static(b"b")));
        assert_eq!(link.metrics().snapshot().events_dropped, 1);
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_mark_ready_sends_ready_once() {
        let (link, rx, readiness) = test_support::link("serial", 0);
        link.mark_ready();
        link.mark_ready();
        assert!(readiness.is_complete());
        assert_eq!(rx.try_recv().ok(), Some(SourceMessage::Ready));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_with_tag_shares_channel() {
        let (link, rx, _) = test_support::link("serial", 0);
        let other = link.with_tag("task_ping");
        other.emit_line(link.now(), Bytes::from_static(b"pong"));
        match rx.try_recv() {
            Ok(SourceMessage::Event(ev)) => {
                assert_eq!(ev.source, "task_ping");
                assert_eq!(ev.timestamp, 100.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_worker_join_deadline() {
        let mut worker = WorkerThread::spawn("sleepy", || {
            std::thread::sleep(Duration::from_millis(300));
        })
        .unwrap();
        assert!(worker.is_running());
        assert!(!worker.join(Instant::now() + Duration::from_millis(20)));
        assert!(!worker.is_running());
    }
}
