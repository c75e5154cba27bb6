//! 运行期指标
//!
//! Prometheus 侧的记录函数，以及供运行结束时打印的内存计数器。

use metrics::{counter, gauge, histogram};

/// 记录测量窗口关闭
///
/// `counted = false` 表示空窗口 (没有任何触发点匹配)。
pub fn record_window_closed(duration_secs: f64, counted: bool) {
    let status = if counted { "counted" } else { "spurious" };
    counter!("bootstats_windows_closed_total", "status" => status).increment(1);
    if counted {
        histogram!("bootstats_window_seconds").record(duration_secs);
    }
}

/// 记录任务注入的事件
pub fn record_task_injected(task_id: &str) {
    counter!("bootstats_task_events_total", "task" => task_id.to_string()).increment(1);
}

/// 记录定时器触发
pub fn record_timer_fired(kind: &'static str) {
    counter!("bootstats_timers_fired_total", "kind" => kind).increment(1);
}

/// 记录 hand-off 队列深度
pub fn record_queue_depth(depth: usize) {
    gauge!("bootstats_queue_depth").set(depth as f64);
}

/// 协调器在一次运行中累计的计数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// 收到的事件 (含任务注入)
    pub events: u64,
    /// 窗口关闭时被丢弃的事件
    pub discarded: u64,
    pub matches: u64,
    pub duplicates: u64,
    pub blocked: u64,
    pub power_signals: u64,
    pub completed_iterations: u64,
    pub spurious_windows: u64,
    pub task_events: u64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// 窗口关闭
    pub fn window_closed(&mut self, duration_secs: f64, counted: bool) {
        if counted {
            self.completed_iterations += 1;
        } else {
            self.spurious_windows += 1;
        }
        record_window_closed(duration_secs, counted);
    }

    /// 任务注入事件
    pub fn task_injected(&mut self, task_id: &str) {
        self.task_events += 1;
        record_task_injected(task_id);
    }
}

impl std::fmt::Display for RunCounters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "events={} matches={} duplicates={} blocked={} discarded={} power_signals={} \
             iterations={} spurious={} task_events={}",
            self.events,
            self.matches,
            self.duplicates,
            self.blocked,
            self.discarded,
            self.power_signals,
            self.completed_iterations,
            self.spurious_windows,
            self.task_events
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_counters() {
        let mut counters = RunCounters::new();
        counters.window_closed(1.5, true);
        counters.window_closed(0.2, false);
        counters.window_closed(1.4, true);
        counters.task_injected("heartbeat");

        assert_eq!(counters.completed_iterations, 2);
        assert_eq!(counters.spurious_windows, 1);
        assert_eq!(counters.task_events, 1);
    }

    #[test]
    fn test_display() {
        let counters = RunCounters {
            events: 12,
            matches: 4,
            ..RunCounters::default()
        };
        let text = counters.to_string();
        assert!(text.starts_with("events=12 matches=4"));
        assert!(text.contains("spurious=0"));
    }
}
