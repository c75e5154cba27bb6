//! # Coordinator
//!
//! 测量主循环。
//!
//! 负责：
//! - 消费摄取队列中的事件 / 电源信号 / 就绪消息
//! - 驱动关联引擎与电源状态机
//! - 定时器 (延迟断电、冷却后上电、任务定时)
//! - 任务插件的启动 / 停止
//! - 原始输出镜像 (终端、日志文件)，镜像失败不影响测量

pub mod coordinator;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;
pub mod tasks;
pub mod timer;

pub use coordinator::{Coordinator, CoordinatorConfig, RunOutcome};
pub use error::CoordinatorError;
pub use handle::CoreHandle;
pub use metrics::MirrorMetrics;
pub use sinks::{ConsoleMirror, FileMirror, MirrorSet, MirrorSink};
pub use tasks::{HeartbeatTask, TaskFactory, TaskPlugin, TaskRegistry, TaskSet, HEARTBEAT_TASK};
pub use timer::{TimerFired, TimerHandle, TimerId, TimerService, TimerTarget};
