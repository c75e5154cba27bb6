//! # Correlator
//!
//! 启动事件关联引擎。
//!
//! 负责：
//! - 按声明顺序匹配触发点 (字面量 / 行首正则 / 事件源过滤)
//! - before / after 顺序约束与重复匹配策略
//! - 记录相对测量窗口起点的耗时，推导区间
//! - 判断本轮测量是否完成
//!
//! ## 使用示例
//!
//! ```ignore
//! use correlator::{Correlator, IngestOutcome};
//!
//! let mut correlator = Correlator::new(&blueprint)?;
//! correlator.begin_window(clock.now());
//!
//! if let IngestOutcome::Matched(report) = correlator.ingest(&event) {
//!     if let Some(completion) = report.completion {
//!         // Power off after completion.delay
//!     }
//! }
//! ```

mod engine;
mod outcome;
mod point;

// Re-exports
pub use engine::{Correlator, POWER_OFF_NAME, POWER_ON_NAME};
pub use outcome::{Completion, IngestOutcome, IntervalReport, MatchReport, TaskHook};
pub use point::CompiledPoint;

// Re-export contracts types
pub use contracts::{BootEvent, Catalog, History};
