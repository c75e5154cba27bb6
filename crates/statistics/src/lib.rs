//! # Statistics
//!
//! 每个 point / interval 的汇总统计、参考文件比较以及结果表格输出。
//!
//! 只在事件循环结束后读取 `History`，不参与运行期状态。

mod error;
mod reference;
mod render;
mod summary;

pub use error::{Result, StatisticsError};
pub use reference::{
    apply_reference, Comparison, ReferenceOutcome, ReferenceSnapshot, StatDelta,
};
pub use render::{name_width, render_comparison, render_reference, render_results};
pub use summary::{share_of_power_off, summarize, StatSummary};
