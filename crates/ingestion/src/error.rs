//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 通道已关闭
    #[error("channel closed for source {source_id}")]
    ChannelClosed {
        /// 事件源名称
        source_id: String,
    },

    /// 事件源已在运行
    #[error("source {source_id} is already running")]
    AlreadyRunning {
        /// 事件源名称
        source_id: String,
    },

    /// 无法启动工作线程或外部命令
    #[error("failed to start source {source_id}: {source}")]
    Spawn {
        /// 事件源名称
        source_id: String,
        #[source]
        source: std::io::Error,
    },
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
