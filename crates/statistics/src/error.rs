//! Statistics 错误类型

use std::path::PathBuf;

use contracts::ContractError;
use thiserror::Error;

/// 参考文件读写错误
#[derive(Debug, Error)]
pub enum StatisticsError {
    /// 读取失败
    #[error("failed to read reference file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 解析失败
    #[error("failed to parse reference file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// 写入失败
    #[error("failed to write reference file {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
}

impl From<StatisticsError> for ContractError {
    fn from(err: StatisticsError) -> Self {
        let path = match &err {
            StatisticsError::Read { path, .. }
            | StatisticsError::Parse { path, .. }
            | StatisticsError::Write { path, .. } => path.display().to_string(),
        };
        ContractError::reference(path, err.to_string())
    }
}

/// Statistics Result 类型别名
pub type Result<T> = std::result::Result<T, StatisticsError>;
