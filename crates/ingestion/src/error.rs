//! Ingestion 错误类型与退出状态

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 消息源致命错误
    #[error("source '{source_name}' failed: {error}")]
    SourceFailed {
        /// 消息源名称
        source_name: String,
        /// 原始错误
        #[source]
        error: ContractError,
    },

    /// 消息源任务异常退出
    #[error("source task for '{source_name}' panicked or was cancelled")]
    TaskAborted {
        /// 消息源名称
        source_name: String,
    },

    /// 底层合约错误
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;

/// 正常结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// 消息流已结束
    EndOfStream,
    /// 收到停止请求
    Stopped,
    /// 下游通道已关闭
    DownstreamClosed,
}

/// 消息源任务的最终结果
///
/// 下游只会观察到通道关闭；此值用于区分正常关闭与上游致命错误。
#[derive(Debug)]
pub enum SourceExit {
    /// 正常结束
    Completed(CompletionReason),
    /// 致命错误
    Failed(IngestionError),
}

impl SourceExit {
    /// 是否正常结束
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// 转换为 Result，致命错误变为 Err
    pub fn into_result(self) -> Result<CompletionReason> {
        match self {
            Self::Completed(reason) => Ok(reason),
            Self::Failed(e) => Err(e),
        }
    }
}
