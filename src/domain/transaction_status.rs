//! 历史记录状态
//! 本地乐观写入和链上查询结果共用同一组状态

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::transaction_outcome::OutcomeStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// 已创建，尚未广播（本地记录）
    Pending,

    /// 已提交到链上，等待执行结果
    Processing,

    /// 链上执行成功
    Completed,

    /// 执行失败或被拒绝
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl From<OutcomeStatus> for TransactionStatus {
    fn from(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::Submitted => Self::Processing,
            OutcomeStatus::Completed => Self::Completed,
            OutcomeStatus::Failed => Self::Failed,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
