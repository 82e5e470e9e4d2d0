//! 提交结果
//!
//! 每次提交尝试生成一个不可变的 `TransactionOutcome`，不做自动重试。
//! 批量提交按收款方逐个给出结果，部分失败不会被折叠成一个整体失败。

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::{
    domain::transaction_intent::IntentKind,
    error::{FailedRecipient, WalletError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// 已提交，尚未确认上链
    Submitted,
    /// 链上执行成功
    Completed,
    Failed,
}

/// 结果来源：真实账本或降级模拟
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeSource {
    Ledger,
    Simulation,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionOutcome {
    pub hash: Option<String>,
    pub status: OutcomeStatus,
    pub source: OutcomeSource,
    /// provider 原始回执，仅用于诊断
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
    #[serde(skip)]
    pub error: Option<WalletError>,
}

impl TransactionOutcome {
    pub fn submitted(hash: Option<String>, raw: Option<Value>) -> Self {
        Self {
            hash,
            status: OutcomeStatus::Submitted,
            source: OutcomeSource::Ledger,
            raw,
            error: None,
        }
    }

    pub fn failed(error: WalletError) -> Self {
        Self {
            hash: None,
            status: OutcomeStatus::Failed,
            source: OutcomeSource::Ledger,
            raw: None,
            error: Some(error),
        }
    }

    /// 降级模拟：没有哈希，状态停留在 submitted
    pub fn simulated() -> Self {
        Self {
            hash: None,
            status: OutcomeStatus::Submitted,
            source: OutcomeSource::Simulation,
            raw: None,
            error: None,
        }
    }

    pub fn with_status(mut self, status: OutcomeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_error(mut self, error: WalletError) -> Self {
        self.status = OutcomeStatus::Failed;
        self.error = Some(error);
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }

    pub fn is_simulated(&self) -> bool {
        self.source == OutcomeSource::Simulation
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

/// 批量提交方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// 一次多收款方合约调用，对账本而言是原子的
    Atomic,
    /// 逐个提交，可能部分失败
    Sequential,
}

/// 单个收款方的结果
#[derive(Debug, Clone, Serialize)]
pub struct RecipientOutcome {
    pub index: usize,
    pub address: String,
    pub amount: Decimal,
    pub currency: String,
    pub outcome: TransactionOutcome,
}

/// 一次 submit 调用的完整报告
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReport {
    pub kind: IntentKind,
    pub batch_mode: Option<BatchMode>,
    pub outcomes: Vec<RecipientOutcome>,
}

impl SubmissionReport {
    pub fn statuses(&self) -> Vec<OutcomeStatus> {
        self.outcomes.iter().map(|o| o.outcome.status).collect()
    }

    pub fn failed(&self) -> Vec<FailedRecipient> {
        self.outcomes
            .iter()
            .filter(|o| o.outcome.is_failed())
            .map(|o| FailedRecipient {
                index: o.index,
                address: o.address.clone(),
                reason: o
                    .outcome
                    .error_message()
                    .unwrap_or_else(|| "unknown error".to_string()),
            })
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| !o.outcome.is_failed())
    }

    pub fn is_partial_failure(&self) -> bool {
        let failed = self.failed().len();
        failed > 0 && failed < self.outcomes.len()
    }

    pub fn is_simulated(&self) -> bool {
        self.outcomes.iter().any(|o| o.outcome.is_simulated())
    }

    /// 转换成 Result：全部成功为 Ok，部分失败为 PartialBatchFailure，
    /// 全部失败返回第一个收款方的错误
    pub fn into_result(self) -> Result<Self, WalletError> {
        if self.all_succeeded() {
            return Ok(self);
        }
        if self.is_partial_failure() {
            return Err(WalletError::PartialBatchFailure {
                failed: self.failed(),
                total: self.outcomes.len(),
            });
        }
        let first = self
            .outcomes
            .into_iter()
            .find_map(|o| o.outcome.error)
            .unwrap_or(WalletError::SubmissionRejected {
                reason: "all recipients failed".to_string(),
            });
        Err(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(index: usize, outcome: TransactionOutcome) -> RecipientOutcome {
        RecipientOutcome {
            index,
            address: format!("0x{}", index + 1),
            amount: Decimal::ONE,
            currency: "APT".into(),
            outcome,
        }
    }

    #[test]
    fn test_partial_failure_is_reported_per_recipient() {
        let report = SubmissionReport {
            kind: IntentKind::BatchPay,
            batch_mode: Some(BatchMode::Sequential),
            outcomes: vec![
                recipient(0, TransactionOutcome::submitted(Some("0xa".into()), None)),
                recipient(
                    1,
                    TransactionOutcome::failed(WalletError::SubmissionRejected {
                        reason: "insufficient balance".into(),
                    }),
                ),
                recipient(2, TransactionOutcome::submitted(Some("0xc".into()), None)),
            ],
        };

        assert!(report.is_partial_failure());
        match report.into_result() {
            Err(WalletError::PartialBatchFailure { failed, total }) => {
                assert_eq!(total, 3);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].index, 1);
                assert_eq!(failed[0].address, "0x2");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_total_failure_returns_first_error() {
        let report = SubmissionReport {
            kind: IntentKind::Send,
            batch_mode: None,
            outcomes: vec![recipient(
                0,
                TransactionOutcome::failed(WalletError::NotConnected),
            )],
        };
        assert!(!report.is_partial_failure());
        assert!(matches!(report.into_result(), Err(WalletError::NotConnected)));
    }

    #[test]
    fn test_simulated_outcome_has_no_hash() {
        let outcome = TransactionOutcome::simulated();
        assert!(outcome.hash.is_none());
        assert!(outcome.is_simulated());
        assert_eq!(outcome.status, OutcomeStatus::Submitted);
    }
}
