//! 统一错误类型
//! 钱包适配层所有对外错误都收敛到 `WalletError`，每种错误对应稳定的错误码和用户提示

use serde::Serialize;
use thiserror::Error;

use crate::domain::ProviderKind;

pub type Result<T> = std::result::Result<T, WalletError>;

/// 批量支付中失败的收款方
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRecipient {
    pub index: usize,
    pub address: String,
    pub reason: String,
}

#[derive(Debug, Clone, Error)]
pub enum WalletError {
    /// 未检测到任何兼容的钱包扩展
    #[error("no compatible wallet provider found{}", .kind.map(|k| format!(" for {}", k)).unwrap_or_default())]
    NoProviderFound { kind: Option<ProviderKind> },

    /// 检测到的 provider 属于不兼容的钱包体系（例如 Ethereum 钱包冒充 Aptos 钱包）
    #[error("wrong wallet type detected for {kind}: {detail}")]
    WrongProviderFamily { kind: ProviderKind, detail: String },

    #[error("wallet not connected")]
    NotConnected,

    #[error("a wallet connection attempt is already in progress")]
    ConnectInProgress,

    #[error("wallet connection was cancelled")]
    ConnectCancelled,

    /// provider 或链拒绝了交易（余额不足、用户拒签、payload 非法）
    #[error("transaction rejected: {reason}")]
    SubmissionRejected { reason: String },

    #[error("{} of {total} batch recipients failed", .failed.len())]
    PartialBatchFailure {
        failed: Vec<FailedRecipient>,
        total: usize,
    },

    #[error("invalid amount: {amount}")]
    InvalidAmount { amount: String },

    #[error("invalid recipient address: {address}")]
    InvalidAddress { address: String },

    #[error("unsupported currency: {currency}")]
    UnsupportedCurrency { currency: String },

    /// provider 存在但没有任何可用的提交路径
    #[error("{kind} provider unavailable: {reason}")]
    ProviderUnavailable { kind: ProviderKind, reason: String },

    /// provider 调用失败或返回了无法解析的结果
    #[error("{kind} provider error: {message}")]
    ProviderResponse { kind: ProviderKind, message: String },

    #[error("ledger rpc error: {0}")]
    Ledger(String),

    /// 账本返回了非 2xx 响应
    #[error("ledger rpc error: status {status}: {message}")]
    LedgerStatus { status: u16, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl WalletError {
    /// 稳定的错误码，供 UI 层做分支和埋点
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoProviderFound { .. } => "no_provider_found",
            Self::WrongProviderFamily { .. } => "wrong_provider_family",
            Self::NotConnected => "not_connected",
            Self::ConnectInProgress => "connect_in_progress",
            Self::ConnectCancelled => "connect_cancelled",
            Self::SubmissionRejected { .. } => "submission_rejected",
            Self::PartialBatchFailure { .. } => "partial_batch_failure",
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::InvalidAddress { .. } => "invalid_address",
            Self::UnsupportedCurrency { .. } => "unsupported_currency",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::ProviderResponse { .. } => "provider_error",
            Self::Ledger(_) | Self::LedgerStatus { .. } => "ledger_error",
            Self::Storage(_) => "storage_error",
            Self::Config(_) => "config_error",
        }
    }

    /// 面向用户的可操作提示
    pub fn user_message(&self) -> String {
        match self {
            Self::NoProviderFound { kind: Some(kind) } => format!(
                "{} wallet not found. Install the {} browser extension and reload the page.",
                kind.display_name(),
                kind.display_name()
            ),
            Self::NoProviderFound { kind: None } => {
                "No Aptos wallet found. Install Petra, Martian or Pontem and reload the page."
                    .to_string()
            }
            Self::WrongProviderFamily { kind, .. } => format!(
                "Wrong wallet type detected. An Ethereum wallet (e.g. MetaMask) answered instead of {}. Please use an Aptos wallet like {}.",
                kind.display_name(),
                kind.display_name()
            ),
            Self::NotConnected => "Connect your wallet before sending a transaction.".to_string(),
            Self::ConnectInProgress => {
                "A wallet connection is already pending. Check your wallet extension.".to_string()
            }
            Self::ConnectCancelled => "Wallet connection was cancelled.".to_string(),
            Self::SubmissionRejected { reason } => {
                format!("The transaction was rejected: {}", reason)
            }
            Self::PartialBatchFailure { failed, total } => {
                let addresses: Vec<&str> = failed.iter().map(|f| f.address.as_str()).collect();
                format!(
                    "{} of {} payments failed: {}",
                    failed.len(),
                    total,
                    addresses.join(", ")
                )
            }
            Self::InvalidAmount { amount } => {
                format!("Amount must be greater than zero (got {}).", amount)
            }
            Self::InvalidAddress { address } => {
                format!("{} is not a valid Aptos account address.", address)
            }
            Self::UnsupportedCurrency { currency } => {
                format!("{} is not supported on this network.", currency)
            }
            Self::ProviderUnavailable { kind, .. } => format!(
                "{} cannot sign this transaction. Update the extension or try another wallet.",
                kind.display_name()
            ),
            Self::ProviderResponse { kind, .. } => format!(
                "{} returned an unexpected response. Please try again.",
                kind.display_name()
            ),
            Self::Ledger(_) | Self::LedgerStatus { .. } => {
                "The Aptos network is temporarily unavailable, please try again later.".to_string()
            }
            Self::Storage(_) => "Local transaction history could not be saved.".to_string(),
            Self::Config(_) => "The application is misconfigured.".to_string(),
        }
    }

    /// 无可用钱包时才允许降级为模拟提交
    pub fn permits_simulation(&self) -> bool {
        matches!(
            self,
            Self::NoProviderFound { .. } | Self::ProviderUnavailable { .. }
        )
    }

    /// 账本拒绝了提交的交易（4xx，限流和超时除外）
    pub fn into_submission_error(self) -> Self {
        match self {
            Self::LedgerStatus { status, message }
                if (400..500).contains(&status) && status != 408 && status != 429 =>
            {
                Self::SubmissionRejected { reason: message }
            }
            other => other,
        }
    }
}

/// 判断 provider 抛出的错误是否来自 Ethereum 体系的钱包
pub fn indicates_foreign_family(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("metamask") || lower.contains("ethereum")
}

/// 判断 provider 错误是否为用户拒签/拒绝
pub fn indicates_user_rejection(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("user rejected")
        || lower.contains("rejected the request")
        || lower.contains("user denied")
        || lower.contains("cancelled")
        || lower.contains("canceled")
        || lower.contains("4001")
}

/// 判断 provider 错误是否表示交易本身被拒（余额不足、payload 非法、Move abort）
pub fn indicates_transaction_rejection(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("insufficient")
        || lower.contains("move abort")
        || lower.contains("invalid payload")
        || lower.contains("invalid transaction")
        || lower.contains("sequence_number_too_old")
        || lower.contains("simulation failed")
        || lower.contains("out of gas")
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("JSON serialization error: {}", err))
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Ledger(format!("request timeout: {}", err));
        }
        Self::Ledger(err.to_string())
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = vec![
            WalletError::NoProviderFound { kind: None },
            WalletError::WrongProviderFamily {
                kind: ProviderKind::Petra,
                detail: "isMetaMask".into(),
            },
            WalletError::NotConnected,
            WalletError::ConnectInProgress,
            WalletError::SubmissionRejected {
                reason: "insufficient balance".into(),
            },
            WalletError::PartialBatchFailure {
                failed: vec![],
                total: 3,
            },
            WalletError::InvalidAmount { amount: "0".into() },
        ];
        let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_foreign_family_detection() {
        assert!(indicates_foreign_family("MetaMask: method not supported"));
        assert!(indicates_foreign_family("ethereum provider error"));
        assert!(!indicates_foreign_family("PetraApiError: user rejected"));
    }

    #[test]
    fn test_partial_batch_message_lists_recipients() {
        let err = WalletError::PartialBatchFailure {
            failed: vec![FailedRecipient {
                index: 1,
                address: "0xb0b".into(),
                reason: "rejected".into(),
            }],
            total: 3,
        };
        assert_eq!(err.to_string(), "1 of 3 batch recipients failed");
        assert!(err.user_message().contains("0xb0b"));
    }

    #[test]
    fn test_ledger_client_errors_become_rejections() {
        let err = WalletError::LedgerStatus {
            status: 400,
            message: "INSUFFICIENT_BALANCE_FOR_TRANSACTION_FEE".into(),
        }
        .into_submission_error();
        assert!(matches!(
            &err,
            WalletError::SubmissionRejected { reason } if reason.contains("INSUFFICIENT_BALANCE")
        ));

        for status in [429, 503] {
            let err = WalletError::LedgerStatus {
                status,
                message: "busy".into(),
            }
            .into_submission_error();
            assert_eq!(err.code(), "ledger_error");
        }
        assert_eq!(
            WalletError::Ledger("connection refused".into())
                .into_submission_error()
                .code(),
            "ledger_error"
        );
    }

    #[test]
    fn test_transaction_rejection_detection() {
        assert!(indicates_transaction_rejection("INSUFFICIENT_BALANCE"));
        assert!(indicates_transaction_rejection("Move abort in 0x1::coin: EINSUFFICIENT_BALANCE(0x10006)"));
        assert!(indicates_transaction_rejection("Invalid payload: missing type argument"));
        assert!(!indicates_transaction_rejection("internal error"));
    }

    #[test]
    fn test_simulation_only_for_missing_wallets() {
        assert!(WalletError::NoProviderFound { kind: None }.permits_simulation());
        assert!(!WalletError::WrongProviderFamily {
            kind: ProviderKind::Martian,
            detail: String::new(),
        }
        .permits_simulation());
        assert!(!WalletError::NotConnected.permits_simulation());
    }
}
