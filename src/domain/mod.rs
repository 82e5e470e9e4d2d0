//! Domain 模块
//!
//! 钱包会话、交易意图、提交结果与历史记录等领域模型

pub mod currency;
pub mod transaction_intent;
pub mod transaction_outcome;
pub mod transaction_payload;
pub mod transaction_record;
pub mod transaction_status;
pub mod wallet_session;

// 重新导出常用类型
pub use transaction_intent::{IntentKind, Recipient, SwapTerms, TransactionIntent};
pub use transaction_outcome::{
    BatchMode, OutcomeSource, OutcomeStatus, RecipientOutcome, SubmissionReport,
    TransactionOutcome,
};
pub use transaction_payload::{EntryFunctionPayload, SignRequest};
pub use transaction_record::{RecordType, TransactionRecord};
pub use transaction_status::TransactionStatus;
pub use wallet_session::{Network, PersistedSession, ProviderKind, SessionPhase, WalletSession};
