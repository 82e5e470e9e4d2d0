//! 钱包适配与交易提交服务

pub mod adapters;
pub mod balance_service;
pub mod history_reconciler;
pub mod payload_builder;
pub mod provider_detector;
pub mod session_store;
pub mod transaction_log;
pub mod transaction_submitter;

pub use adapters::{AdapterRegistry, WalletAdapter};
pub use balance_service::{BalanceService, CoinBalance};
pub use history_reconciler::{reconcile, HistoryService};
pub use provider_detector::{Classification, ProviderDetector};
pub use session_store::SessionStore;
pub use transaction_log::LocalTransactionLog;
pub use transaction_submitter::TransactionSubmitter;
