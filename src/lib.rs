//! GlobePayX - Aptos 浏览器钱包适配层
//!
//! 探测注入的钱包扩展，维护会话，提交支付交易并合并链上与本地历史

pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod metrics;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{Result, WalletError};

pub mod prelude {
    pub use crate::{
        app_state::AppState,
        config::Config,
        domain::{
            Network, ProviderKind, Recipient, SubmissionReport, TransactionIntent,
            TransactionRecord, WalletSession,
        },
        error::{Result, WalletError},
        service::{HistoryService, SessionStore, TransactionSubmitter},
    };
}
