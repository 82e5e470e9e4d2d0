//! 钱包适配器
//!
//! 每个钱包家族一个适配器，把各家不同的 connect/sign/submit 接口收敛到
//! `WalletAdapter`。注入式钱包共用 `InjectedAdapter`，差异由 `FamilySpec`
//! 和探测得到的 `ProviderShape` 描述。

pub mod family;
pub mod injected;

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

pub use injected::InjectedAdapter;

use crate::{
    domain::{ProviderKind, SignRequest},
    error::Result,
    infrastructure::ledger_client::LedgerRpc,
    service::provider_detector::ProviderDetector,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectResult {
    pub address: String,
    /// provider 原始返回
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitResult {
    pub hash: Option<String>,
    pub raw: Value,
}

#[async_trait]
pub trait WalletAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn is_available(&self) -> bool;

    async fn connect(&self) -> Result<ConnectResult>;

    /// 尽力而为，错误只记录日志
    async fn disconnect(&self);

    async fn sign_and_submit(&self, request: &SignRequest) -> Result<SubmitResult>;

    /// 只读查询当前账户，不会弹出授权
    async fn current_account(&self) -> Result<Option<String>>;
}

/// 按家族索引的适配器集合
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<ProviderKind, Arc<dyn WalletAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为所有注入式家族注册默认适配器
    pub fn injected(detector: ProviderDetector, ledger: Arc<dyn LedgerRpc>) -> Self {
        let adapters = ProviderKind::ALL
            .into_iter()
            .map(|kind| {
                let adapter: Arc<dyn WalletAdapter> = Arc::new(InjectedAdapter::new(
                    family::family(kind),
                    detector.clone(),
                    ledger.clone(),
                ));
                (kind, adapter)
            })
            .collect();
        Self { adapters }
    }

    /// 注册或替换某个家族的适配器
    pub fn with_adapter(mut self, adapter: Arc<dyn WalletAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn WalletAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    pub fn kinds(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        self.adapters.keys().copied()
    }
}
