use std::sync::Arc;

use anyhow::Context;

use crate::{
    config::Config,
    infrastructure::{
        host::HostEnvironment,
        kv_store::{FileKvStore, KvStore, MemoryKvStore},
        ledger_client::{AptosRestClient, LedgerRpc},
    },
    service::{
        adapters::AdapterRegistry, balance_service::BalanceService,
        history_reconciler::HistoryService,
        provider_detector::ProviderDetector, session_store::SessionStore,
        transaction_log::LocalTransactionLog, transaction_submitter::TransactionSubmitter,
    },
};

/// 应用状态
/// 持有会话、提交和历史服务共享的组件
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ledger: Arc<dyn LedgerRpc>,
    pub kv: Arc<dyn KvStore>,
    pub detector: ProviderDetector,
    pub sessions: Arc<SessionStore>,
    pub log: Arc<LocalTransactionLog>,
    pub submitter: Arc<TransactionSubmitter>,
    pub history: Arc<HistoryService>,
    pub balances: Arc<BalanceService>,
}

impl AppState {
    /// 用给定的宿主、存储和账本客户端组装
    pub fn new(
        config: Config,
        host: Arc<dyn HostEnvironment>,
        kv: Arc<dyn KvStore>,
        ledger: Arc<dyn LedgerRpc>,
    ) -> Self {
        let detector = ProviderDetector::new(host);
        let registry = AdapterRegistry::injected(detector.clone(), ledger.clone());
        Self::with_registry(config, detector, registry, kv, ledger)
    }

    /// 使用自定义适配器集合组装
    pub fn with_registry(
        config: Config,
        detector: ProviderDetector,
        registry: AdapterRegistry,
        kv: Arc<dyn KvStore>,
        ledger: Arc<dyn LedgerRpc>,
    ) -> Self {
        let config = Arc::new(config);
        let sessions = Arc::new(
            SessionStore::new(
                detector.clone(),
                registry,
                kv.clone(),
                config.ledger.network,
            )
            .with_preferred(config.wallet.preferred_provider),
        );
        let log = Arc::new(LocalTransactionLog::new(
            kv.clone(),
            config.wallet.history_limit,
        ));
        let submitter = Arc::new(TransactionSubmitter::new(
            sessions.clone(),
            ledger.clone(),
            log.clone(),
            &config,
        ));
        let history = Arc::new(
            HistoryService::new(ledger.clone(), log.clone(), config.wallet.history_fetch_limit)
                .with_coin_types(&config.contracts.coin_types),
        );
        let balances = Arc::new(BalanceService::new(
            ledger.clone(),
            &config.contracts.coin_types,
        ));

        Self {
            config,
            ledger,
            kv,
            detector,
            sessions,
            log,
            submitter,
            history,
            balances,
        }
    }

    /// 按配置创建账本客户端和本地存储
    pub async fn from_config(config: Config, host: Arc<dyn HostEnvironment>) -> anyhow::Result<Self> {
        let ledger: Arc<dyn LedgerRpc> = Arc::new(
            AptosRestClient::new(
                config.ledger.node_url(),
                config.ledger.request_timeout(),
                config.ledger.wait_timeout(),
            )
            .context("failed to create ledger client")?,
        );

        let kv: Arc<dyn KvStore> = match &config.wallet.data_dir {
            Some(dir) => Arc::new(
                FileKvStore::open(dir)
                    .await
                    .with_context(|| format!("failed to open data dir {}", dir))?,
            ),
            None => Arc::new(MemoryKvStore::new()),
        };

        tracing::info!(
            node_url = %config.ledger.node_url(),
            network = %config.ledger.network,
            persistent = config.wallet.data_dir.is_some(),
            "application state initialized"
        );
        Ok(Self::new(config, host, kv, ledger))
    }
}
