//! 测试辅助模块
//! 提供脚本化钱包、记录调用的账本和组装好的应用状态

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use globepayx::{
    config::{Config, ContractsConfig, LedgerConfig, WalletConfig},
    domain::{
        currency::APTOS_COIN, EntryFunctionPayload, ProviderKind, SignRequest,
    },
    error::{Result, WalletError},
    infrastructure::{
        host::{HostEnvironment, StaticHost},
        kv_store::{KvStore, MemoryKvStore},
        ledger_client::{LedgerRpc, LedgerTransaction, LedgerTransactionStatus},
        scripted_provider::ScriptedProvider,
    },
    service::{
        adapters::{AdapterRegistry, ConnectResult, SubmitResult, WalletAdapter},
        provider_detector::ProviderDetector,
    },
    AppState,
};
use serde_json::{json, Value};

pub const OWNER: &str = "0xa11ce";
pub const BOB: &str = "0xb0b";
pub const CAROL: &str = "0xca401";
pub const DAVE: &str = "0xda7e";
pub const USDC_COIN: &str = "0xcafe::usdc::USDC";

/// 测试配置：不等待确认、不允许模拟，登记 APT 和 USDC
pub fn test_config() -> Config {
    Config {
        ledger: LedgerConfig {
            node_url: Some("http://127.0.0.1:1".into()),
            wait_for_confirmation: false,
            ..LedgerConfig::default()
        },
        contracts: ContractsConfig {
            core_address: "0xcafe".into(),
            business_address: "0xbeef".into(),
            batch_pay_enabled: true,
            coin_types: BTreeMap::from([
                ("APT".to_string(), APTOS_COIN.to_string()),
                ("USDC".to_string(), USDC_COIN.to_string()),
            ]),
        },
        wallet: WalletConfig {
            preferred_provider: None,
            allow_simulation: false,
            history_limit: 100,
            history_fetch_limit: 50,
            data_dir: None,
        },
        ..Config::default()
    }
}

/// 会连接到 `address` 并对提交返回递增哈希的 Petra
pub fn petra(address: &str) -> ScriptedProvider {
    ScriptedProvider::new()
        .respond_ok("connect", json!({ "address": address }))
        .respond_ok("account", json!({ "address": address }))
        .respond_ok("disconnect", Value::Null)
        .respond_ok("signAndSubmitTransaction", json!({ "hash": "0xh1" }))
}

/// 只暴露 Ethereum 风格 `request` 的对象
pub fn ethereum_only() -> ScriptedProvider {
    ScriptedProvider::new().respond_ok("request", json!(["0xdeadbeef"]))
}

pub fn host_with(entries: Vec<(&str, Arc<ScriptedProvider>)>) -> Arc<StaticHost> {
    let mut host = StaticHost::new();
    for (key, provider) in entries {
        host.insert(key, provider);
    }
    Arc::new(host)
}

/// 记录调用的账本，不访问网络
#[derive(Default)]
pub struct RecordingLedger {
    calls: Mutex<Vec<String>>,
    pub history: Mutex<Vec<LedgerTransaction>>,
    pub fail_history: Mutex<bool>,
    pub confirm_success: Mutex<bool>,
    /// coin type → 最小单位余额
    pub balances: Mutex<HashMap<String, u64>>,
    pub fail_balance_for: Mutex<Option<String>>,
    /// 设置后 submit_signed_transaction 返回该错误
    pub submit_error: Mutex<Option<WalletError>>,
}

impl RecordingLedger {
    pub fn new() -> Self {
        Self {
            confirm_success: Mutex::new(true),
            ..Self::default()
        }
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn set_history(&self, txs: Vec<LedgerTransaction>) {
        *self.history.lock().unwrap() = txs;
    }
}

#[async_trait]
impl LedgerRpc for RecordingLedger {
    async fn account_balance(&self, _address: &str, coin_type: &str) -> Result<u64> {
        self.record("account_balance");
        if self.fail_balance_for.lock().unwrap().as_deref() == Some(coin_type) {
            return Err(WalletError::Ledger("connection reset".into()));
        }
        Ok(self.balances.lock().unwrap().get(coin_type).copied().unwrap_or(0))
    }

    async fn build_transaction(&self, sender: &str, payload: &EntryFunctionPayload) -> Result<Value> {
        self.record("build_transaction");
        Ok(json!({ "sender": sender, "payload": payload.to_value(), "sequence_number": "0" }))
    }

    async fn submit_signed_transaction(&self, _signed: &Value) -> Result<String> {
        self.record("submit_signed_transaction");
        if let Some(err) = self.submit_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok("0xledger".to_string())
    }

    async fn wait_for_transaction(&self, hash: &str) -> Result<LedgerTransactionStatus> {
        self.record("wait_for_transaction");
        let success = *self.confirm_success.lock().unwrap();
        Ok(LedgerTransactionStatus {
            hash: hash.to_string(),
            success,
            vm_status: if success {
                "Executed successfully".into()
            } else {
                "Move abort: EINSUFFICIENT_BALANCE".into()
            },
        })
    }

    async fn account_transactions(&self, _address: &str, _limit: usize) -> Result<Vec<LedgerTransaction>> {
        self.record("account_transactions");
        if *self.fail_history.lock().unwrap() {
            return Err(WalletError::Ledger("connection refused".into()));
        }
        Ok(self.history.lock().unwrap().clone())
    }
}

/// 记录调用次数的适配器，connect 总是成功
pub struct SpyAdapter {
    kind: ProviderKind,
    address: String,
    pub connects: AtomicUsize,
    pub submits: AtomicUsize,
    pub requests: Mutex<Vec<SignRequest>>,
}

impl SpyAdapter {
    pub fn new(kind: ProviderKind, address: &str) -> Self {
        Self {
            kind,
            address: address.to_string(),
            connects: AtomicUsize::new(0),
            submits: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst) + self.submits.load(Ordering::SeqCst)
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletAdapter for SpyAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn connect(&self) -> Result<ConnectResult> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(ConnectResult {
            address: self.address.clone(),
            raw: json!({ "address": self.address }),
        })
    }

    async fn disconnect(&self) {}

    async fn sign_and_submit(&self, request: &SignRequest) -> Result<SubmitResult> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());
        Ok(SubmitResult {
            hash: Some(format!("0xspy{}", n)),
            raw: Value::Null,
        })
    }

    async fn current_account(&self) -> Result<Option<String>> {
        Ok(Some(self.address.clone()))
    }
}

/// 注入式适配器 + 给定宿主
pub fn app_with_host(host: Arc<dyn HostEnvironment>, config: Config) -> (AppState, Arc<RecordingLedger>) {
    app_with_host_and_kv(host, config, Arc::new(MemoryKvStore::new()))
}

pub fn app_with_host_and_kv(
    host: Arc<dyn HostEnvironment>,
    config: Config,
    kv: Arc<dyn KvStore>,
) -> (AppState, Arc<RecordingLedger>) {
    let ledger = Arc::new(RecordingLedger::new());
    let state = AppState::new(config, host, kv, ledger.clone());
    (state, ledger)
}

/// 用 SpyAdapter 替换 Petra 适配器
pub fn app_with_spy(config: Config) -> (AppState, Arc<SpyAdapter>, Arc<RecordingLedger>) {
    let ledger = Arc::new(RecordingLedger::new());
    let host: Arc<dyn HostEnvironment> = Arc::new(StaticHost::new());
    let detector = ProviderDetector::new(host);
    let spy = Arc::new(SpyAdapter::new(ProviderKind::Petra, OWNER));
    let registry = AdapterRegistry::new().with_adapter(spy.clone());
    let state = AppState::with_registry(
        config,
        detector,
        registry,
        Arc::new(MemoryKvStore::new()),
        ledger.clone(),
    );
    (state, spy, ledger)
}
