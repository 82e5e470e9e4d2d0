//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{collections::BTreeMap, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{currency::APTOS_COIN, Network, ProviderKind},
    utils::address_validator::AddressValidator,
};

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 账本 RPC 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub network: Network,
    /// 不设置时使用网络对应的官方全节点
    pub node_url: Option<String>,
    pub request_timeout_secs: u64,
    /// 提交后是否等待上链结果
    pub wait_for_confirmation: bool,
    pub wait_timeout_secs: u64,
}

/// 合约模块配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    /// GlobePayXCore 部署地址
    pub core_address: String,
    /// GlobePayXBusiness 部署地址
    pub business_address: String,
    /// 同币种批量代发走单次 batch_pay 调用
    pub batch_pay_enabled: bool,
    /// 币种符号 → 链上 coin type
    pub coin_types: BTreeMap<String, String>,
}

/// 钱包交互配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// 自动连接时优先使用的钱包
    pub preferred_provider: Option<ProviderKind>,
    /// 没有可用钱包时允许模拟提交
    pub allow_simulation: bool,
    /// 本地交易日志保留条数
    pub history_limit: usize,
    /// 链上历史查询条数
    pub history_fetch_limit: usize,
    /// 本地持久化目录，不设置时仅保存在内存
    pub data_dir: Option<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// `USDC=0xabc::usdc::USDC,USDT=0xdef::usdt::USDT`
fn parse_coin_types(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (symbol, coin_type) = pair.split_once('=')?;
            let symbol = symbol.trim().to_uppercase();
            let coin_type = coin_type.trim();
            (!symbol.is_empty() && !coin_type.is_empty())
                .then(|| (symbol, coin_type.to_string()))
        })
        .collect()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            network: env_parse("APTOS_NETWORK", Network::Testnet),
            node_url: std::env::var("APTOS_NODE_URL").ok(),
            request_timeout_secs: env_parse("LEDGER_TIMEOUT_SECS", 30),
            wait_for_confirmation: env_flag("LEDGER_WAIT_FOR_CONFIRMATION", true),
            wait_timeout_secs: env_parse("LEDGER_WAIT_TIMEOUT_SECS", 30),
        }
    }
}

impl LedgerConfig {
    pub fn node_url(&self) -> &str {
        self.node_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_node_url())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

impl Default for ContractsConfig {
    fn default() -> Self {
        let mut coin_types = BTreeMap::from([("APT".to_string(), APTOS_COIN.to_string())]);
        if let Ok(raw) = std::env::var("GLOBE_COIN_TYPES") {
            coin_types.extend(parse_coin_types(&raw));
        }

        Self {
            core_address: std::env::var("GLOBE_CORE_ADDRESS").unwrap_or_else(|_| "0x1".into()),
            business_address: std::env::var("GLOBE_BUSINESS_ADDRESS")
                .unwrap_or_else(|_| "0x1".into()),
            batch_pay_enabled: env_flag("BATCH_PAY_ENABLED", true),
            coin_types,
        }
    }
}

impl ContractsConfig {
    pub fn coin_type(&self, symbol: &str) -> Option<&str> {
        self.coin_types
            .get(&crate::domain::currency::normalize_symbol(symbol))
            .map(String::as_str)
    }

    pub fn core_module(&self) -> String {
        format!("{}::GlobePayXCore", self.core_address)
    }

    pub fn business_module(&self) -> String {
        format!("{}::GlobePayXBusiness", self.business_address)
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            preferred_provider: std::env::var("WALLET_PREFERRED_PROVIDER")
                .ok()
                .and_then(|s| s.parse().ok()),
            allow_simulation: env_flag("WALLET_ALLOW_SIMULATION", false),
            history_limit: env_parse("HISTORY_LIMIT", 100),
            history_fetch_limit: env_parse("HISTORY_FETCH_LIMIT", 50),
            data_dir: std::env::var("WALLET_DATA_DIR").ok(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            enable_file_logging: env_flag("LOG_FILE_ENABLED", false),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            ledger: LedgerConfig::default(),
            contracts: ContractsConfig::default(),
            wallet: WalletConfig::default(),
            logging: LoggingConfig::default(),
        })
    }

    /// 从配置文件加载配置，文件中缺失的段落取环境变量默认值
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) if path.as_ref().exists() => Self::from_file(path),
            _ => Self::from_env(),
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        let node_url = self.ledger.node_url();
        if !node_url.starts_with("http://") && !node_url.starts_with("https://") {
            anyhow::bail!("APTOS_NODE_URL must start with http:// or https://");
        }

        if self.ledger.request_timeout_secs == 0 {
            anyhow::bail!("LEDGER_TIMEOUT_SECS must be greater than 0");
        }

        for (name, address) in [
            ("GLOBE_CORE_ADDRESS", &self.contracts.core_address),
            ("GLOBE_BUSINESS_ADDRESS", &self.contracts.business_address),
        ] {
            if AddressValidator::validate(address).is_err() {
                anyhow::bail!("{} is not a valid Aptos address: {}", name, address);
            }
        }

        if self.contracts.coin_type("APT").is_none() {
            anyhow::bail!("coin type for APT must be configured");
        }

        if self.wallet.history_limit == 0 {
            anyhow::bail!("HISTORY_LIMIT must be greater than 0");
        }

        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        Ok(())
    }
}
