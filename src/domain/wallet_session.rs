//! 钱包会话模型
//!
//! `WalletSession` 是对外暴露的只读快照；连接状态由 SessionStore 的状态机维护，
//! 快照本身通过构造函数保证 `is_connected` 与 address/provider_kind 一致。

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// 支持的钱包家族（闭集）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Petra,
    Martian,
    Pontem,
}

impl ProviderKind {
    /// 自动选择时的优先级顺序
    pub const ALL: [ProviderKind; 3] = [Self::Petra, Self::Martian, Self::Pontem];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Petra => "petra",
            Self::Martian => "martian",
            Self::Pontem => "pontem",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Petra => "Petra",
            Self::Martian => "Martian",
            Self::Pontem => "Pontem",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "petra" | "aptos" => Ok(Self::Petra),
            "martian" => Ok(Self::Martian),
            "pontem" => Ok(Self::Pontem),
            other => Err(WalletError::Config(format!(
                "unknown wallet provider: {}",
                other
            ))),
        }
    }
}

/// 目标账本网络
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Devnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
        }
    }

    /// 官方全节点 REST 地址
    pub fn default_node_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://fullnode.mainnet.aptoslabs.com/v1",
            Self::Testnet => "https://fullnode.testnet.aptoslabs.com/v1",
            Self::Devnet => "https://fullnode.devnet.aptoslabs.com/v1",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "devnet" => Ok(Self::Devnet),
            other => Err(WalletError::Config(format!("unknown network: {}", other))),
        }
    }
}

/// 当前钱包会话快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSession {
    address: Option<String>,
    provider_kind: Option<ProviderKind>,
    network: Network,
    is_connected: bool,
}

impl WalletSession {
    pub fn disconnected(network: Network) -> Self {
        Self {
            address: None,
            provider_kind: None,
            network,
            is_connected: false,
        }
    }

    pub fn connected(address: impl Into<String>, kind: ProviderKind, network: Network) -> Self {
        Self {
            address: Some(address.into()),
            provider_kind: Some(kind),
            network,
            is_connected: true,
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn provider_kind(&self) -> Option<ProviderKind> {
        self.provider_kind
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// 仅持久化身份信息，连接状态永远在加载时重新校验
    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            address: self.address.clone(),
            provider_kind: self.provider_kind,
            network: self.network,
        }
    }
}

/// 跨页面刷新保留的会话元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub address: Option<String>,
    pub provider_kind: Option<ProviderKind>,
    #[serde(default)]
    pub network: Network,
}

/// SessionStore 状态机的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Disconnected,
    Connecting,
    Connected,
}
