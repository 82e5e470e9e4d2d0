//! 宿主环境抽象
//!
//! 钱包扩展会向宿主（浏览器 window）注入全局对象。这里把"按注入键查找对象"
//! 和"调用对象上的方法"抽象成两个 trait，核心逻辑不直接依赖任何全局命名空间。

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 宿主查找失败
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// 没有宿主（非浏览器环境）
    #[error("host environment unavailable")]
    Unavailable,

    /// 访问注入对象时抛出异常
    #[error("probe failed: {0}")]
    Probe(String),
}

/// 注入对象上的体系标记
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFlags {
    #[serde(default)]
    pub is_meta_mask: bool,
    #[serde(default)]
    pub is_ethereum: bool,
}

impl ProviderFlags {
    pub fn foreign_marker(&self) -> Option<&'static str> {
        if self.is_meta_mask {
            Some("isMetaMask")
        } else if self.is_ethereum {
            Some("isEthereum")
        } else {
            None
        }
    }
}

/// provider 方法抛出的错误
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}{message}", .name.as_ref().map(|n| format!("{}: ", n)).unwrap_or_default())]
pub struct ProviderCallError {
    /// 错误名（如 `PetraApiError`）
    #[serde(default)]
    pub name: Option<String>,
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
}

impl ProviderCallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: None,
            message: message.into(),
            code: None,
        }
    }
}

/// 钱包扩展注入的对象
#[async_trait]
pub trait InjectedProvider: Send + Sync {
    fn flags(&self) -> ProviderFlags;

    /// 对象上是否存在可调用的方法
    fn has_method(&self, name: &str) -> bool;

    /// 读取非函数属性（如 `account`、`address`）
    fn field(&self, name: &str) -> Option<Value>;

    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, ProviderCallError>;
}

/// 宿主环境：按注入键查找全局对象
pub trait HostEnvironment: Send + Sync {
    fn global(&self, key: &str) -> Result<Option<Arc<dyn InjectedProvider>>, HostError>;
}

/// 无宿主环境（服务端、CLI）
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessHost;

impl HostEnvironment for HeadlessHost {
    fn global(&self, _key: &str) -> Result<Option<Arc<dyn InjectedProvider>>, HostError> {
        Err(HostError::Unavailable)
    }
}

/// 预先登记好注入对象的宿主
#[derive(Default, Clone)]
pub struct StaticHost {
    globals: HashMap<String, Arc<dyn InjectedProvider>>,
}

impl StaticHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global(mut self, key: impl Into<String>, provider: Arc<dyn InjectedProvider>) -> Self {
        self.globals.insert(key.into(), provider);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, provider: Arc<dyn InjectedProvider>) {
        self.globals.insert(key.into(), provider);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.globals.keys().map(String::as_str)
    }
}

impl fmt::Debug for StaticHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort();
        f.debug_struct("StaticHost").field("globals", &keys).finish()
    }
}

impl HostEnvironment for StaticHost {
    fn global(&self, key: &str) -> Result<Option<Arc<dyn InjectedProvider>>, HostError> {
        Ok(self.globals.get(key).cloned())
    }
}
