//! 脚本化的注入 provider
//!
//! 按 JSON 脚本应答方法调用并记录每次调用，用于演示程序和测试。
//! 每个方法对应一个应答队列，依次消费，队列只剩最后一条时重复使用。
//!
//! 脚本格式：
//! ```json
//! {
//!   "aptos": {
//!     "isMetaMask": false,
//!     "fields": { "account": { "address": "0x1" } },
//!     "methods": {
//!       "connect": [{ "error": { "message": "User rejected the request", "code": 4001 } },
//!                   { "ok": { "address": "0x1" } }],
//!       "signAndSubmitTransaction": [{ "ok": { "hash": "0xabc" } }]
//!     }
//!   }
//! }
//! ```

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;

use crate::{
    error::{Result, WalletError},
    infrastructure::host::{InjectedProvider, ProviderCallError, ProviderFlags, StaticHost},
};

/// 单次应答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptedResponse {
    Ok(Value),
    Error(ProviderCallError),
}

/// 一个注入对象的脚本
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderScript {
    #[serde(flatten)]
    pub flags: ProviderFlags,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default)]
    pub methods: BTreeMap<String, Vec<ScriptedResponse>>,
}

/// 记录下来的一次调用
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub args: Vec<Value>,
}

pub struct ScriptedProvider {
    flags: ProviderFlags,
    fields: BTreeMap<String, Value>,
    responses: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::from_script(ProviderScript::default())
    }

    pub fn from_script(script: ProviderScript) -> Self {
        Self {
            flags: script.flags,
            fields: script.fields,
            responses: Mutex::new(
                script
                    .methods
                    .into_iter()
                    .map(|(name, queue)| (name, queue.into()))
                    .collect(),
            ),
            gates: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_flags(mut self, flags: ProviderFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// 追加一条成功应答
    pub fn respond_ok(self, method: &str, value: Value) -> Self {
        self.push(method, ScriptedResponse::Ok(value));
        self
    }

    /// 追加一条失败应答
    pub fn respond_err(self, method: &str, message: &str) -> Self {
        self.push(method, ScriptedResponse::Error(ProviderCallError::new(message)));
        self
    }

    /// 调用该方法时先等待 `gate` 被通知
    pub fn with_gate(self, method: &str, gate: Arc<Notify>) -> Self {
        lock(&self.gates).insert(method.to_string(), gate);
        self
    }

    pub fn push(&self, method: &str, response: ScriptedResponse) {
        lock(&self.responses)
            .entry(method.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    fn next_response(&self, method: &str) -> ScriptedResponse {
        let mut responses = lock(&self.responses);
        match responses.get_mut(method) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or(ScriptedResponse::Ok(Value::Null)),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or(ScriptedResponse::Ok(Value::Null)),
            None => ScriptedResponse::Error(ProviderCallError::new(format!(
                "{} is not a function",
                method
            ))),
        }
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// 锁中毒时继续使用内部数据
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl InjectedProvider for ScriptedProvider {
    fn flags(&self) -> ProviderFlags {
        self.flags
    }

    fn has_method(&self, name: &str) -> bool {
        lock(&self.responses).contains_key(name)
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    async fn invoke(&self, method: &str, args: Vec<Value>) -> std::result::Result<Value, ProviderCallError> {
        lock(&self.calls).push(RecordedCall {
            method: method.to_string(),
            args,
        });

        let gate = lock(&self.gates).get(method).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match self.next_response(method) {
            ScriptedResponse::Ok(value) => Ok(value),
            ScriptedResponse::Error(err) => Err(err),
        }
    }
}

/// 从脚本构建宿主环境：顶层键即注入键
pub fn host_from_json(json: &str) -> Result<StaticHost> {
    let scripts: BTreeMap<String, ProviderScript> = serde_json::from_str(json)
        .map_err(|e| WalletError::Config(format!("invalid provider fixture: {}", e)))?;

    let mut host = StaticHost::new();
    for (key, script) in scripts {
        tracing::debug!(key = %key, methods = script.methods.len(), "scripted provider registered");
        host.insert(key, Arc::new(ScriptedProvider::from_script(script)));
    }
    Ok(host)
}

pub async fn host_from_file(path: impl AsRef<Path>) -> Result<StaticHost> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;
    host_from_json(&content)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::infrastructure::host::HostEnvironment;

    #[tokio::test]
    async fn test_responses_are_consumed_in_order() {
        let provider = ScriptedProvider::new()
            .respond_err("connect", "User rejected the request")
            .respond_ok("connect", json!({ "address": "0x1" }));

        assert!(provider.invoke("connect", vec![]).await.is_err());
        let ok = provider
            .invoke("connect", vec![json!({ "silently": true })])
            .await
            .unwrap();
        assert_eq!(ok["address"], "0x1");
        // 最后一条重复使用
        assert!(provider.invoke("connect", vec![]).await.is_ok());
        assert_eq!(provider.calls_to("connect").len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_method_errors() {
        let provider = ScriptedProvider::new();
        assert!(!provider.has_method("connect"));
        let err = provider.invoke("connect", vec![]).await.unwrap_err();
        assert!(err.message.contains("not a function"));
    }

    #[test]
    fn test_host_from_json() {
        let host = host_from_json(
            r#"{
                "aptos": {
                    "methods": { "connect": [{ "ok": { "address": "0x1" } }] }
                },
                "martian": { "isMetaMask": true, "methods": { "request": [] } }
            }"#,
        )
        .unwrap();

        let petra = host.global("aptos").unwrap().unwrap();
        assert!(petra.has_method("connect"));
        let martian = host.global("martian").unwrap().unwrap();
        assert!(martian.flags().is_meta_mask);
        assert!(host.global("pontem").unwrap().is_none());
    }
}
