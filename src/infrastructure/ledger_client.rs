// Aptos 全节点 REST 客户端
// 账户资源/余额查询、未签名交易构建、已签名交易提交、等待上链、账户交易历史

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::EntryFunctionPayload,
    error::{Result, WalletError},
};

/// 默认最大 gas
pub const DEFAULT_MAX_GAS_AMOUNT: u64 = 200_000;
/// 交易过期时间（秒）
pub const DEFAULT_EXPIRATION_SECS: i64 = 600;

const BCS_SIGNED_TRANSACTION: &str = "application/x.aptos.signed_transaction+bcs";
const WAIT_POLL_INTERVAL_MS: u64 = 1000;

/// 账户资源
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub data: Value,
}

/// 链上执行结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransactionStatus {
    pub hash: String,
    pub success: bool,
    pub vm_status: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LedgerPayload {
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub type_arguments: Vec<String>,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

/// 账户交易历史中的一条（只保留用得到的字段）
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LedgerTransaction {
    #[serde(default)]
    pub version: Option<String>,
    pub hash: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub vm_status: Option<String>,
    /// 微秒时间戳（十进制字符串）
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub gas_used: Option<String>,
    #[serde(default)]
    pub payload: Option<LedgerPayload>,
}

impl LedgerTransaction {
    pub fn timestamp_micros(&self) -> Option<i64> {
        self.timestamp.as_deref()?.parse().ok()
    }

    pub fn gas_used(&self) -> u64 {
        self.gas_used
            .as_deref()
            .and_then(|g| g.parse().ok())
            .unwrap_or(0)
    }

    pub fn function(&self) -> &str {
        self.payload
            .as_ref()
            .and_then(|p| p.function.as_deref())
            .unwrap_or("")
    }

    pub fn argument(&self, index: usize) -> Option<&Value> {
        self.payload.as_ref()?.arguments.get(index)
    }
}

/// 远程账本 RPC
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// CoinStore 余额（最小单位），账户未注册该币种时为 0
    async fn account_balance(&self, address: &str, coin_type: &str) -> Result<u64>;

    /// 构建未签名交易（JSON 形态），交给钱包签名
    async fn build_transaction(&self, sender: &str, payload: &EntryFunctionPayload)
        -> Result<Value>;

    /// 提交已签名交易，返回交易哈希
    async fn submit_signed_transaction(&self, signed: &Value) -> Result<String>;

    async fn wait_for_transaction(&self, hash: &str) -> Result<LedgerTransactionStatus>;

    async fn account_transactions(&self, address: &str, limit: usize)
        -> Result<Vec<LedgerTransaction>>;
}

pub struct AptosRestClient {
    http_client: reqwest::Client,
    base_url: String,
    wait_timeout: Duration,
}

impl AptosRestClient {
    pub fn new(base_url: &str, request_timeout: Duration, wait_timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            wait_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let started = std::time::Instant::now();
        let result = match self.http_client.get(self.url(path)).send().await {
            Ok(response) => Self::read_json(response).await,
            Err(e) => Err(e.into()),
        };
        crate::metrics::observe_ledger_latency_ms(started.elapsed().as_millis(), result.is_ok());
        result
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Self::status_error(status.as_u16(), body));
        }

        serde_json::from_str(&body)
            .map_err(|e| WalletError::Ledger(format!("invalid JSON response: {}", e)))
    }

    /// 非 2xx 响应 → `LedgerStatus`，优先取响应体里的 `message`
    fn status_error(status: u16, body: String) -> WalletError {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or(body);
        WalletError::LedgerStatus { status, message }
    }

    async fn read_resource(&self, address: &str, resource_type: &str) -> Result<AccountResource> {
        let value = self
            .get_json(&format!("/accounts/{}/resource/{}", address, resource_type))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    fn field_u64(value: &Value, field: &str) -> Result<u64> {
        match value.get(field) {
            Some(Value::String(s)) => s.parse().ok(),
            Some(Value::Number(n)) => n.as_u64(),
            _ => None,
        }
        .ok_or_else(|| WalletError::Ledger(format!("missing or invalid field: {}", field)))
    }

    async fn chain_id(&self) -> Result<u64> {
        let info = self.get_json("/").await?;
        Self::field_u64(&info, "chain_id")
    }

    async fn fetch_by_hash(&self, hash: &str) -> Result<Value> {
        self.get_json(&format!("/transactions/by_hash/{}", hash)).await
    }

    fn to_status(hash: &str, tx: &Value) -> Option<LedgerTransactionStatus> {
        if tx.get("type").and_then(|t| t.as_str()) == Some("pending_transaction") {
            return None;
        }
        Some(LedgerTransactionStatus {
            hash: hash.to_string(),
            success: tx.get("success").and_then(|s| s.as_bool()).unwrap_or(false),
            vm_status: tx
                .get("vm_status")
                .and_then(|s| s.as_str())
                .unwrap_or_default()
                .to_string(),
        })
    }
}

#[async_trait]
impl LedgerRpc for AptosRestClient {
    async fn account_balance(&self, address: &str, coin_type: &str) -> Result<u64> {
        let resource_type = format!("0x1::coin::CoinStore<{}>", coin_type);
        match self.read_resource(address, &resource_type).await {
            Ok(resource) => {
                let value = resource
                    .data
                    .get("coin")
                    .map(|coin| Self::field_u64(coin, "value"))
                    .transpose()?
                    .unwrap_or(0);
                Ok(value)
            }
            Err(WalletError::LedgerStatus { status: 404, .. }) => {
                tracing::debug!(address = %address, coin_type = %coin_type, "coin store not registered");
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    async fn build_transaction(
        &self,
        sender: &str,
        payload: &EntryFunctionPayload,
    ) -> Result<Value> {
        let account = self.get_json(&format!("/accounts/{}", sender)).await?;
        let sequence_number = Self::field_u64(&account, "sequence_number")?;
        let gas = self.get_json("/estimate_gas_price").await?;
        let gas_unit_price = Self::field_u64(&gas, "gas_estimate")?;
        let chain_id = self.chain_id().await?;
        let expiration = chrono::Utc::now().timestamp() + DEFAULT_EXPIRATION_SECS;

        tracing::debug!(
            sender = %sender,
            sequence_number = sequence_number,
            gas_unit_price = gas_unit_price,
            function = %payload.function,
            "built unsigned transaction"
        );

        Ok(serde_json::json!({
            "sender": sender,
            "sequence_number": sequence_number.to_string(),
            "max_gas_amount": DEFAULT_MAX_GAS_AMOUNT.to_string(),
            "gas_unit_price": gas_unit_price.to_string(),
            "expiration_timestamp_secs": expiration.to_string(),
            "chain_id": chain_id,
            "payload": payload.to_value(),
        }))
    }

    async fn submit_signed_transaction(&self, signed: &Value) -> Result<String> {
        let request = self.http_client.post(self.url("/transactions"));

        // 钱包可能返回 BCS 字节（数组或 hex 字符串），也可能返回 JSON 形态
        let request = match signed {
            Value::Array(items) => {
                let bytes = items
                    .iter()
                    .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect::<Option<Vec<u8>>>()
                    .ok_or_else(|| {
                        WalletError::Ledger("signed transaction is not a byte array".into())
                    })?;
                request
                    .header("Content-Type", BCS_SIGNED_TRANSACTION)
                    .body(bytes)
            }
            Value::String(encoded) => {
                let bytes = hex::decode(encoded.trim_start_matches("0x")).map_err(|e| {
                    WalletError::Ledger(format!("invalid signed transaction hex: {}", e))
                })?;
                request
                    .header("Content-Type", BCS_SIGNED_TRANSACTION)
                    .body(bytes)
            }
            other => request.json(other),
        };

        let started = std::time::Instant::now();
        let result = match request.send().await {
            Ok(response) => Self::read_json(response).await,
            Err(e) => Err(e.into()),
        };
        crate::metrics::observe_ledger_latency_ms(started.elapsed().as_millis(), result.is_ok());
        // 4xx 表示交易本身被拒（余额不足、payload 非法、序号过期）
        let json = result.map_err(WalletError::into_submission_error)?;
        let hash = json
            .get("hash")
            .and_then(|h| h.as_str())
            .ok_or_else(|| WalletError::Ledger("missing hash in submit response".into()))?;

        tracing::info!(tx_hash = %hash, "signed transaction submitted to ledger");
        Ok(hash.to_string())
    }

    async fn wait_for_transaction(&self, hash: &str) -> Result<LedgerTransactionStatus> {
        let started = std::time::Instant::now();
        let first = self
            .get_json(&format!("/transactions/wait_by_hash/{}", hash))
            .await?;
        if let Some(status) = Self::to_status(hash, &first) {
            return Ok(status);
        }

        // wait_by_hash 只做短时长轮询，之后自行轮询
        while started.elapsed() < self.wait_timeout {
            tokio::time::sleep(Duration::from_millis(WAIT_POLL_INTERVAL_MS)).await;
            let tx = self.fetch_by_hash(hash).await?;
            if let Some(status) = Self::to_status(hash, &tx) {
                return Ok(status);
            }
        }

        Err(WalletError::Ledger(format!(
            "transaction {} still pending after {}s",
            hash,
            self.wait_timeout.as_secs()
        )))
    }

    async fn account_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<LedgerTransaction>> {
        let value = self
            .get_json(&format!("/accounts/{}/transactions?limit={}", address, limit))
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}
