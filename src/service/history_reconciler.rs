//! 交易历史合并
//!
//! 链上记录与本地日志按哈希（无哈希时按 id）去重，链上副本优先，
//! 按时间倒序排列，时间相同时保持插入顺序（链上在前）。

use std::{collections::{BTreeMap, HashSet}, sync::Arc};

use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    domain::{
        currency::{decimals_for, from_minor_units},
        RecordType, TransactionRecord, TransactionStatus,
    },
    error::Result,
    infrastructure::ledger_client::{LedgerRpc, LedgerTransaction},
    service::transaction_log::LocalTransactionLog,
    utils::time_utils::from_ledger_micros,
};

/// 链上记录无法识别币种时的默认币种
pub const DEFAULT_HISTORY_CURRENCY: &str = "USDC";
pub const DEFAULT_FETCH_LIMIT: usize = 50;

/// 合并链上和本地记录（纯函数）
pub fn reconcile(remote: &[TransactionRecord], local: &[TransactionRecord]) -> Vec<TransactionRecord> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(remote.len() + local.len());
    let mut merged = Vec::with_capacity(remote.len() + local.len());
    for record in remote.iter().chain(local) {
        if seen.insert(record.identity()) {
            merged.push(record.clone());
        }
    }

    // 稳定排序，时间相同保持插入顺序
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged
}

fn arg_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

pub struct HistoryService {
    ledger: Arc<dyn LedgerRpc>,
    log: Arc<LocalTransactionLog>,
    fetch_limit: usize,
    /// coin type → 币种符号
    symbols: BTreeMap<String, String>,
}

impl HistoryService {
    pub fn new(ledger: Arc<dyn LedgerRpc>, log: Arc<LocalTransactionLog>, fetch_limit: usize) -> Self {
        Self {
            ledger,
            log,
            fetch_limit,
            symbols: BTreeMap::new(),
        }
    }

    /// 用于从链上 type argument 反查币种
    pub fn with_coin_types(mut self, coin_types: &BTreeMap<String, String>) -> Self {
        self.symbols = coin_types
            .iter()
            .map(|(symbol, coin_type)| (coin_type.clone(), symbol.clone()))
            .collect();
        self
    }

    /// 链上交易 → 历史记录
    pub fn record_from_ledger(&self, owner: &str, tx: &LedgerTransaction) -> TransactionRecord {
        let record_type = RecordType::from_function(tx.function(), tx.sender.as_deref(), owner);
        let currency = tx
            .payload
            .as_ref()
            .and_then(|p| p.type_arguments.first())
            .and_then(|coin_type| self.symbols.get(coin_type))
            .cloned()
            .unwrap_or_else(|| DEFAULT_HISTORY_CURRENCY.to_string());

        let amount = from_minor_units(arg_u64(tx.argument(1)), decimals_for(&currency));
        let fee = from_minor_units(tx.gas_used(), decimals_for("APT"));
        let status = if tx.success {
            TransactionStatus::Completed
        } else {
            TransactionStatus::Failed
        };
        let timestamp = tx
            .timestamp_micros()
            .and_then(from_ledger_micros)
            .unwrap_or_default();

        let mut record = TransactionRecord::new(
            tx.version.clone().unwrap_or_else(|| tx.hash.clone()),
            record_type,
            amount,
            currency,
            status,
            timestamp,
        )
        .with_hash(Some(tx.hash.clone()))
        .with_fee(fee);

        if let Some(counterparty) = tx.argument(0).and_then(|v| v.as_str()) {
            record = record.with_counterparty(counterparty);
        }
        if let Some(sender) = &tx.sender {
            record = record.with_sender(sender.clone());
        }
        record
    }

    /// 合并后的账户历史；链上查询失败时只返回本地日志
    pub async fn history(&self, address: &str) -> Result<Vec<TransactionRecord>> {
        let (local, fetched) = futures::future::join(
            self.log.records(address),
            self.ledger.account_transactions(address, self.fetch_limit),
        )
        .await;
        let local = local?;

        let remote = match fetched {
            Ok(txs) => txs
                .iter()
                .map(|tx| self.record_from_ledger(address, tx))
                .collect::<Vec<_>>(),
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "ledger history unavailable, using local log");
                crate::metrics::inc_reconciliation(false);
                return Ok(local);
            }
        };

        let merged = reconcile(&remote, &local);
        crate::metrics::inc_reconciliation(true);
        tracing::debug!(
            address = %address,
            remote = remote.len(),
            local = local.len(),
            merged = merged.len(),
            "history reconciled"
        );
        Ok(merged)
    }

    /// 所有记录的手续费合计
    pub fn total_fees(records: &[TransactionRecord]) -> Decimal {
        records.iter().map(|r| r.fee).sum()
    }
}
