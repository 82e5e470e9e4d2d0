//! 交易历史记录
//!
//! 有哈希时以哈希标识，否则以 id 标识。链上记录和本地乐观写入共用此结构，
//! 链上副本优先。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::transaction_status::TransactionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Send,
    Receive,
    Swap,
    Payroll,
}

impl RecordType {
    /// 根据链上 entry function 名推断记录类型
    pub fn from_function(function: &str, sender: Option<&str>, owner: &str) -> Self {
        if function.contains("batch_send") || function.contains("batch_pay") {
            Self::Payroll
        } else if function.contains("swap") {
            Self::Swap
        } else if sender.is_some_and(|s| !s.eq_ignore_ascii_case(owner)) {
            Self::Receive
        } else {
            Self::Send
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub amount: Decimal,
    pub currency: String,
    /// 对手方地址（收款方或付款方）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, alias = "txHash")]
    pub hash: Option<String>,
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_currency: Option<String>,
}

impl TransactionRecord {
    pub fn new(
        id: impl Into<String>,
        record_type: RecordType,
        amount: Decimal,
        currency: impl Into<String>,
        status: TransactionStatus,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            record_type,
            amount,
            currency: currency.into(),
            counterparty: None,
            sender: None,
            status,
            timestamp,
            hash: None,
            fee: Decimal::ZERO,
            batch_size: None,
            from_currency: None,
            to_currency: None,
        }
    }

    pub fn with_hash(mut self, hash: Option<String>) -> Self {
        self.hash = hash.filter(|h| !h.is_empty());
        self
    }

    pub fn with_counterparty(mut self, counterparty: impl Into<String>) -> Self {
        self.counterparty = Some(counterparty.into());
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn with_swap_pair(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from_currency = Some(from.into());
        self.to_currency = Some(to.into());
        self
    }

    /// 非空哈希
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref().filter(|h| !h.is_empty())
    }

    /// 去重键：哈希优先，否则 id
    pub fn identity(&self) -> &str {
        self.hash().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_prefers_hash() {
        let record = TransactionRecord::new(
            "local-1",
            RecordType::Send,
            Decimal::ONE,
            "USDC",
            TransactionStatus::Processing,
            Utc::now(),
        );
        assert_eq!(record.identity(), "local-1");

        let record = record.with_hash(Some("0xabc".into()));
        assert_eq!(record.identity(), "0xabc");

        let record = record.with_hash(Some(String::new()));
        assert_eq!(record.identity(), "local-1");
    }

    #[test]
    fn test_record_type_from_function() {
        let owner = "0xa11ce";
        assert_eq!(
            RecordType::from_function("0x1::GlobePayXBusiness::batch_pay", Some(owner), owner),
            RecordType::Payroll
        );
        assert_eq!(
            RecordType::from_function("0x1::GlobePayXCore::swap_request", Some(owner), owner),
            RecordType::Swap
        );
        assert_eq!(
            RecordType::from_function("0x1::coin::transfer", Some("0xb0b"), owner),
            RecordType::Receive
        );
        assert_eq!(
            RecordType::from_function("0x1::coin::transfer", Some(owner), owner),
            RecordType::Send
        );
    }

    #[test]
    fn test_accepts_legacy_tx_hash_field() {
        let json = serde_json::json!({
            "id": "1700000000000",
            "type": "payroll",
            "amount": "1500",
            "currency": "USDC",
            "status": "completed",
            "timestamp": "2024-01-01T00:00:00Z",
            "txHash": "0xfeed",
            "batchSize": 3
        });
        let record: TransactionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.hash(), Some("0xfeed"));
        assert_eq!(record.batch_size, Some(3));
        assert_eq!(record.fee, Decimal::ZERO);
    }
}
