//! 本地交易日志
//!
//! 提交时的乐观写入，按账户保存在 `transactions_<address>` 下，最新在前，
//! 最多保留 `limit` 条。写入经过互斥锁，并发完成的提交不会互相覆盖。

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    domain::TransactionRecord,
    error::Result,
    infrastructure::kv_store::KvStore,
    utils::address_validator::AddressValidator,
};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// 日志键；合法地址先规范化，同一账户的不同写法共用一份日志
pub fn storage_key(address: &str) -> String {
    let address = AddressValidator::normalize(address).unwrap_or_else(|_| address.trim().to_string());
    format!("transactions_{}", address)
}

pub struct LocalTransactionLog {
    kv: Arc<dyn KvStore>,
    limit: usize,
    write_lock: Mutex<()>,
}

impl LocalTransactionLog {
    pub fn new(kv: Arc<dyn KvStore>, limit: usize) -> Self {
        Self {
            kv,
            limit: limit.max(1),
            write_lock: Mutex::new(()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 读取某账户的本地记录；数据损坏时记录警告并视为空
    pub async fn records(&self, address: &str) -> Result<Vec<TransactionRecord>> {
        let Some(raw) = self.kv.get(&storage_key(address)).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "local transaction log is corrupt, ignoring");
                Ok(Vec::new())
            }
        }
    }

    /// 追加一条记录；同哈希或同 id 的记录已存在时不写入，返回 false
    pub async fn append(&self, address: &str, record: TransactionRecord) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.records(address).await?;
        let exists = records.iter().any(|r| {
            r.id == record.id || matches!((r.hash(), record.hash()), (Some(a), Some(b)) if a == b)
        });
        if exists {
            tracing::debug!(address = %address, id = %record.id, "transaction already logged");
            return Ok(false);
        }

        tracing::debug!(
            address = %address,
            record_type = ?record.record_type,
            hash = ?record.hash,
            "transaction stored locally"
        );
        records.insert(0, record);
        records.truncate(self.limit);
        self.kv
            .put(&storage_key(address), serde_json::to_string(&records)?)
            .await?;
        Ok(true)
    }

    pub async fn clear(&self, address: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.kv.remove(&storage_key(address)).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::{
        domain::{RecordType, TransactionStatus},
        infrastructure::kv_store::MemoryKvStore,
    };

    fn record(id: &str, hash: Option<&str>) -> TransactionRecord {
        TransactionRecord::new(
            id,
            RecordType::Send,
            Decimal::ONE,
            "APT",
            TransactionStatus::Processing,
            Utc::now(),
        )
        .with_hash(hash.map(String::from))
    }

    #[tokio::test]
    async fn test_append_newest_first_and_dedupe() {
        let log = LocalTransactionLog::new(Arc::new(MemoryKvStore::new()), 10);

        assert!(log.append("0x1", record("a", Some("0xa"))).await.unwrap());
        assert!(log.append("0x1", record("b", None)).await.unwrap());
        // 同哈希
        assert!(!log.append("0x1", record("c", Some("0xa"))).await.unwrap());
        // 同 id
        assert!(!log.append("0x1", record("b", None)).await.unwrap());

        let records = log.records("0x1").await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(log.records("0x2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_limit_keeps_newest() {
        let log = LocalTransactionLog::new(Arc::new(MemoryKvStore::new()), 3);
        for i in 0..5 {
            log.append("0x1", record(&i.to_string(), None)).await.unwrap();
        }
        let ids: Vec<String> = log
            .records("0x1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["4", "3", "2"]);
    }

    #[tokio::test]
    async fn test_same_account_spellings_share_one_log() {
        let log = LocalTransactionLog::new(Arc::new(MemoryKvStore::new()), 10);
        log.append("0xABC", record("a", Some("0xa"))).await.unwrap();
        log.append("0x0abc", record("b", Some("0xb"))).await.unwrap();

        let records = log.records(" 0x00abc").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(storage_key("0xABC"), storage_key("0x0abc"));
        assert_eq!(storage_key("not-an-address"), "transactions_not-an-address");
    }

    #[tokio::test]
    async fn test_corrupt_log_reads_as_empty() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.put(&storage_key("0x1"), "{not json".into()).await.unwrap();
        let log = LocalTransactionLog::new(kv, 10);
        assert!(log.records("0x1").await.unwrap().is_empty());

        // 损坏的数据会被下一次写入覆盖
        log.append("0x1", record("a", None)).await.unwrap();
        assert_eq!(log.records("0x1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let log = Arc::new(LocalTransactionLog::new(Arc::new(MemoryKvStore::new()), 100));
        let handles: Vec<_> = (0..20)
            .map(|i| {
                let log = log.clone();
                tokio::spawn(async move { log.append("0x1", record(&format!("r{}", i), None)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(log.records("0x1").await.unwrap().len(), 20);
    }
}
