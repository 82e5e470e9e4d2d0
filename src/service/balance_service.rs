//! 账户余额查询
//!
//! 按配置中登记的币种逐个读取 CoinStore，换算成十进制金额。
//! 单个币种查询失败时记为 0，不影响其他币种。

use std::{collections::BTreeMap, sync::Arc};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    domain::currency::{decimals_for, from_minor_units, normalize_symbol},
    error::Result,
    infrastructure::ledger_client::LedgerRpc,
    utils::address_validator::AddressValidator,
};

/// 单个币种的余额
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoinBalance {
    pub currency: String,
    pub coin_type: String,
    /// 最小单位
    pub raw: u64,
    pub amount: Decimal,
}

pub struct BalanceService {
    ledger: Arc<dyn LedgerRpc>,
    coin_types: BTreeMap<String, String>,
}

impl BalanceService {
    pub fn new(ledger: Arc<dyn LedgerRpc>, coin_types: &BTreeMap<String, String>) -> Self {
        Self {
            ledger,
            coin_types: coin_types.clone(),
        }
    }

    /// 所有登记币种的余额，按币种符号排序
    pub async fn balances(&self, address: &str) -> Result<Vec<CoinBalance>> {
        AddressValidator::validate(address)?;

        let lookups = self.coin_types.iter().map(|(currency, coin_type)| async move {
            let raw = match self.ledger.account_balance(address, coin_type).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(
                        address = %AddressValidator::short(address),
                        currency = %currency,
                        error = %e,
                        "balance lookup failed, reporting zero"
                    );
                    0
                }
            };
            CoinBalance {
                currency: currency.clone(),
                coin_type: coin_type.clone(),
                raw,
                amount: from_minor_units(raw, decimals_for(currency)),
            }
        });

        let balances = futures::future::join_all(lookups).await;
        tracing::debug!(
            address = %AddressValidator::short(address),
            currencies = balances.len(),
            "balances fetched"
        );
        Ok(balances)
    }

    /// 单个币种余额；未登记的币种返回 None，查询失败直接返回错误
    pub async fn balance(&self, address: &str, currency: &str) -> Result<Option<CoinBalance>> {
        AddressValidator::validate(address)?;
        let symbol = normalize_symbol(currency);
        let Some(coin_type) = self.coin_types.get(&symbol) else {
            return Ok(None);
        };
        let raw = self.ledger.account_balance(address, coin_type).await?;
        Ok(Some(CoinBalance {
            amount: from_minor_units(raw, decimals_for(&symbol)),
            currency: symbol,
            coin_type: coin_type.clone(),
            raw,
        }))
    }
}
