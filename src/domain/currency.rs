//! 币种注册表
//!
//! 币种符号 → 精度，以及十进制金额与链上最小单位之间的换算。
//! 币种到链上 coin type 的映射来自配置（合约部署后才有稳定币地址）。

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rust_decimal::{prelude::ToPrimitive, Decimal};

use crate::error::{Result, WalletError};

/// 未登记币种的默认精度
pub const DEFAULT_DECIMALS: u32 = 6;

/// APT 原生币的 coin type
pub const APTOS_COIN: &str = "0x1::aptos_coin::AptosCoin";

#[derive(Debug, Clone)]
pub struct CurrencyInfo {
    pub symbol: &'static str,
    pub decimals: u32,
    pub full_name: &'static str,
}

static CURRENCY_REGISTRY: Lazy<HashMap<&'static str, CurrencyInfo>> = Lazy::new(|| {
    let currencies = vec![
        CurrencyInfo {
            symbol: "APT",
            decimals: 8,
            full_name: "Aptos Coin",
        },
        CurrencyInfo {
            symbol: "USDC",
            decimals: 6,
            full_name: "USD Coin",
        },
        CurrencyInfo {
            symbol: "USDT",
            decimals: 6,
            full_name: "Tether USD",
        },
        CurrencyInfo {
            symbol: "WETH",
            decimals: 8,
            full_name: "Wrapped Ether",
        },
    ];

    currencies.into_iter().map(|c| (c.symbol, c)).collect()
});

/// 统一币种符号写法
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

pub fn currency_info(symbol: &str) -> Option<&'static CurrencyInfo> {
    CURRENCY_REGISTRY.get(normalize_symbol(symbol).as_str())
}

/// 币种精度，未登记的币种按 6 位处理
pub fn decimals_for(symbol: &str) -> u32 {
    currency_info(symbol)
        .map(|c| c.decimals)
        .unwrap_or(DEFAULT_DECIMALS)
}

/// 十进制金额 → 最小单位（向零截断）
///
/// 非正数、截断后为 0、或超出 u64 的金额都会被拒绝。
pub fn to_minor_units(amount: Decimal, decimals: u32) -> Result<u64> {
    let invalid = || WalletError::InvalidAmount {
        amount: amount.to_string(),
    };

    if amount <= Decimal::ZERO {
        return Err(invalid());
    }

    let scale = 10u64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or_else(invalid)?;
    let raw = amount
        .checked_mul(scale)
        .ok_or_else(invalid)?
        .trunc()
        .to_u64()
        .ok_or_else(invalid)?;

    if raw == 0 {
        return Err(invalid());
    }
    Ok(raw)
}

/// 最小单位 → 十进制金额
pub fn from_minor_units(raw: u64, decimals: u32) -> Decimal {
    let mut value = Decimal::from(raw);
    // Decimal 最大 scale 为 28
    value
        .set_scale(decimals.min(28))
        .map(|_| value.normalize())
        .unwrap_or(value)
}
