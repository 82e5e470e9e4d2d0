//! 账户余额查询测试

mod common;

use std::sync::Arc;

use common::*;
use globepayx::{domain::currency::APTOS_COIN, error::WalletError, infrastructure::host::StaticHost};
use rust_decimal::Decimal;

#[tokio::test]
async fn test_balances_cover_every_configured_coin() {
    let (state, ledger) = app_with_host(Arc::new(StaticHost::new()), test_config());
    ledger
        .balances
        .lock()
        .unwrap()
        .extend([(APTOS_COIN.to_string(), 250_000_000), (USDC_COIN.to_string(), 1_500_000)]);

    let balances = state.balances.balances(OWNER).await.unwrap();
    let summary: Vec<(&str, Decimal)> = balances
        .iter()
        .map(|b| (b.currency.as_str(), b.amount))
        .collect();
    assert_eq!(
        summary,
        vec![("APT", Decimal::new(25, 1)), ("USDC", Decimal::new(15, 1))]
    );
    assert_eq!(balances[0].raw, 250_000_000);
    assert_eq!(balances[1].coin_type, USDC_COIN);
    assert_eq!(ledger.calls(), vec!["account_balance", "account_balance"]);
}

#[tokio::test]
async fn test_failed_coin_lookup_reports_zero() {
    let (state, ledger) = app_with_host(Arc::new(StaticHost::new()), test_config());
    ledger
        .balances
        .lock()
        .unwrap()
        .insert(APTOS_COIN.to_string(), 100_000_000);
    *ledger.fail_balance_for.lock().unwrap() = Some(USDC_COIN.to_string());

    let balances = state.balances.balances(OWNER).await.unwrap();
    assert_eq!(balances.len(), 2);
    assert_eq!(balances[0].amount, Decimal::ONE);
    assert_eq!(balances[1].currency, "USDC");
    assert_eq!(balances[1].amount, Decimal::ZERO);

    // 单币种查询不吞掉错误
    let err = state.balances.balance(OWNER, "usdc").await.unwrap_err();
    assert_eq!(err.code(), "ledger_error");
}

#[tokio::test]
async fn test_single_balance_lookup() {
    let (state, ledger) = app_with_host(Arc::new(StaticHost::new()), test_config());
    ledger
        .balances
        .lock()
        .unwrap()
        .insert(USDC_COIN.to_string(), 42);

    let usdc = state.balances.balance(OWNER, "usdc").await.unwrap().unwrap();
    assert_eq!(usdc.currency, "USDC");
    assert_eq!(usdc.amount, Decimal::new(42, 6));

    assert!(state.balances.balance(OWNER, "EURC").await.unwrap().is_none());
    assert!(matches!(
        state.balances.balances("bob").await,
        Err(WalletError::InvalidAddress { .. })
    ));
}
