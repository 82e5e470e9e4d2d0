//! GlobePayX 演示入口
//! 加载配置、恢复或连接钱包会话、提交一笔示例交易并打印合并后的历史

use std::{str::FromStr, sync::Arc, time::Instant};

use anyhow::{Context, Result};
use globepayx::{
    config::Config,
    domain::{Recipient, TransactionIntent},
    infrastructure::{
        host::{HeadlessHost, HostEnvironment},
        logging::init_logging,
        scripted_provider::host_from_file,
    },
    metrics,
    utils::{format_duration, format_timestamp},
    AppState,
};
use rust_decimal::Decimal;

#[tokio::main]
async fn main() -> Result<()> {
    let started = Instant::now();

    // 1. 环境变量与配置
    dotenvy::dotenv().ok();
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;
    config.validate().context("invalid configuration")?;

    // 2. 日志
    let _log_guard = init_logging(&config.logging)?;
    tracing::info!(network = %config.ledger.network, "starting GlobePayX wallet demo");

    // 3. 宿主环境：提供了钱包脚本则使用脚本，否则没有任何注入对象
    let host: Arc<dyn HostEnvironment> = match std::env::var("GLOBEPAYX_PROVIDERS") {
        Ok(path) => Arc::new(
            host_from_file(&path)
                .await
                .with_context(|| format!("failed to load provider fixture {}", path))?,
        ),
        Err(_) => Arc::new(HeadlessHost),
    };

    let state = AppState::from_config(config, host).await?;

    // 4. 恢复或连接会话
    let mut session = state.sessions.restore().await?;
    if !session.is_connected() {
        match state.sessions.connect(None).await {
            Ok(connected) => session = connected,
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "no wallet session");
                println!("{}", e.user_message());
                println!("{}", metrics::render_prometheus());
                return Ok(());
            }
        }
    }
    let address = session.address().unwrap_or_default().to_string();
    println!(
        "connected {} via {} on {}",
        address,
        session
            .provider_kind()
            .map(|k| k.display_name())
            .unwrap_or("-"),
        session.network()
    );

    match state.balances.balances(&address).await {
        Ok(balances) => {
            for balance in &balances {
                println!("balance {} {}", balance.amount, balance.currency);
            }
        }
        Err(e) => println!("{}", e.user_message()),
    }

    // 5. 示例交易
    let recipient = std::env::var("GLOBEPAYX_DEMO_RECIPIENT").unwrap_or_else(|_| address.clone());
    let amount = std::env::var("GLOBEPAYX_DEMO_AMOUNT")
        .ok()
        .and_then(|s| Decimal::from_str(&s).ok())
        .unwrap_or_else(|| Decimal::new(1, 2));
    let intent = TransactionIntent::send(Recipient::new(recipient, amount, "APT"));

    match state.submitter.submit(&intent).await {
        Ok(report) => {
            for item in &report.outcomes {
                println!(
                    "#{} {} {} {} -> {:?} ({:?}) {}",
                    item.index,
                    item.address,
                    item.amount,
                    item.currency,
                    item.outcome.status,
                    item.outcome.source,
                    item.outcome.hash.as_deref().unwrap_or("-"),
                );
            }
            if let Err(e) = report.into_result() {
                println!("{}", e.user_message());
            }
        }
        Err(e) => println!("{}", e.user_message()),
    }

    // 6. 历史
    let records = state.history.history(&address).await?;
    for record in &records {
        println!(
            "{} {:?} {} {} {} {}",
            format_timestamp(&record.timestamp),
            record.record_type,
            record.amount,
            record.currency,
            record.status,
            record.hash().unwrap_or(&record.id),
        );
    }

    println!("{}", metrics::render_prometheus());
    tracing::info!(
        elapsed = %format_duration(started.elapsed().as_secs()),
        records = records.len(),
        "demo finished"
    );
    Ok(())
}
