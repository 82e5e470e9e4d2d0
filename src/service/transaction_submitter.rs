//! 交易提交
//!
//! `submit` 分两步：
//! 1. `prepare` 同步校验会话、金额、币种和地址，生成调用计划；
//!    这一步失败直接返回 `Err`，不会触达 provider 或账本。
//! 2. 逐个执行计划中的调用，每个收款方得到独立的结果并写入本地日志。
//!
//! 不做自动重试。批量代发在开启且单一币种时走一次合约调用，否则逐个发送。

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::{
    config::Config,
    domain::{
        currency::{decimals_for, to_minor_units},
        BatchMode, EntryFunctionPayload, IntentKind, OutcomeSource, OutcomeStatus, ProviderKind,
        Recipient, RecipientOutcome, RecordType, SignRequest, SubmissionReport,
        TransactionIntent, TransactionOutcome, TransactionRecord, TransactionStatus,
    },
    error::{Result, WalletError},
    infrastructure::ledger_client::LedgerRpc,
    service::{
        adapters::WalletAdapter,
        payload_builder::{default_batch_memo, PayloadBuilder},
        session_store::SessionStore,
        transaction_log::LocalTransactionLog,
    },
    utils::address_validator::AddressValidator,
};

/// 一次合约调用及其覆盖的收款方下标
#[derive(Debug, Clone)]
pub struct PlannedCall {
    pub payload: EntryFunctionPayload,
    pub recipients: Vec<usize>,
}

/// 校验通过后的提交计划
#[derive(Debug, Clone)]
pub struct SubmissionPlan {
    pub sender: String,
    pub provider: ProviderKind,
    pub kind: IntentKind,
    pub batch_mode: Option<BatchMode>,
    pub recipients: Vec<Recipient>,
    pub swap_to: Option<String>,
    pub calls: Vec<PlannedCall>,
}

pub struct TransactionSubmitter {
    sessions: Arc<SessionStore>,
    ledger: Arc<dyn LedgerRpc>,
    log: Arc<LocalTransactionLog>,
    builder: PayloadBuilder,
    wait_for_confirmation: bool,
    allow_simulation: bool,
}

impl TransactionSubmitter {
    pub fn new(
        sessions: Arc<SessionStore>,
        ledger: Arc<dyn LedgerRpc>,
        log: Arc<LocalTransactionLog>,
        config: &Config,
    ) -> Self {
        Self {
            sessions,
            ledger,
            log,
            builder: PayloadBuilder::new(config.contracts.clone()),
            wait_for_confirmation: config.ledger.wait_for_confirmation,
            allow_simulation: config.wallet.allow_simulation,
        }
    }

    pub fn with_simulation(mut self, allow: bool) -> Self {
        self.allow_simulation = allow;
        self
    }

    pub fn with_confirmation(mut self, wait: bool) -> Self {
        self.wait_for_confirmation = wait;
        self
    }

    fn coin_type(&self, currency: &str) -> Result<String> {
        self.builder
            .contracts()
            .coin_type(currency)
            .map(String::from)
            .ok_or_else(|| WalletError::UnsupportedCurrency {
                currency: currency.to_string(),
            })
    }

    /// 同步校验并生成调用计划
    pub fn prepare(&self, intent: &TransactionIntent) -> Result<SubmissionPlan> {
        let session = self.sessions.snapshot();
        let (Some(sender), Some(provider)) = (session.address(), session.provider_kind()) else {
            return Err(WalletError::NotConnected);
        };
        if !session.is_connected() {
            return Err(WalletError::NotConnected);
        }

        let recipients = intent.recipients();
        if recipients.is_empty() {
            return Err(WalletError::SubmissionRejected {
                reason: "intent has no recipients".to_string(),
            });
        }

        let mut raw_amounts = Vec::with_capacity(recipients.len());
        let mut coin_types = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            if recipient.amount <= Decimal::ZERO {
                return Err(WalletError::InvalidAmount {
                    amount: recipient.amount.to_string(),
                });
            }
            let coin_type = self.coin_type(&recipient.currency)?;
            raw_amounts.push(to_minor_units(
                recipient.amount,
                decimals_for(&recipient.currency),
            )?);
            AddressValidator::validate(&recipient.address)?;
            coin_types.push(coin_type);
        }

        let mut swap_to = None;
        let (batch_mode, calls) = match intent.kind() {
            IntentKind::Send => (
                None,
                vec![PlannedCall {
                    payload: self.builder.send(
                        &recipients[0].address,
                        raw_amounts[0],
                        &coin_types[0],
                    ),
                    recipients: vec![0],
                }],
            ),
            IntentKind::SwapRequest => {
                let terms = intent.swap_terms().ok_or_else(|| WalletError::SubmissionRejected {
                    reason: "swap request without terms".to_string(),
                })?;
                let coin_out = self.coin_type(&terms.to_currency)?;
                swap_to = Some(terms.to_currency.clone());
                (
                    None,
                    vec![PlannedCall {
                        payload: self.builder.swap_request(
                            &coin_types[0],
                            &coin_out,
                            raw_amounts[0],
                            terms.min_out,
                        ),
                        recipients: vec![0],
                    }],
                )
            }
            IntentKind::BatchPay => {
                let atomic = self.builder.contracts().batch_pay_enabled
                    && intent.single_currency().is_some();
                if atomic {
                    let addresses: Vec<&str> =
                        recipients.iter().map(|r| r.address.as_str()).collect();
                    let memo = intent
                        .memo()
                        .map(<[u8]>::to_vec)
                        .unwrap_or_else(|| default_batch_memo(recipients.len()).into_bytes());
                    (
                        Some(BatchMode::Atomic),
                        vec![PlannedCall {
                            payload: self.builder.batch_pay(
                                &addresses,
                                &raw_amounts,
                                &coin_types[0],
                                &memo,
                            ),
                            recipients: (0..recipients.len()).collect(),
                        }],
                    )
                } else {
                    let calls = recipients
                        .iter()
                        .enumerate()
                        .map(|(i, r)| PlannedCall {
                            payload: self.builder.send(&r.address, raw_amounts[i], &coin_types[i]),
                            recipients: vec![i],
                        })
                        .collect();
                    (Some(BatchMode::Sequential), calls)
                }
            }
        };

        Ok(SubmissionPlan {
            sender: sender.to_string(),
            provider,
            kind: intent.kind(),
            batch_mode,
            recipients: recipients.to_vec(),
            swap_to,
            calls,
        })
    }

    /// 提交交易意图
    ///
    /// 同步校验失败返回 `Err`；执行阶段的失败体现在各收款方的结果里，
    /// 需要整体判定时调用 `SubmissionReport::into_result`。
    pub async fn submit(&self, intent: &TransactionIntent) -> Result<SubmissionReport> {
        let plan = self.prepare(intent)?;
        let adapter = self.sessions.adapter(plan.provider)?;

        tracing::info!(
            kind = plan.kind.as_str(),
            provider = %plan.provider,
            recipients = plan.recipients.len(),
            calls = plan.calls.len(),
            batch_mode = ?plan.batch_mode,
            "submitting transaction intent"
        );

        let mut outcomes = Vec::with_capacity(plan.recipients.len());
        for call in &plan.calls {
            let outcome = self.execute(adapter.as_ref(), &plan, &call.payload).await;
            self.record(&plan, call, &outcome).await;
            for &index in &call.recipients {
                let recipient = &plan.recipients[index];
                outcomes.push(RecipientOutcome {
                    index,
                    address: recipient.address.clone(),
                    amount: recipient.amount,
                    currency: recipient.currency.clone(),
                    outcome: outcome.clone(),
                });
            }
        }

        let report = SubmissionReport {
            kind: plan.kind,
            batch_mode: plan.batch_mode,
            outcomes,
        };
        if report.is_partial_failure() {
            crate::metrics::inc_partial_batch_failure();
            tracing::warn!(
                failed = report.failed().len(),
                total = report.outcomes.len(),
                "batch partially failed"
            );
        }
        Ok(report)
    }

    async fn execute(
        &self,
        adapter: &dyn WalletAdapter,
        plan: &SubmissionPlan,
        payload: &EntryFunctionPayload,
    ) -> TransactionOutcome {
        let request = SignRequest::new(payload.clone()).with_sender(plan.sender.clone());

        let outcome = match adapter.sign_and_submit(&request).await {
            Ok(result) => {
                let submitted = TransactionOutcome::submitted(result.hash, Some(result.raw));
                self.confirm(submitted).await
            }
            Err(e) if e.permits_simulation() && self.allow_simulation => {
                tracing::warn!(
                    provider = %plan.provider,
                    function = %payload.function,
                    reason = %e,
                    "no usable submit path, returning simulated outcome"
                );
                TransactionOutcome::simulated()
            }
            Err(e) => {
                tracing::error!(
                    provider = %plan.provider,
                    function = %payload.function,
                    error = %e,
                    code = e.code(),
                    "transaction submission failed"
                );
                TransactionOutcome::failed(e)
            }
        };

        crate::metrics::inc_submission(source_label(outcome.source), status_label(outcome.status));
        outcome
    }

    /// 等待链上确认；等待本身失败时保持 submitted
    async fn confirm(&self, outcome: TransactionOutcome) -> TransactionOutcome {
        if !self.wait_for_confirmation {
            return outcome;
        }
        let Some(hash) = outcome.hash.clone() else {
            return outcome;
        };

        match self.ledger.wait_for_transaction(&hash).await {
            Ok(status) if status.success => {
                tracing::info!(hash = %hash, "transaction confirmed");
                outcome.with_status(OutcomeStatus::Completed)
            }
            Ok(status) => {
                tracing::warn!(hash = %hash, vm_status = %status.vm_status, "transaction failed on ledger");
                outcome.with_error(WalletError::SubmissionRejected {
                    reason: status.vm_status,
                })
            }
            Err(e) => {
                tracing::warn!(hash = %hash, error = %e, "could not confirm transaction, leaving as submitted");
                outcome
            }
        }
    }

    /// 写本地日志；写入失败不影响提交结果
    async fn record(&self, plan: &SubmissionPlan, call: &PlannedCall, outcome: &TransactionOutcome) {
        let id = match (&outcome.hash, outcome.source) {
            (Some(hash), _) => hash.clone(),
            (None, OutcomeSource::Simulation) => format!("sim-{}", uuid::Uuid::new_v4()),
            (None, OutcomeSource::Ledger) => uuid::Uuid::new_v4().to_string(),
        };
        let status = match outcome.source {
            OutcomeSource::Simulation => TransactionStatus::Pending,
            OutcomeSource::Ledger => TransactionStatus::from(outcome.status),
        };

        let first = &plan.recipients[call.recipients[0]];
        let record = match (plan.kind, plan.batch_mode) {
            (IntentKind::BatchPay, Some(BatchMode::Atomic)) => {
                let total: Decimal = call
                    .recipients
                    .iter()
                    .map(|&i| plan.recipients[i].amount)
                    .sum();
                TransactionRecord::new(id, RecordType::Payroll, total, &first.currency, status, Utc::now())
                    .with_batch_size(call.recipients.len())
            }
            (IntentKind::BatchPay, _) => {
                TransactionRecord::new(id, RecordType::Payroll, first.amount, &first.currency, status, Utc::now())
                    .with_counterparty(first.address.clone())
                    .with_batch_size(1)
            }
            (IntentKind::Send, _) => {
                TransactionRecord::new(id, RecordType::Send, first.amount, &first.currency, status, Utc::now())
                    .with_counterparty(first.address.clone())
            }
            (IntentKind::SwapRequest, _) => {
                let to = plan.swap_to.clone().unwrap_or_default();
                TransactionRecord::new(id, RecordType::Swap, first.amount, &first.currency, status, Utc::now())
                    .with_swap_pair(first.currency.clone(), to)
            }
        }
        .with_hash(outcome.hash.clone())
        .with_sender(plan.sender.clone());

        if let Err(e) = self.log.append(&plan.sender, record).await {
            tracing::warn!(sender = %AddressValidator::short(&plan.sender), error = %e, "failed to record transaction locally");
        }
    }
}

fn source_label(source: OutcomeSource) -> &'static str {
    match source {
        OutcomeSource::Ledger => "ledger",
        OutcomeSource::Simulation => "simulation",
    }
}

fn status_label(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::Submitted => "submitted",
        OutcomeStatus::Completed => "completed",
        OutcomeStatus::Failed => "failed",
    }
}
