//! 交易意图
//!
//! 与 provider 无关的支付描述。构造后不可变，提交时整体移交给 TransactionSubmitter。

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::currency::normalize_symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentKind {
    Send,
    BatchPay,
    SwapRequest,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::BatchPay => "batch-pay",
            Self::SwapRequest => "swap-request",
        }
    }
}

/// 单个收款方
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: String,
    pub amount: Decimal,
    pub currency: String,
}

impl Recipient {
    pub fn new(address: impl Into<String>, amount: Decimal, currency: &str) -> Self {
        Self {
            address: address.into().trim().to_string(),
            amount,
            currency: normalize_symbol(currency),
        }
    }
}

/// 兑换请求的额外参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapTerms {
    pub to_currency: String,
    /// 可接受的最小输出（最小单位），0 表示不限制
    pub min_out: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIntent {
    kind: IntentKind,
    recipients: Vec<Recipient>,
    memo: Option<Vec<u8>>,
    swap: Option<SwapTerms>,
}

impl TransactionIntent {
    pub fn send(recipient: Recipient) -> Self {
        Self {
            kind: IntentKind::Send,
            recipients: vec![recipient],
            memo: None,
            swap: None,
        }
    }

    /// 批量代发，收款方顺序即链上参数顺序
    pub fn batch_pay(recipients: Vec<Recipient>) -> Self {
        Self {
            kind: IntentKind::BatchPay,
            recipients,
            memo: None,
            swap: None,
        }
    }

    /// 兑换请求：`owner` 为兑换发起账户，`amount`/`from_currency` 为卖出侧
    pub fn swap_request(
        owner: impl Into<String>,
        amount: Decimal,
        from_currency: &str,
        to_currency: &str,
        min_out: u64,
    ) -> Self {
        Self {
            kind: IntentKind::SwapRequest,
            recipients: vec![Recipient::new(owner, amount, from_currency)],
            memo: None,
            swap: Some(SwapTerms {
                to_currency: normalize_symbol(to_currency),
                min_out,
            }),
        }
    }

    /// 备注以字节序列保存，文本按 UTF-8 编码
    pub fn with_memo(mut self, memo: impl AsRef<[u8]>) -> Self {
        self.memo = Some(memo.as_ref().to_vec());
        self
    }

    pub fn kind(&self) -> IntentKind {
        self.kind
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    pub fn memo(&self) -> Option<&[u8]> {
        self.memo.as_deref()
    }

    pub fn swap_terms(&self) -> Option<&SwapTerms> {
        self.swap.as_ref()
    }

    pub fn total_amount(&self) -> Decimal {
        self.recipients.iter().map(|r| r.amount).sum()
    }

    /// 所有收款方是否使用同一币种（批量合约调用只接受单一 coin type）
    pub fn single_currency(&self) -> Option<&str> {
        let first = self.recipients.first()?.currency.as_str();
        self.recipients
            .iter()
            .all(|r| r.currency == first)
            .then_some(first)
    }
}
