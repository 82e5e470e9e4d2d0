//! GlobePayX 合约调用载荷构建
//!
//! - send  → `<core>::GlobePayXCore::send_stablecoin<Coin>(to, amount)`
//! - batch → `<business>::GlobePayXBusiness::batch_pay<Coin>(addresses, amounts, memo)`
//! - swap  → `<core>::GlobePayXCore::swap_request<In, Out>(amount, min_out, rate)`

use serde_json::{json, Value};

use crate::{config::ContractsConfig, domain::EntryFunctionPayload};

pub const SEND_STABLECOIN: &str = "send_stablecoin";
pub const BATCH_PAY: &str = "batch_pay";
pub const SWAP_REQUEST: &str = "swap_request";

/// 1e18 定点汇率，1:1
pub const UNIT_RATE: &str = "1000000000000000000";

/// 批量代发的默认备注
pub fn default_batch_memo(recipients: usize) -> String {
    format!("Payroll batch - {} recipients", recipients)
}

/// u64 以十进制字符串传给钱包，避免 JS 端精度丢失
fn u64_arg(value: u64) -> Value {
    json!(value.to_string())
}

fn bytes_arg(bytes: &[u8]) -> Value {
    Value::Array(bytes.iter().map(|b| json!(b)).collect())
}

#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    contracts: ContractsConfig,
}

impl PayloadBuilder {
    pub fn new(contracts: ContractsConfig) -> Self {
        Self { contracts }
    }

    pub fn contracts(&self) -> &ContractsConfig {
        &self.contracts
    }

    pub fn send(&self, to: &str, raw_amount: u64, coin_type: &str) -> EntryFunctionPayload {
        EntryFunctionPayload::new(
            format!("{}::{}", self.contracts.core_module(), SEND_STABLECOIN),
            vec![coin_type.to_string()],
            vec![json!(to), u64_arg(raw_amount)],
        )
    }

    pub fn batch_pay(
        &self,
        addresses: &[&str],
        raw_amounts: &[u64],
        coin_type: &str,
        memo: &[u8],
    ) -> EntryFunctionPayload {
        EntryFunctionPayload::new(
            format!("{}::{}", self.contracts.business_module(), BATCH_PAY),
            vec![coin_type.to_string()],
            vec![
                json!(addresses),
                Value::Array(raw_amounts.iter().copied().map(u64_arg).collect()),
                bytes_arg(memo),
            ],
        )
    }

    pub fn swap_request(
        &self,
        coin_in: &str,
        coin_out: &str,
        raw_amount: u64,
        min_out: u64,
    ) -> EntryFunctionPayload {
        EntryFunctionPayload::new(
            format!("{}::{}", self.contracts.core_module(), SWAP_REQUEST),
            vec![coin_in.to_string(), coin_out.to_string()],
            vec![u64_arg(raw_amount), u64_arg(min_out), json!(UNIT_RATE)],
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::currency::APTOS_COIN;

    fn builder() -> PayloadBuilder {
        PayloadBuilder::new(ContractsConfig {
            core_address: "0xcafe".into(),
            business_address: "0xbeef".into(),
            batch_pay_enabled: true,
            coin_types: BTreeMap::from([("APT".to_string(), APTOS_COIN.to_string())]),
        })
    }

    #[test]
    fn test_send_payload() {
        let payload = builder().send("0xb0b", 150_000_000, APTOS_COIN);
        let value = payload.to_value();
        assert_eq!(value["type"], "entry_function_payload");
        assert_eq!(value["function"], "0xcafe::GlobePayXCore::send_stablecoin");
        assert_eq!(value["type_arguments"], json!([APTOS_COIN]));
        assert_eq!(value["arguments"], json!(["0xb0b", "150000000"]));
    }

    #[test]
    fn test_batch_payload_encodes_memo_as_bytes() {
        let payload = builder().batch_pay(&["0x1", "0x2"], &[10, 20], APTOS_COIN, b"hi");
        assert_eq!(payload.function, "0xbeef::GlobePayXBusiness::batch_pay");
        assert_eq!(payload.arguments[0], json!(["0x1", "0x2"]));
        assert_eq!(payload.arguments[1], json!(["10", "20"]));
        assert_eq!(payload.arguments[2], json!([104, 105]));
    }

    #[test]
    fn test_swap_payload() {
        let payload = builder().swap_request(APTOS_COIN, "0xcafe::usdc::USDC", 500, 0);
        assert_eq!(payload.type_arguments.len(), 2);
        assert_eq!(payload.arguments, vec![json!("500"), json!("0"), json!(UNIT_RATE)]);
    }

    #[test]
    fn test_default_memo() {
        assert_eq!(default_batch_memo(3), "Payroll batch - 3 recipients");
    }
}
