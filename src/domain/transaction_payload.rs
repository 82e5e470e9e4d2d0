//! Move entry function 调用载荷
//! 这是钱包扩展 `signAndSubmitTransaction` 接受的 JSON 形态

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ENTRY_FUNCTION_PAYLOAD: &str = "entry_function_payload";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFunctionPayload {
    #[serde(rename = "type")]
    pub payload_type: String,
    /// `<address>::<module>::<function>`
    pub function: String,
    pub type_arguments: Vec<String>,
    /// u64 以十进制字符串传递，字节序列以数字数组传递
    pub arguments: Vec<Value>,
}

impl EntryFunctionPayload {
    pub fn new(function: impl Into<String>, type_arguments: Vec<String>, arguments: Vec<Value>) -> Self {
        Self {
            payload_type: ENTRY_FUNCTION_PAYLOAD.to_string(),
            function: function.into(),
            type_arguments,
            arguments,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "type": self.payload_type,
            "function": self.function,
            "type_arguments": self.type_arguments,
            "arguments": self.arguments,
        })
    }
}

/// 提交给适配器的签名请求
#[derive(Debug, Clone, PartialEq)]
pub struct SignRequest {
    pub payload: EntryFunctionPayload,
    /// 当前会话地址，provider 不暴露账户时用于构建未签名交易
    pub sender: Option<String>,
    /// 调用方预先签好的交易，没有任何签名路径时直接提交到账本
    pub signed_transaction: Option<Value>,
}

impl SignRequest {
    pub fn new(payload: EntryFunctionPayload) -> Self {
        Self {
            payload,
            sender: None,
            signed_transaction: None,
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_signed_transaction(mut self, signed: Value) -> Self {
        self.signed_transaction = Some(signed);
        self
    }
}
