//! 地址验证模块
//!
//! Aptos 账户地址：`0x` 前缀 + 1..=64 位十六进制。短地址（如 `0x1`）
//! 左侧补零后与完整地址等价。

use crate::error::{Result, WalletError};

const ADDRESS_HEX_LEN: usize = 64;

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 验证地址格式
    pub fn validate(address: &str) -> Result<()> {
        if Self::is_valid(address) {
            Ok(())
        } else {
            Err(WalletError::InvalidAddress {
                address: address.to_string(),
            })
        }
    }

    pub fn is_valid(address: &str) -> bool {
        let Some(hex_part) = address.trim().strip_prefix("0x") else {
            return false;
        };
        !hex_part.is_empty()
            && hex_part.len() <= ADDRESS_HEX_LEN
            && hex_part.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// 规范化为 64 位小写完整形式
    pub fn normalize(address: &str) -> Result<String> {
        Self::validate(address)?;
        let hex_part = address.trim().trim_start_matches("0x").to_lowercase();
        Ok(format!("0x{:0>width$}", hex_part, width = ADDRESS_HEX_LEN))
    }

    /// 两个地址是否指向同一账户（忽略大小写和前导零）
    pub fn same_account(a: &str, b: &str) -> bool {
        match (Self::normalize(a), Self::normalize(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    /// 日志中使用的缩略形式；按字符截取，provider 返回的任意字符串都安全
    pub fn short(address: &str) -> String {
        let address = address.trim();
        let count = address.chars().count();
        if count <= 12 {
            return address.to_string();
        }
        let head: String = address.chars().take(6).collect();
        let tail: String = address.chars().skip(count - 4).collect();
        format!("{}...{}", head, tail)
    }
}
