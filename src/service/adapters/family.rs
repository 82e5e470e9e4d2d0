//! 钱包家族描述
//!
//! 每个家族的注入键、方法名和冲突规则。探测器和适配器共用这一份描述，
//! 新增钱包家族只需要在这里登记。

use crate::domain::ProviderKind;

/// Ethereum 风格的统一入口
pub const ETHEREUM_REQUEST_METHOD: &str = "request";

pub const CONNECT_METHODS: &[&str] = &["connect"];
pub const COMBINED_SUBMIT_METHODS: &[&str] = &["signAndSubmitTransaction", "signAndSubmit"];
pub const SIGN_METHODS: &[&str] = &["signTransaction", "sign"];
pub const SUBMIT_METHOD: &str = "submitTransaction";
pub const ACCOUNT_METHOD: &str = "account";
pub const DISCONNECT_METHOD: &str = "disconnect";

#[derive(Debug)]
pub struct FamilySpec {
    pub kind: ProviderKind,
    /// 按顺序查找，使用第一个存在的注入对象
    pub injection_keys: &'static [&'static str],
    /// 存在 `request` 入口即视为 Ethereum 钱包
    pub request_is_foreign: bool,
}

impl FamilySpec {
    /// 能证明对象属于该家族的方法
    pub fn capability_methods(&self) -> impl Iterator<Item = &'static str> {
        CONNECT_METHODS
            .iter()
            .chain(COMBINED_SUBMIT_METHODS)
            .chain(SIGN_METHODS)
            .copied()
    }
}

pub static PETRA: FamilySpec = FamilySpec {
    kind: ProviderKind::Petra,
    injection_keys: &["aptos", "petra"],
    // Petra 自身也可能带 request，只要同时有 Aptos 方法就接受
    request_is_foreign: false,
};

pub static MARTIAN: FamilySpec = FamilySpec {
    kind: ProviderKind::Martian,
    injection_keys: &["martian"],
    request_is_foreign: true,
};

pub static PONTEM: FamilySpec = FamilySpec {
    kind: ProviderKind::Pontem,
    injection_keys: &["pontem"],
    request_is_foreign: true,
};

pub fn family(kind: ProviderKind) -> &'static FamilySpec {
    match kind {
        ProviderKind::Petra => &PETRA,
        ProviderKind::Martian => &MARTIAN,
        ProviderKind::Pontem => &PONTEM,
    }
}
