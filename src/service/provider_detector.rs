//! 钱包 provider 探测
//!
//! 扫描宿主环境中各家族的注入对象，按能力分类并排除冒充者。
//! 探测只读取标记和方法表，从不调用 provider 的任何方法。
//! 分类结果携带能力形态（`ProviderShape`），适配器据此分派调用。

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{
    domain::ProviderKind,
    infrastructure::host::{HostEnvironment, HostError, InjectedProvider},
    service::adapters::family::{
        self, FamilySpec, ACCOUNT_METHOD, COMBINED_SUBMIT_METHODS, CONNECT_METHODS,
        DISCONNECT_METHOD, ETHEREUM_REQUEST_METHOD, SIGN_METHODS, SUBMIT_METHOD,
    },
};

/// 提交路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitShape {
    /// 一步完成签名和提交
    Combined(&'static str),
    /// 先签名，再由 provider 或账本 RPC 提交
    SignThenSubmit {
        sign: &'static str,
        submit_via_provider: bool,
    },
    /// 没有任何签名入口
    Unsupported,
}

/// 读取当前账户的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountShape {
    Method,
    Field,
    Unsupported,
}

/// 探测时确定的能力形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderShape {
    pub connect: Option<&'static str>,
    pub submit: SubmitShape,
    pub account: AccountShape,
    pub disconnect: bool,
}

impl ProviderShape {
    fn probe(provider: &dyn InjectedProvider) -> Self {
        let connect = CONNECT_METHODS
            .iter()
            .copied()
            .find(|m| provider.has_method(m));

        let submit = if let Some(m) = COMBINED_SUBMIT_METHODS
            .iter()
            .copied()
            .find(|m| provider.has_method(m))
        {
            SubmitShape::Combined(m)
        } else if let Some(sign) = SIGN_METHODS.iter().copied().find(|m| provider.has_method(m)) {
            SubmitShape::SignThenSubmit {
                sign,
                submit_via_provider: provider.has_method(SUBMIT_METHOD),
            }
        } else {
            SubmitShape::Unsupported
        };

        let account = if provider.has_method(ACCOUNT_METHOD) {
            AccountShape::Method
        } else if provider.field(ACCOUNT_METHOD).is_some() || provider.field("address").is_some() {
            AccountShape::Field
        } else {
            AccountShape::Unsupported
        };

        Self {
            connect,
            submit,
            account,
            disconnect: provider.has_method(DISCONNECT_METHOD),
        }
    }
}

/// 已接受的 provider
#[derive(Clone)]
pub struct ProviderHandle {
    pub kind: ProviderKind,
    pub injection_key: &'static str,
    pub shape: ProviderShape,
    pub provider: Arc<dyn InjectedProvider>,
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("kind", &self.kind)
            .field("injection_key", &self.injection_key)
            .field("shape", &self.shape)
            .finish()
    }
}

/// 单个家族的分类结论
#[derive(Debug, Clone)]
pub enum Classification {
    /// 没有注入对象（或宿主不可用、探测异常）
    Absent,
    /// 注入对象属于其他钱包体系
    Impostor {
        injection_key: &'static str,
        reason: String,
    },
    /// 注入对象没有任何该家族的方法
    Incapable { injection_key: &'static str },
    Accepted(ProviderHandle),
}

impl Classification {
    pub fn handle(&self) -> Option<&ProviderHandle> {
        match self {
            Self::Accepted(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// 一次完整探测的结果，调用方自行选择使用哪个家族
#[derive(Debug, Clone, Default)]
pub struct DetectedProviders {
    verdicts: BTreeMap<ProviderKind, Classification>,
}

impl DetectedProviders {
    pub fn get(&self, kind: ProviderKind) -> Option<&ProviderHandle> {
        self.verdicts.get(&kind).and_then(Classification::handle)
    }

    pub fn classification(&self, kind: ProviderKind) -> Option<&Classification> {
        self.verdicts.get(&kind)
    }

    /// 按 petra, martian, pontem 的顺序返回第一个可用家族
    pub fn first_available(&self) -> Option<ProviderKind> {
        ProviderKind::ALL.into_iter().find(|k| self.get(*k).is_some())
    }

    /// 第一个有注入对象（无论是否被接受）的家族
    pub fn first_injected(&self) -> Option<ProviderKind> {
        ProviderKind::ALL.into_iter().find(|k| {
            self.verdicts
                .get(k)
                .map(|c| !c.is_absent())
                .unwrap_or(false)
        })
    }

    pub fn available_kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|k| self.get(*k).is_some())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.first_available().is_none()
    }
}

#[derive(Clone)]
pub struct ProviderDetector {
    host: Arc<dyn HostEnvironment>,
}

impl ProviderDetector {
    pub fn new(host: Arc<dyn HostEnvironment>) -> Self {
        Self { host }
    }

    pub fn detect(&self) -> DetectedProviders {
        let verdicts = ProviderKind::ALL
            .into_iter()
            .map(|kind| (kind, self.classify(kind)))
            .collect();
        DetectedProviders { verdicts }
    }

    pub fn classify(&self, kind: ProviderKind) -> Classification {
        let spec = family::family(kind);
        match self.lookup(spec) {
            Some((key, provider)) => classify_provider(spec, key, provider),
            None => Classification::Absent,
        }
    }

    pub fn is_available(&self, kind: ProviderKind) -> bool {
        self.classify(kind).is_accepted()
    }

    /// 第一个存在的注入键
    fn lookup(&self, spec: &FamilySpec) -> Option<(&'static str, Arc<dyn InjectedProvider>)> {
        for key in spec.injection_keys.iter().copied() {
            match self.host.global(key) {
                Ok(Some(provider)) => return Some((key, provider)),
                Ok(None) => continue,
                Err(HostError::Unavailable) => return None,
                Err(HostError::Probe(reason)) => {
                    tracing::debug!(kind = %spec.kind, key = %key, reason = %reason, "provider probe failed");
                    continue;
                }
            }
        }
        None
    }
}

fn classify_provider(
    spec: &FamilySpec,
    injection_key: &'static str,
    provider: Arc<dyn InjectedProvider>,
) -> Classification {
    if let Some(marker) = provider.flags().foreign_marker() {
        tracing::debug!(kind = %spec.kind, key = %injection_key, marker = %marker, "rejected foreign provider");
        return Classification::Impostor {
            injection_key,
            reason: format!("provider carries {}", marker),
        };
    }

    let capable = spec.capability_methods().any(|m| provider.has_method(m));
    let has_request = provider.has_method(ETHEREUM_REQUEST_METHOD);

    if has_request && (spec.request_is_foreign || !capable) {
        return Classification::Impostor {
            injection_key,
            reason: "provider exposes an Ethereum-style request entry point".to_string(),
        };
    }

    if !capable {
        return Classification::Incapable { injection_key };
    }

    Classification::Accepted(ProviderHandle {
        kind: spec.kind,
        injection_key,
        shape: ProviderShape::probe(provider.as_ref()),
        provider,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::infrastructure::{
        host::{HeadlessHost, ProviderFlags, StaticHost},
        scripted_provider::ScriptedProvider,
    };

    fn detector(host: StaticHost) -> ProviderDetector {
        ProviderDetector::new(Arc::new(host))
    }

    #[test]
    fn test_headless_host_has_no_providers() {
        let detected = ProviderDetector::new(Arc::new(HeadlessHost)).detect();
        assert!(detected.is_empty());
        assert!(detected.first_injected().is_none());
    }

    #[test]
    fn test_petra_shape() {
        let provider = ScriptedProvider::new()
            .respond_ok("connect", json!({}))
            .respond_ok("signAndSubmitTransaction", json!({}))
            .respond_ok("account", json!({}))
            .respond_ok("disconnect", json!(null));
        let host = StaticHost::new().with_global("aptos", Arc::new(provider));

        let detected = detector(host).detect();
        let handle = detected.get(ProviderKind::Petra).unwrap();
        assert_eq!(handle.injection_key, "aptos");
        assert_eq!(handle.shape.connect, Some("connect"));
        assert_eq!(
            handle.shape.submit,
            SubmitShape::Combined("signAndSubmitTransaction")
        );
        assert_eq!(handle.shape.account, AccountShape::Method);
        assert!(handle.shape.disconnect);
        assert_eq!(detected.available_kinds(), vec![ProviderKind::Petra]);
    }

    #[test]
    fn test_petra_falls_back_to_petra_key() {
        let provider = ScriptedProvider::new().respond_ok("connect", json!({}));
        let host = StaticHost::new().with_global("petra", Arc::new(provider));
        let handle = detector(host).classify(ProviderKind::Petra);
        assert_eq!(handle.handle().unwrap().injection_key, "petra");
    }

    #[test]
    fn test_sign_then_submit_shape() {
        let provider = ScriptedProvider::new()
            .respond_ok("connect", json!({}))
            .respond_ok("signTransaction", json!({}))
            .with_field("address", json!("0x1"));
        let host = StaticHost::new().with_global("pontem", Arc::new(provider));

        let handle = detector(host).detect().get(ProviderKind::Pontem).cloned().unwrap();
        assert_eq!(
            handle.shape.submit,
            SubmitShape::SignThenSubmit {
                sign: "signTransaction",
                submit_via_provider: false
            }
        );
        assert_eq!(handle.shape.account, AccountShape::Field);
    }

    #[test]
    fn test_metamask_flag_rejected_for_every_family() {
        let flagged = || {
            Arc::new(
                ScriptedProvider::new()
                    .respond_ok("connect", json!({}))
                    .with_flags(ProviderFlags {
                        is_meta_mask: true,
                        is_ethereum: false,
                    }),
            )
        };
        let host = StaticHost::new()
            .with_global("aptos", flagged())
            .with_global("martian", flagged())
            .with_global("pontem", flagged());

        let detected = detector(host).detect();
        assert!(detected.is_empty());
        for kind in ProviderKind::ALL {
            assert!(matches!(
                detected.classification(kind),
                Some(Classification::Impostor { .. })
            ));
        }
        assert_eq!(detected.first_injected(), Some(ProviderKind::Petra));
    }

    #[test]
    fn test_request_only_is_impostor() {
        let provider = ScriptedProvider::new().respond_ok("request", json!(null));
        let host = StaticHost::new().with_global("aptos", Arc::new(provider));
        assert!(matches!(
            detector(host).classify(ProviderKind::Petra),
            Classification::Impostor { .. }
        ));
    }

    #[test]
    fn test_request_rules_per_family() {
        let mixed = || {
            Arc::new(
                ScriptedProvider::new()
                    .respond_ok("connect", json!({}))
                    .respond_ok("request", json!(null)),
            )
        };
        let host = StaticHost::new()
            .with_global("aptos", mixed())
            .with_global("martian", mixed());
        let detector = detector(host);

        assert!(detector.is_available(ProviderKind::Petra));
        assert!(!detector.is_available(ProviderKind::Martian));
    }

    #[test]
    fn test_object_without_methods_is_incapable() {
        let host = StaticHost::new().with_global("martian", Arc::new(ScriptedProvider::new()));
        assert!(matches!(
            detector(host).classify(ProviderKind::Martian),
            Classification::Incapable { .. }
        ));
    }
}
