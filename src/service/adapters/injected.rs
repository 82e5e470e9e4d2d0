//! 注入式钱包适配器（Petra / Martian / Pontem）
//!
//! connect 依次尝试无参调用和 `{ silently: true }` 调用；
//! sign_and_submit 依次尝试一步签名提交、先签名后提交、直接提交预签名交易。
//! provider 抛出的提到 MetaMask/Ethereum 的错误统一改写为 `WrongProviderFamily`。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{family::FamilySpec, ConnectResult, SubmitResult, WalletAdapter};
use crate::{
    domain::{ProviderKind, SignRequest},
    error::{
        indicates_foreign_family, indicates_transaction_rejection, indicates_user_rejection,
        Result, WalletError,
    },
    infrastructure::{host::ProviderCallError, ledger_client::LedgerRpc},
    service::{
        adapters::family::{ACCOUNT_METHOD, DISCONNECT_METHOD, SUBMIT_METHOD},
        provider_detector::{
            AccountShape, Classification, ProviderDetector, ProviderHandle, SubmitShape,
        },
    },
    utils::address_validator::AddressValidator,
};

const USER_REJECTED_CODE: i64 = 4001;

pub struct InjectedAdapter {
    spec: &'static FamilySpec,
    detector: ProviderDetector,
    ledger: Arc<dyn LedgerRpc>,
}

impl InjectedAdapter {
    pub fn new(
        spec: &'static FamilySpec,
        detector: ProviderDetector,
        ledger: Arc<dyn LedgerRpc>,
    ) -> Self {
        Self {
            spec,
            detector,
            ledger,
        }
    }

    /// 已接受的 provider，否则返回对应的类型化错误
    fn accepted(&self) -> Result<ProviderHandle> {
        match self.detector.classify(self.spec.kind) {
            Classification::Accepted(handle) => Ok(handle),
            Classification::Absent => Err(WalletError::NoProviderFound {
                kind: Some(self.spec.kind),
            }),
            Classification::Impostor { reason, .. } => Err(WalletError::WrongProviderFamily {
                kind: self.spec.kind,
                detail: reason,
            }),
            Classification::Incapable { injection_key } => Err(WalletError::ProviderUnavailable {
                kind: self.spec.kind,
                reason: format!("window.{} exposes no wallet methods", injection_key),
            }),
        }
    }

    async fn invoke(
        &self,
        handle: &ProviderHandle,
        method: &str,
        args: Vec<Value>,
    ) -> std::result::Result<Value, ProviderCallError> {
        tracing::debug!(kind = %self.spec.kind, method = %method, "invoking provider method");
        handle.provider.invoke(method, args).await
    }

    async fn submit_presigned(&self, signed: &Value) -> Result<SubmitResult> {
        let hash = self
            .ledger
            .submit_signed_transaction(signed)
            .await
            .map_err(WalletError::into_submission_error)?;
        Ok(SubmitResult {
            hash: Some(hash.clone()),
            raw: json!({ "hash": hash }),
        })
    }

    /// provider 没有暴露账户时使用会话地址
    fn sender_for(&self, handle: &ProviderHandle, request: &SignRequest) -> Result<String> {
        if let Some(address) = handle.provider.field("address").as_ref().and_then(extract_address) {
            return Ok(address);
        }
        if let Some(address) = handle.provider.field(ACCOUNT_METHOD).as_ref().and_then(extract_address) {
            return Ok(address);
        }
        request
            .sender
            .clone()
            .ok_or_else(|| WalletError::ProviderUnavailable {
                kind: self.spec.kind,
                reason: "cannot determine sender address for transaction generation".into(),
            })
    }

    async fn sign_then_submit(
        &self,
        handle: &ProviderHandle,
        request: &SignRequest,
        sign: &'static str,
        submit_via_provider: bool,
    ) -> Result<SubmitResult> {
        let sender = self.sender_for(handle, request)?;
        let unsigned = self.ledger.build_transaction(&sender, &request.payload).await?;

        let signed = self
            .invoke(handle, sign, vec![unsigned])
            .await
            .map_err(|e| normalize_submit_error(self.spec.kind, e))?;

        if submit_via_provider {
            let raw = self
                .invoke(handle, SUBMIT_METHOD, vec![signed])
                .await
                .map_err(|e| normalize_submit_error(self.spec.kind, e))?;
            return Ok(SubmitResult {
                hash: extract_hash(&raw),
                raw,
            });
        }

        self.submit_presigned(&signed).await
    }
}

#[async_trait]
impl WalletAdapter for InjectedAdapter {
    fn kind(&self) -> ProviderKind {
        self.spec.kind
    }

    fn is_available(&self) -> bool {
        self.detector.is_available(self.spec.kind)
    }

    async fn connect(&self) -> Result<ConnectResult> {
        let handle = self.accepted()?;
        let kind = self.spec.kind;
        let method = handle
            .shape
            .connect
            .ok_or_else(|| WalletError::ProviderUnavailable {
                kind,
                reason: "provider has no connect method".into(),
            })?;

        let raw = match self.invoke(&handle, method, vec![]).await {
            Ok(raw) => raw,
            Err(first) if is_foreign(&first) => return Err(normalize_error(kind, first)),
            Err(first) => {
                tracing::debug!(kind = %kind, error = %first, "connect failed, retrying with options");
                self.invoke(&handle, method, vec![json!({ "silently": true })])
                    .await
                    .map_err(|e| normalize_error(kind, e))?
            }
        };

        let address = match extract_address(&raw) {
            Some(address) => Some(address),
            None => self.current_account().await?,
        }
        .ok_or_else(|| WalletError::ProviderResponse {
            kind,
            message: "connect returned no account address".into(),
        })?;

        if !AddressValidator::is_valid(&address) {
            return Err(WalletError::ProviderResponse {
                kind,
                message: format!("connect returned a malformed address: {}", address),
            });
        }

        tracing::info!(
            kind = %kind,
            address = %AddressValidator::short(&address),
            "wallet provider connected"
        );
        Ok(ConnectResult { address, raw })
    }

    async fn disconnect(&self) {
        let Ok(handle) = self.accepted() else {
            return;
        };
        if !handle.shape.disconnect {
            return;
        }
        if let Err(e) = self.invoke(&handle, DISCONNECT_METHOD, vec![]).await {
            tracing::warn!(kind = %self.spec.kind, error = %e, "provider disconnect failed");
        }
    }

    async fn sign_and_submit(&self, request: &SignRequest) -> Result<SubmitResult> {
        let handle = match self.accepted() {
            Ok(handle) => handle,
            Err(err @ WalletError::WrongProviderFamily { .. }) => return Err(err),
            Err(err) => {
                return match &request.signed_transaction {
                    Some(signed) => {
                        tracing::info!(kind = %self.spec.kind, "no usable provider, submitting pre-signed transaction");
                        self.submit_presigned(signed).await
                    }
                    None => Err(err),
                };
            }
        };

        let result = match handle.shape.submit {
            SubmitShape::Combined(method) => {
                let raw = self
                    .invoke(&handle, method, vec![request.payload.to_value()])
                    .await
                    .map_err(|e| normalize_submit_error(self.spec.kind, e))?;
                SubmitResult {
                    hash: extract_hash(&raw),
                    raw,
                }
            }
            SubmitShape::SignThenSubmit {
                sign,
                submit_via_provider,
            } => {
                self.sign_then_submit(&handle, request, sign, submit_via_provider)
                    .await?
            }
            SubmitShape::Unsupported => match &request.signed_transaction {
                Some(signed) => self.submit_presigned(signed).await?,
                None => {
                    return Err(WalletError::ProviderUnavailable {
                        kind: self.spec.kind,
                        reason: "no supported signAndSubmit method found".into(),
                    })
                }
            },
        };

        if result.hash.is_none() {
            tracing::warn!(kind = %self.spec.kind, "provider response carried no transaction hash");
        }
        Ok(result)
    }

    async fn current_account(&self) -> Result<Option<String>> {
        let handle = match self.accepted() {
            Ok(handle) => handle,
            Err(WalletError::NoProviderFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        match handle.shape.account {
            AccountShape::Method => {
                let raw = self
                    .invoke(&handle, ACCOUNT_METHOD, vec![])
                    .await
                    .map_err(|e| normalize_error(self.spec.kind, e))?;
                Ok(extract_address(&raw))
            }
            AccountShape::Field => Ok(handle
                .provider
                .field(ACCOUNT_METHOD)
                .as_ref()
                .and_then(extract_address)
                .or_else(|| handle.provider.field("address").as_ref().and_then(extract_address))),
            AccountShape::Unsupported => Ok(None),
        }
    }
}

fn is_foreign(err: &ProviderCallError) -> bool {
    indicates_foreign_family(&err.message)
        || err.name.as_deref().map(indicates_foreign_family).unwrap_or(false)
}

/// provider 错误 → WalletError
pub fn normalize_error(kind: ProviderKind, err: ProviderCallError) -> WalletError {
    if is_foreign(&err) {
        return WalletError::WrongProviderFamily {
            kind,
            detail: err.message,
        };
    }
    WalletError::ProviderResponse {
        kind,
        message: err.to_string(),
    }
}

/// 提交阶段的错误，用户拒签和交易本身被拒归为 SubmissionRejected
pub fn normalize_submit_error(kind: ProviderKind, err: ProviderCallError) -> WalletError {
    if !is_foreign(&err)
        && (err.code == Some(USER_REJECTED_CODE)
            || indicates_user_rejection(&err.message)
            || indicates_transaction_rejection(&err.message))
    {
        return WalletError::SubmissionRejected {
            reason: err.message,
        };
    }
    normalize_error(kind, err)
}

/// 从 `hash` / `transaction_hash` / `result.hash` / `res.hash` 或纯字符串中取交易哈希
pub fn extract_hash(raw: &Value) -> Option<String> {
    let non_empty = |v: &Value| v.as_str().filter(|s| !s.is_empty()).map(String::from);

    if let Some(hash) = non_empty(raw) {
        return Some(hash);
    }
    raw.get("hash")
        .and_then(non_empty)
        .or_else(|| raw.get("transaction_hash").and_then(non_empty))
        .or_else(|| raw.pointer("/result/hash").and_then(non_empty))
        .or_else(|| raw.pointer("/res/hash").and_then(non_empty))
}

/// 从 `address` / `account.address` / `account` 或纯字符串中取账户地址
pub fn extract_address(raw: &Value) -> Option<String> {
    let non_empty = |v: &Value| {
        v.as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    if let Some(address) = non_empty(raw) {
        return Some(address);
    }
    raw.get("address")
        .and_then(non_empty)
        .or_else(|| raw.pointer("/account/address").and_then(non_empty))
        .or_else(|| raw.get("account").and_then(non_empty))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_hash_shapes() {
        assert_eq!(extract_hash(&json!("0xabc")), Some("0xabc".into()));
        assert_eq!(extract_hash(&json!({ "hash": "0x1" })), Some("0x1".into()));
        assert_eq!(
            extract_hash(&json!({ "transaction_hash": "0x2" })),
            Some("0x2".into())
        );
        assert_eq!(
            extract_hash(&json!({ "result": { "hash": "0x3" } })),
            Some("0x3".into())
        );
        assert_eq!(
            extract_hash(&json!({ "res": { "hash": "0x4" } })),
            Some("0x4".into())
        );
        assert_eq!(extract_hash(&json!({ "status": "ok" })), None);
        assert_eq!(extract_hash(&json!("")), None);
    }

    #[test]
    fn test_extract_address_shapes() {
        assert_eq!(extract_address(&json!({ "address": "0x1" })), Some("0x1".into()));
        assert_eq!(
            extract_address(&json!({ "account": { "address": "0x2" } })),
            Some("0x2".into())
        );
        assert_eq!(extract_address(&json!({ "account": "0x3" })), Some("0x3".into()));
        assert_eq!(extract_address(&json!("0x4")), Some("0x4".into()));
        assert_eq!(extract_address(&json!({ "publicKey": "0x5" })), None);
        assert_eq!(extract_address(&Value::Null), None);
    }

    #[test]
    fn test_error_normalization() {
        let kind = ProviderKind::Petra;

        let err = normalize_error(
            kind,
            ProviderCallError::new("MetaMask: this method is not supported"),
        );
        assert!(matches!(err, WalletError::WrongProviderFamily { .. }));

        let err = normalize_submit_error(
            kind,
            ProviderCallError {
                name: Some("PetraApiError".into()),
                message: "The user rejected the request".into(),
                code: Some(4001),
            },
        );
        assert!(matches!(err, WalletError::SubmissionRejected { .. }));

        let err = normalize_submit_error(kind, ProviderCallError::new("INSUFFICIENT_BALANCE"));
        assert_eq!(err.code(), "submission_rejected");

        let err = normalize_submit_error(kind, ProviderCallError::new("internal error"));
        assert!(matches!(err, WalletError::ProviderResponse { .. }));
    }
}
