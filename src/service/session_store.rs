//! 钱包会话存储
//!
//! 状态机：`Disconnected → Connecting → Connected`，`Connected → Disconnected`。
//! 同一时间只允许一个 connect；连接过程中的任何失败（包括 future 被 drop）
//! 都回到 Disconnected，外部观察不到半连接状态。
//! 持久化只保存地址、钱包类型和网络，加载时必须经 provider 重新确认。

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};

use tokio::sync::watch;

use crate::{
    domain::{Network, PersistedSession, ProviderKind, SessionPhase, WalletSession},
    error::{Result, WalletError},
    infrastructure::kv_store::KvStore,
    service::{
        adapters::{AdapterRegistry, WalletAdapter},
        provider_detector::ProviderDetector,
    },
    utils::address_validator::AddressValidator,
};

/// 会话元数据的持久化键
pub const SESSION_STORAGE_KEY: &str = "wallet-storage";

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    Disconnected { network: Network },
    Connecting { attempt: u64, network: Network },
    Connected(WalletSession),
}

impl SessionState {
    fn network(&self) -> Network {
        match self {
            Self::Disconnected { network } | Self::Connecting { network, .. } => *network,
            Self::Connected(session) => session.network(),
        }
    }

    fn phase(&self) -> SessionPhase {
        match self {
            Self::Disconnected { .. } => SessionPhase::Disconnected,
            Self::Connecting { .. } => SessionPhase::Connecting,
            Self::Connected(_) => SessionPhase::Connected,
        }
    }

    fn snapshot(&self) -> WalletSession {
        match self {
            Self::Connected(session) => session.clone(),
            other => WalletSession::disconnected(other.network()),
        }
    }
}

pub struct SessionStore {
    detector: ProviderDetector,
    registry: AdapterRegistry,
    kv: Arc<dyn KvStore>,
    preferred: Option<ProviderKind>,
    state: Mutex<SessionState>,
    attempts: AtomicU64,
    updates: watch::Sender<WalletSession>,
}

/// connect 未完成就被 drop 时把状态恢复为 Disconnected
struct ConnectGuard<'a> {
    store: &'a SessionStore,
    attempt: u64,
    armed: bool,
}

impl ConnectGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let reset = {
            let mut state = self.store.lock();
            match *state {
                SessionState::Connecting { attempt, network } if attempt == self.attempt => {
                    *state = SessionState::Disconnected { network };
                    true
                }
                _ => false,
            }
        };
        if reset {
            tracing::debug!(attempt = self.attempt, "connect attempt abandoned");
            self.store.publish();
        }
    }
}

impl SessionStore {
    pub fn new(
        detector: ProviderDetector,
        registry: AdapterRegistry,
        kv: Arc<dyn KvStore>,
        network: Network,
    ) -> Self {
        let (updates, _) = watch::channel(WalletSession::disconnected(network));
        Self {
            detector,
            registry,
            kv,
            preferred: None,
            state: Mutex::new(SessionState::Disconnected { network }),
            attempts: AtomicU64::new(0),
            updates,
        }
    }

    /// 自动连接时优先尝试的钱包
    pub fn with_preferred(mut self, kind: Option<ProviderKind>) -> Self {
        self.preferred = kind;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self) {
        let snapshot = self.lock().snapshot();
        self.updates.send_replace(snapshot);
    }

    pub fn snapshot(&self) -> WalletSession {
        self.lock().snapshot()
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().phase()
    }

    /// 会话快照的变更通知
    pub fn subscribe(&self) -> watch::Receiver<WalletSession> {
        self.updates.subscribe()
    }

    pub fn detector(&self) -> &ProviderDetector {
        &self.detector
    }

    pub fn adapter(&self, kind: ProviderKind) -> Result<Arc<dyn WalletAdapter>> {
        self.registry
            .get(kind)
            .ok_or(WalletError::NoProviderFound { kind: Some(kind) })
    }

    /// 要连接的家族：显式指定 > 偏好且可用 > 第一个可用 > 第一个有注入对象的
    fn select_kind(&self, requested: Option<ProviderKind>) -> Result<ProviderKind> {
        if let Some(kind) = requested {
            return Ok(kind);
        }
        let detected = self.detector.detect();
        if let Some(kind) = self.preferred.filter(|k| detected.get(*k).is_some()) {
            return Ok(kind);
        }
        detected
            .first_available()
            .or_else(|| detected.first_injected())
            .ok_or(WalletError::NoProviderFound { kind: None })
    }

    /// 连接钱包；`None` 表示自动选择
    pub async fn connect(&self, requested: Option<ProviderKind>) -> Result<WalletSession> {
        let (attempt, network, previous) = {
            let mut state = self.lock();
            let previous = match &*state {
                SessionState::Connecting { .. } => return Err(WalletError::ConnectInProgress),
                SessionState::Connected(session) => {
                    if requested.is_none() || requested == session.provider_kind() {
                        return Ok(session.clone());
                    }
                    session.provider_kind()
                }
                SessionState::Disconnected { .. } => None,
            };
            let network = state.network();
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            *state = SessionState::Connecting { attempt, network };
            (attempt, network, previous)
        };
        self.publish();
        let guard = ConnectGuard {
            store: self,
            attempt,
            armed: true,
        };

        // 切换钱包：先断开旧的
        if let Some(kind) = previous {
            tracing::info!(from = %kind, to = ?requested, "switching wallet provider");
            if let Ok(adapter) = self.adapter(kind) {
                adapter.disconnect().await;
            }
            self.clear_persisted(network).await;
        }

        let result = self.establish(requested).await;
        let (kind, address) = match result {
            Ok(connected) => connected,
            Err(e) => {
                tracing::warn!(requested = ?requested, error = %e, code = e.code(), "wallet connect failed");
                crate::metrics::inc_connect(
                    requested.map(|k| k.as_str()).unwrap_or("auto"),
                    false,
                );
                return Err(e);
            }
        };

        let session = WalletSession::connected(address, kind, network);
        {
            let mut state = self.lock();
            match *state {
                SessionState::Connecting { attempt: current, .. } if current == attempt => {
                    *state = SessionState::Connected(session.clone());
                }
                _ => {
                    tracing::info!(kind = %kind, "connect superseded before completion");
                    return Err(WalletError::ConnectCancelled);
                }
            }
        }
        guard.disarm();
        self.publish();
        self.persist(&session.to_persisted()).await;
        crate::metrics::inc_connect(kind.as_str(), true);

        tracing::info!(
            kind = %kind,
            address = %AddressValidator::short(session.address().unwrap_or_default()),
            network = %network,
            "wallet session connected"
        );
        Ok(session)
    }

    async fn establish(&self, requested: Option<ProviderKind>) -> Result<(ProviderKind, String)> {
        let kind = self.select_kind(requested)?;
        let adapter = self.adapter(kind)?;
        let connected = adapter.connect().await?;
        Ok((kind, connected.address))
    }

    /// 断开连接；本地状态总是被清除，provider 的 disconnect 失败只记录日志
    pub async fn disconnect(&self) {
        let (previous, network) = {
            let mut state = self.lock();
            let network = state.network();
            let previous = match &*state {
                SessionState::Connected(session) => session.provider_kind(),
                _ => None,
            };
            // 进行中的 connect 会因 attempt 不匹配而取消
            *state = SessionState::Disconnected { network };
            (previous, network)
        };
        self.publish();

        if let Some(kind) = previous {
            if let Ok(adapter) = self.adapter(kind) {
                adapter.disconnect().await;
            }
            tracing::info!(kind = %kind, "wallet session disconnected");
        }
        self.clear_persisted(network).await;
    }

    /// provider 撤销了授权：不再调用 provider，直接回到未连接
    pub async fn mark_revoked(&self) {
        let network = {
            let mut state = self.lock();
            if !matches!(*state, SessionState::Connected(_)) {
                return;
            }
            let network = state.network();
            *state = SessionState::Disconnected { network };
            network
        };
        tracing::warn!("wallet access revoked by provider");
        self.publish();
        self.clear_persisted(network).await;
    }

    /// 切换目标网络，任何状态下都允许
    pub async fn switch_network(&self, network: Network) -> WalletSession {
        let snapshot = {
            let mut state = self.lock();
            let next = match &*state {
                SessionState::Disconnected { .. } => SessionState::Disconnected { network },
                SessionState::Connecting { attempt, .. } => SessionState::Connecting {
                    attempt: *attempt,
                    network,
                },
                SessionState::Connected(session) => {
                    SessionState::Connected(session.clone().with_network(network))
                }
            };
            *state = next;
            state.snapshot()
        };
        self.publish();
        self.persist(&snapshot.to_persisted()).await;
        tracing::info!(network = %network, "target network switched");
        snapshot
    }

    /// 从持久化数据恢复会话，地址必须与 provider 当前账户一致
    pub async fn restore(&self) -> Result<WalletSession> {
        let Some(persisted) = self.load_persisted().await? else {
            return Ok(self.snapshot());
        };

        {
            let mut state = self.lock();
            match *state {
                SessionState::Disconnected { .. } => {
                    *state = SessionState::Disconnected {
                        network: persisted.network,
                    };
                }
                _ => return Ok(state.snapshot()),
            }
        }
        self.publish();

        let (Some(address), Some(kind)) = (persisted.address.clone(), persisted.provider_kind)
        else {
            return Ok(self.snapshot());
        };

        let live = match self.adapter(kind) {
            Ok(adapter) if adapter.is_available() => adapter.current_account().await,
            Ok(_) => Ok(None),
            Err(e) => Err(e),
        };

        match live {
            Ok(Some(current)) if AddressValidator::same_account(&current, &address) => {
                let session = WalletSession::connected(address, kind, persisted.network);
                {
                    let mut state = self.lock();
                    if !matches!(*state, SessionState::Disconnected { .. }) {
                        return Ok(state.snapshot());
                    }
                    *state = SessionState::Connected(session.clone());
                }
                self.publish();
                tracing::info!(kind = %kind, "wallet session restored");
                Ok(session)
            }
            Ok(current) => {
                tracing::info!(
                    kind = %kind,
                    live = ?current.as_deref().map(AddressValidator::short),
                    "persisted session no longer matches provider account, discarding"
                );
                self.clear_persisted(persisted.network).await;
                Ok(self.snapshot())
            }
            Err(e @ WalletError::WrongProviderFamily { .. }) => {
                tracing::warn!(kind = %kind, error = %e, "persisted provider is the wrong wallet family, discarding");
                self.clear_persisted(persisted.network).await;
                Ok(self.snapshot())
            }
            Err(e) => {
                // 钱包锁定等临时错误：保留持久化身份，下次加载再确认
                tracing::warn!(kind = %kind, error = %e, code = e.code(), "could not revalidate persisted session");
                Ok(self.snapshot())
            }
        }
    }

    async fn load_persisted(&self) -> Result<Option<PersistedSession>> {
        let Some(raw) = self.kv.get(SESSION_STORAGE_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(persisted) => Ok(Some(persisted)),
            Err(e) => {
                tracing::warn!(error = %e, "persisted wallet session is corrupt, discarding");
                self.kv.remove(SESSION_STORAGE_KEY).await?;
                Ok(None)
            }
        }
    }

    async fn persist(&self, persisted: &PersistedSession) {
        let result = match serde_json::to_string(persisted) {
            Ok(json) => self.kv.put(SESSION_STORAGE_KEY, json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist wallet session");
        }
    }

    /// 只保留网络选择
    async fn clear_persisted(&self, network: Network) {
        self.persist(&WalletSession::disconnected(network).to_persisted())
            .await;
    }
}
