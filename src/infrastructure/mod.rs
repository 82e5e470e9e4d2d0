pub mod host;
pub mod kv_store;
pub mod ledger_client;
pub mod logging;
pub mod scripted_provider;

pub use host::{HeadlessHost, HostEnvironment, InjectedProvider, StaticHost};
pub use kv_store::{FileKvStore, KvStore, MemoryKvStore};
pub use ledger_client::{AptosRestClient, LedgerRpc};
