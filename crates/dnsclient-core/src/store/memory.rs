// # Memory Config Store
//
// In-memory implementation of ConfigStore.
//
// ## Purpose
//
// Lets the daemon run against rows owned by the embedding process, and gives
// tests full control over when changes happen. Every setter bumps the change
// sequence number and wakes all watchers.

use async_trait::async_trait;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tokio_stream::Stream;
use tokio_stream::wrappers::WatchStream;

use crate::Error;
use crate::traits::{ConfigStore, DnsClientRow, Snapshot, SystemRow};

/// In-memory config store
///
/// Clones share the same rows and sequence number.
///
/// # Example
///
/// ```rust
/// use dnsclient_core::store::MemoryConfigStore;
/// use dnsclient_core::traits::{ConfigStore, DnsClientRow};
///
/// #[tokio::main]
/// async fn main() {
///     let store = MemoryConfigStore::new();
///     let before = store.change_seqno();
///
///     store
///         .set_dns_client(DnsClientRow {
///             name_servers: vec!["10.0.0.1".to_string()],
///             ..Default::default()
///         })
///         .await;
///
///     assert!(store.change_seqno() > before);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryConfigStore {
    snapshot: Arc<RwLock<Snapshot>>,
    seqno: Arc<watch::Sender<u64>>,
}

impl MemoryConfigStore {
    /// Create an empty store (system not configured)
    pub fn new() -> Self {
        Self::with_snapshot(Snapshot::default())
    }

    /// Create a store holding `snapshot`
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let (seqno, _) = watch::channel(0);
        Self {
            snapshot: Arc::new(RwLock::new(snapshot)),
            seqno: Arc::new(seqno),
        }
    }

    /// Apply `change` to the rows and publish a new sequence number
    ///
    /// Returns the new sequence number.
    pub async fn update<F>(&self, change: F) -> u64
    where
        F: FnOnce(&mut Snapshot),
    {
        {
            let mut snapshot = self.snapshot.write().await;
            change(&mut snapshot);
        }
        self.seqno.send_modify(|seqno| *seqno += 1);
        self.change_seqno()
    }

    /// Replace all rows
    pub async fn set_snapshot(&self, snapshot: Snapshot) -> u64 {
        self.update(|current| *current = snapshot).await
    }

    /// Replace the DNS client rows with a single row
    pub async fn set_dns_client(&self, row: DnsClientRow) -> u64 {
        self.update(|snapshot| snapshot.dns_client = vec![row]).await
    }

    /// Mark start-up configuration as complete (or not)
    pub async fn set_system_configured(&self, configured: bool) -> u64 {
        let cur_cfg = i64::from(configured);
        self.update(|snapshot| snapshot.system = vec![SystemRow { cur_cfg }])
            .await
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    fn change_seqno(&self) -> u64 {
        *self.seqno.borrow()
    }

    fn watch(&self) -> Pin<Box<dyn Stream<Item = u64> + Send + 'static>> {
        Box::pin(WatchStream::from_changes(self.seqno.subscribe()))
    }

    async fn snapshot(&self) -> Result<Snapshot, Error> {
        Ok(self.snapshot.read().await.clone())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn setters_bump_seqno_and_notify() {
        let store = MemoryConfigStore::new();
        let mut changes = store.watch();

        let seqno = store.set_system_configured(true).await;
        assert_eq!(seqno, 1);
        assert_eq!(changes.next().await, Some(1));
        assert!(store.system_configured().await.unwrap());
    }

    #[tokio::test]
    async fn clones_share_rows() {
        let store = MemoryConfigStore::new();
        let other = store.clone();

        other
            .set_dns_client(DnsClientRow {
                domain_list: vec!["example.com".to_string()],
                ..Default::default()
            })
            .await;

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.dns_client.len(), 1);
        assert_eq!(store.change_seqno(), 1);
    }
}
