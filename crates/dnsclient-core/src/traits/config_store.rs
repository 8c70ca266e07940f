// # Config Store Trait
//
// Defines the interface to the configuration database that holds the DNS
// client settings.
//
// ## Purpose
//
// The daemon never writes to the database. It needs three things from it:
// - A change sequence number that moves whenever any watched row changes
// - A stream of those sequence numbers so the driver can block on changes
// - A consistent snapshot of the watched rows
//
// ## Row Order
//
// `Snapshot::dns_client` is ordered by the store's primary key (insertion
// order for the bundled stores). Map columns are `BTreeMap`s, so every
// iteration over a snapshot is deterministic and the resolver file does not
// churn between cycles.
//
// ## Usage
//
// ```rust,ignore
// use dnsclient_core::ConfigStore;
// use tokio_stream::StreamExt;
//
// let mut changes = store.watch();
// while let Some(seqno) = changes.next().await {
//     let snapshot = store.snapshot().await?;
//     println!("seqno {seqno}: {} DNS client row(s)", snapshot.dns_client.len());
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::pin::Pin;
use tokio_stream::Stream;

/// Key in `DnsClientRow::other_config` holding the default domain name
pub const DOMAIN_NAME_KEY: &str = "domain_name";

/// A row of the system table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemRow {
    /// Configuration generation applied by the system; 0 until start-up
    /// configuration has completed
    #[serde(default)]
    pub cur_cfg: i64,
}

/// A row of the DNS client table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsClientRow {
    /// VRF the settings apply to
    #[serde(default)]
    pub vrf: Option<String>,

    /// Free-form settings; carries `domain_name`
    #[serde(default)]
    pub other_config: BTreeMap<String, String>,

    /// Search domains, in configured order
    #[serde(default)]
    pub domain_list: Vec<String>,

    /// Name server addresses, in configured order
    #[serde(default)]
    pub name_servers: Vec<String>,

    /// Static hostname to IPv4 address mappings
    #[serde(default)]
    pub host_v4_address_mapping: BTreeMap<String, String>,

    /// Static hostname to IPv6 address mappings
    #[serde(default)]
    pub host_v6_address_mapping: BTreeMap<String, String>,
}

impl DnsClientRow {
    /// The configured default domain name, if any
    pub fn domain_name(&self) -> Option<&str> {
        self.other_config.get(DOMAIN_NAME_KEY).map(String::as_str)
    }
}

/// Point-in-time view of every row the daemon watches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// System status rows
    #[serde(default)]
    pub system: Vec<SystemRow>,

    /// DNS client rows in store order
    #[serde(default)]
    pub dns_client: Vec<DnsClientRow>,
}

impl Snapshot {
    /// Whether start-up configuration has completed
    ///
    /// True as soon as any system row reports a non-zero configuration
    /// generation.
    pub fn system_configured(&self) -> bool {
        self.system.iter().any(|row| row.cur_cfg > 0)
    }
}

/// Trait for config store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Change Notification Contract
///
/// - `change_seqno()` only ever increases
/// - `watch()` yields the new sequence number after every change; it may
///   coalesce several changes into one item but must never skip the latest
/// - `snapshot()` reflects at least every change whose sequence number has
///   been yielded
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Current change sequence number
    fn change_seqno(&self) -> u64;

    /// Stream of change sequence numbers
    ///
    /// Only changes made after the call are yielded; callers that need the
    /// current state read `change_seqno()` first. The stream ends only when
    /// the store is closed.
    fn watch(&self) -> Pin<Box<dyn Stream<Item = u64> + Send + 'static>>;

    /// Fetch the current rows
    ///
    /// # Returns
    ///
    /// - `Ok(Snapshot)`: The rows as of now
    /// - `Err(Error)`: Store unavailable
    async fn snapshot(&self) -> Result<Snapshot, crate::Error>;

    /// Whether the system has finished initializing
    ///
    /// The default implementation reads the system rows from a fresh
    /// snapshot.
    async fn system_configured(&self) -> Result<bool, crate::Error> {
        Ok(self.snapshot().await?.system_configured())
    }

    /// Get the store name (for logging)
    fn store_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_configured_requires_nonzero_cur_cfg() {
        let mut snapshot = Snapshot::default();
        assert!(!snapshot.system_configured());

        snapshot.system.push(SystemRow { cur_cfg: 0 });
        assert!(!snapshot.system_configured());

        snapshot.system.push(SystemRow { cur_cfg: 3 });
        assert!(snapshot.system_configured());
    }

    #[test]
    fn row_deserializes_with_missing_columns() {
        let row: DnsClientRow = serde_json::from_str(
            r#"{ "other_config": { "domain_name": "example.com" }, "name_servers": ["10.0.0.1"] }"#,
        )
        .unwrap();

        assert_eq!(row.domain_name(), Some("example.com"));
        assert_eq!(row.name_servers, vec!["10.0.0.1"]);
        assert!(row.domain_list.is_empty());
        assert!(row.host_v6_address_mapping.is_empty());
    }
}
