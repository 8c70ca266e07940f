// # File Config Store
//
// ConfigStore backed by a JSON snapshot file.
//
// ## Purpose
//
// Stands in for the configuration database: whatever exports the DNS client
// rows writes them to a file, and this store polls the file and turns every
// content change into a new change sequence number.
//
// ## Change Detection
//
// - The file is re-read every poll interval
// - A new sequence number is published only when the raw content differs
//   from the last successfully parsed content
// - Content that fails to parse is logged once and ignored until the file
//   changes again; the previous snapshot stays in effect
// - A missing file is an empty snapshot (system not configured)
//
// ## File Format
//
// ```json
// {
//   "system": [{ "cur_cfg": 1 }],
//   "dns_client": [
//     {
//       "vrf": "vrf_default",
//       "other_config": { "domain_name": "example.com" },
//       "domain_list": ["example.com", "corp.example.com"],
//       "name_servers": ["10.0.0.1", "2001:db8::53"],
//       "host_v4_address_mapping": { "web": "10.0.0.80" },
//       "host_v6_address_mapping": { "web": "2001:db8::80" }
//     }
//   ]
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::Stream;
use tokio_stream::wrappers::WatchStream;

use crate::Error;
use crate::traits::{ConfigStore, Snapshot};

/// Config store reading a polled JSON snapshot file
///
/// The poll task is stopped when the store is dropped.
///
/// # Example
///
/// ```rust,no_run
/// use dnsclient_core::store::FileConfigStore;
/// use dnsclient_core::traits::ConfigStore;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store =
///         FileConfigStore::new("/var/lib/dnsclient/db.json", Duration::from_millis(500)).await?;
///     let snapshot = store.snapshot().await?;
///     println!("{} DNS client row(s)", snapshot.dns_client.len());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileConfigStore {
    shared: Arc<Shared>,
    poll_task: JoinHandle<()>,
}

#[derive(Debug)]
struct Shared {
    path: PathBuf,
    snapshot: RwLock<Snapshot>,
    last_content: Mutex<Option<String>>,
    /// Content that last failed to parse; not re-parsed until it changes
    rejected_content: Mutex<Option<String>>,
    seqno: watch::Sender<u64>,
}

impl FileConfigStore {
    /// Load the snapshot file and start polling it
    ///
    /// Fails if the file exists but cannot be read or parsed, so a broken
    /// file is noticed at start-up rather than silently ignored.
    pub async fn new<P: AsRef<Path>>(path: P, poll_interval: Duration) -> Result<Self, Error> {
        let (seqno, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            path: path.as_ref().to_path_buf(),
            snapshot: RwLock::new(Snapshot::default()),
            last_content: Mutex::new(None),
            rejected_content: Mutex::new(None),
            seqno,
        });

        if let Some(content) = shared.read_content().await? {
            let snapshot = parse_snapshot(&shared.path, &content)?;
            shared.publish(content, snapshot).await;
        }

        let poll_task = tokio::spawn(poll_loop(Arc::clone(&shared), poll_interval));

        Ok(Self { shared, poll_task })
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Re-read the file once
    ///
    /// Returns `true` if a new sequence number was published.
    pub async fn refresh(&self) -> Result<bool, Error> {
        self.shared.refresh().await
    }
}

impl Drop for FileConfigStore {
    fn drop(&mut self) {
        self.poll_task.abort();
    }
}

impl Shared {
    async fn read_content(&self) -> Result<Option<String>, Error> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::config_store(format!(
                "Failed to read snapshot file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn refresh(&self) -> Result<bool, Error> {
        let content = self.read_content().await?;

        if self.last_content.lock().await.as_deref() == content.as_deref() {
            return Ok(false);
        }

        let mut rejected = self.rejected_content.lock().await;
        if content.is_some() && rejected.as_deref() == content.as_deref() {
            return Ok(false);
        }

        match content {
            Some(content) => {
                let snapshot = match parse_snapshot(&self.path, &content) {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        *rejected = Some(content);
                        return Err(e);
                    }
                };
                *rejected = None;
                drop(rejected);
                self.publish(content, snapshot).await;
            }
            None => {
                *rejected = None;
                drop(rejected);
                tracing::warn!(
                    "Snapshot file {} disappeared, treating as empty",
                    self.path.display()
                );
                *self.snapshot.write().await = Snapshot::default();
                *self.last_content.lock().await = None;
                self.seqno.send_modify(|seqno| *seqno += 1);
            }
        }
        Ok(true)
    }

    async fn publish(&self, content: String, snapshot: Snapshot) {
        *self.snapshot.write().await = snapshot;
        *self.last_content.lock().await = Some(content);
        self.seqno.send_modify(|seqno| *seqno += 1);
        tracing::debug!(
            "Loaded snapshot from {} (seqno {})",
            self.path.display(),
            *self.seqno.borrow()
        );
    }
}

async fn poll_loop(shared: Arc<Shared>, poll_interval: Duration) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately and the file was just loaded.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Err(e) = shared.refresh().await {
            tracing::warn!("Ignoring unusable snapshot: {}", e);
        }
    }
}

fn parse_snapshot(path: &Path, content: &str) -> Result<Snapshot, Error> {
    serde_json::from_str(content).map_err(|e| {
        Error::config_store(format!(
            "Failed to parse snapshot file {}: {}",
            path.display(),
            e
        ))
    })
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    fn change_seqno(&self) -> u64 {
        *self.shared.seqno.borrow()
    }

    fn watch(&self) -> Pin<Box<dyn Stream<Item = u64> + Send + 'static>> {
        Box::pin(WatchStream::from_changes(self.shared.seqno.subscribe()))
    }

    async fn snapshot(&self) -> Result<Snapshot, Error> {
        Ok(self.shared.snapshot.read().await.clone())
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}
