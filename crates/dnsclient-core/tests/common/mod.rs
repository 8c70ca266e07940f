//! Test doubles and common utilities for sync driver contract tests
//!
//! The doubles wrap the in-memory implementations and add call counting and
//! fault injection. Clones share state, so a test can keep one handle while
//! the driver owns another.

#![allow(dead_code)]

use dnsclient_core::config::DaemonConfig;
use dnsclient_core::error::{Error, Result};
use dnsclient_core::resolver::MemoryResolverFile;
use dnsclient_core::traits::{DnsClientRow, ResolverFile};
use dnsclient_core::{DriverEvent, MemoryConfigStore, SyncDriver};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// A resolver file that counts calls and can be told to fail
#[derive(Clone, Default)]
pub struct ScriptedResolverFile {
    inner: MemoryResolverFile,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl ScriptedResolverFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: &str) -> Self {
        Self {
            inner: MemoryResolverFile::with_content(content),
            ..Self::default()
        }
    }

    pub async fn content(&self) -> String {
        self.inner.content().await
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ResolverFile for ScriptedResolverFile {
    async fn read_lines(&self) -> Result<Vec<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::resolver_file("injected read failure"));
        }
        self.inner.read_lines().await
    }

    async fn write_lines(&self, lines: &[String]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::resolver_file("injected write failure"));
        }
        self.inner.write_lines(lines).await
    }

    fn location(&self) -> String {
        "scripted".to_string()
    }
}

/// Configuration with a short readiness backoff so retries show up quickly
pub fn minimal_config() -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.driver.readiness_backoff_ms = 50;
    config
}

/// A DNS client row with a single name server
pub fn name_server_row(address: &str) -> DnsClientRow {
    DnsClientRow {
        name_servers: vec![address.to_string()],
        ..Default::default()
    }
}

/// A DNS client row carrying every kind of setting
pub fn full_row() -> DnsClientRow {
    DnsClientRow {
        vrf: Some("default".to_string()),
        other_config: BTreeMap::from([("domain_name".to_string(), "corp.example".to_string())]),
        domain_list: vec!["corp.example".to_string(), "lab.example".to_string()],
        name_servers: vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
        host_v4_address_mapping: BTreeMap::from([("gw".to_string(), "10.0.0.254".to_string())]),
        host_v6_address_mapping: BTreeMap::from([("gw6".to_string(), "fd00::1".to_string())]),
    }
}

/// A driver running on a background task
pub struct RunningDriver {
    pub handle: JoinHandle<Result<()>>,
    pub events: mpsc::Receiver<DriverEvent>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl RunningDriver {
    /// Start `driver` with a programmatic shutdown channel
    pub fn spawn(mut driver: SyncDriver, events: mpsc::Receiver<DriverEvent>) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move { driver.run_with_shutdown(Some(shutdown_rx)).await });
        Self {
            handle,
            events,
            shutdown: Some(shutdown_tx),
        }
    }

    /// Wait for the first event matching `predicate`
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> DriverEvent
    where
        F: FnMut(&DriverEvent) -> bool,
    {
        let events = &mut self.events;
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Some(event) if predicate(&event) => return event,
                    Some(_) => continue,
                    None => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for driver event")
    }

    /// Drain events that are already queued
    pub fn drain(&mut self) -> Vec<DriverEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    /// Signal shutdown and wait for the loop to finish
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("driver should stop within 5 seconds")
            .expect("driver task should not panic")
    }
}

/// Build and spawn a driver over `store` and `file`
pub fn spawn_driver(store: &MemoryConfigStore, file: &ScriptedResolverFile) -> RunningDriver {
    let (driver, events) = SyncDriver::new(
        Box::new(store.clone()),
        Box::new(file.clone()),
        &minimal_config(),
    )
    .expect("driver construction succeeds");
    RunningDriver::spawn(driver, events)
}
