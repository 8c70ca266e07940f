//! Resolver file sync driver
//!
//! The SyncDriver is responsible for:
//! - Waiting for config store change notifications
//! - Holding off until the system has finished initializing
//! - Projecting the desired state and reconciling the resolver file
//! - Answering administrative control requests
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐                          ┌──────────────┐
//! │ ConfigStore │──── change seqno ───────▶│              │◀──── ControlRequest
//! └─────────────┘                          │  SyncDriver  │
//!        ▲                                 │              │───── DriverEvent ──▶
//!        │ snapshot / readiness            └──────────────┘
//!        └─────────────────────────────────────┘    │
//!                                                   ▼
//!                                          ┌──────────────┐
//!                                          │ ResolverFile │
//!                                          │ (read/write) │
//!                                          └──────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Change notification carries a sequence number
//! 2. Skip if it equals the last one processed
//! 3. If the system is not yet configured, defer and retry after a backoff
//! 4. Read the file, project the desired state, reconcile, rewrite the file
//! 5. Remember the sequence number only after the rewrite succeeded

use crate::config::{DaemonConfig, Limits};
use crate::control::{ControlCommand, ControlRequest, diag_basic_handler};
use crate::desired::DesiredState;
use crate::error::Result;
use crate::reconcile::{reconcile, render};
use crate::traits::{ConfigStore, ResolverFile};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Sleep;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, trace, warn};

/// Events emitted by the SyncDriver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// Driver loop started
    Started {
        seqno: u64,
    },

    /// System not configured yet; nothing was written
    Deferred {
        seqno: u64,
    },

    /// Resolver file rewritten
    Reconciled {
        seqno: u64,
        /// Whether the content differs from what was there before
        changed: bool,
    },

    /// Cycle failed; the sequence number was not recorded
    Failed {
        seqno: u64,
        error: String,
    },

    /// Driver loop stopped
    Stopped {
        reason: String,
    },
}

/// Result of a single reconciliation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// System not configured yet
    Deferred,
    /// File rewritten
    Reconciled {
        /// Whether the content differs from what was there before
        changed: bool,
    },
}

/// Mutable state of the driver
///
/// Owned by the [`SyncDriver`]; `status()` hands out copies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriverState {
    /// Readiness latch; never cleared once set
    pub system_ready: bool,
    /// Sequence number of the last successful cycle
    pub last_seqno: Option<u64>,
    /// Successful cycles
    pub cycles: u64,
    /// Deferred cycles
    pub deferrals: u64,
    /// Failed cycles
    pub failures: u64,
    /// Time of the last successful cycle
    pub last_reconciled_at: Option<DateTime<Utc>>,
}

/// Resolver file sync driver
///
/// ## Lifecycle
///
/// 1. Create with [`SyncDriver::new()`]
/// 2. Optionally attach a control channel with [`SyncDriver::with_control()`]
/// 3. Start with [`SyncDriver::run()`] or [`SyncDriver::run_with_shutdown()`]
/// 4. The loop ends on shutdown, an `exit` request, or when the store closes
///
/// ## Threading
///
/// Everything runs on the task that awaits `run`. Requests, notifications
/// and timers are handled one at a time, so an `exit` request takes effect
/// only after the cycle in progress has finished.
pub struct SyncDriver {
    /// Source of rows and change notifications
    store: Box<dyn ConfigStore>,

    /// The file being kept in sync
    resolver: Box<dyn ResolverFile>,

    /// Limits applied to the projected state
    limits: Limits,

    /// Delay before re-checking readiness
    readiness_backoff: Duration,

    /// Readiness latch and bookkeeping
    state: DriverState,

    /// Administrative requests
    control_rx: Option<mpsc::Receiver<ControlRequest>>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<DriverEvent>,
}

impl SyncDriver {
    /// Create a new sync driver
    ///
    /// # Returns
    ///
    /// A tuple of (driver, event_receiver) where event_receiver yields driver events
    pub fn new(
        store: Box<dyn ConfigStore>,
        resolver: Box<dyn ResolverFile>,
        config: &DaemonConfig,
    ) -> Result<(Self, mpsc::Receiver<DriverEvent>)> {
        config.driver.validate()?;
        config.limits.validate()?;

        let (tx, rx) = mpsc::channel(config.driver.event_channel_capacity);

        let driver = Self {
            store,
            resolver,
            limits: config.limits,
            readiness_backoff: config.driver.readiness_backoff(),
            state: DriverState::default(),
            control_rx: None,
            event_tx: tx,
        };

        Ok((driver, rx))
    }

    /// Attach the receiving end of a control channel
    pub fn with_control(mut self, control_rx: mpsc::Receiver<ControlRequest>) -> Self {
        self.control_rx = Some(control_rx);
        self
    }

    /// Copy of the driver state
    pub fn status(&self) -> DriverState {
        self.state.clone()
    }

    /// Driver state as JSON, as answered to a `status` request
    pub fn status_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.state)?)
    }

    /// Run the driver until Ctrl-C, an `exit` request, or the store closes
    pub async fn run(&mut self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the driver with a programmatic shutdown signal
    ///
    /// With `Some(rx)` the loop stops when `rx` fires or its sender is
    /// dropped; with `None` it falls back to Ctrl-C like [`SyncDriver::run()`].
    /// The daemon uses this to route SIGTERM and SIGINT into the loop.
    pub async fn run_with_shutdown(
        &mut self,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&mut self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        let mut changes = self.store.watch();
        let mut control_rx = self.control_rx.take();
        let mut retry: Option<Pin<Box<Sleep>>> = None;

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl-C: {}", e);
                        pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        let seqno = self.store.change_seqno();
        info!(
            "Sync driver started (store: {}, resolver file: {}, seqno {})",
            self.store.store_name(),
            self.resolver.location(),
            seqno
        );
        self.emit_event(DriverEvent::Started { seqno });
        self.handle_change(seqno, &mut retry).await;

        let reason = loop {
            tokio::select! {
                next = changes.next() => match next {
                    Some(seqno) => self.handle_change(seqno, &mut retry).await,
                    None => break "Config store closed".to_string(),
                },

                request = recv_control(&mut control_rx) => match request {
                    Some(request) => {
                        if self.handle_control(request) {
                            break "Exit requested".to_string();
                        }
                    }
                    None => {
                        debug!("Control channel closed");
                        control_rx = None;
                    }
                },

                _ = wait_retry(&mut retry) => {
                    retry = None;
                    let seqno = self.store.change_seqno();
                    debug!("Re-checking system readiness (seqno {})", seqno);
                    self.handle_change(seqno, &mut retry).await;
                }

                _ = &mut shutdown => break "Shutdown signal".to_string(),
            }
        };

        info!("Sync driver stopped: {}", reason);
        self.emit_event(DriverEvent::Stopped { reason });
        Ok(())
    }

    /// Run a cycle for `seqno` unless it was already processed
    ///
    /// # Returns
    ///
    /// - `Ok(None)`: `seqno` already processed, nothing done
    /// - `Ok(Some(outcome))`: a cycle ran
    /// - `Err(Error)`: the cycle failed; `seqno` is not recorded
    pub async fn sync(&mut self, seqno: u64) -> Result<Option<CycleOutcome>> {
        if self.state.last_seqno == Some(seqno) {
            trace!("Seqno {} already processed, skipping", seqno);
            return Ok(None);
        }

        match self.maybe_reconcile().await {
            Ok(CycleOutcome::Deferred) => {
                self.state.deferrals += 1;
                debug!("System not configured yet, deferring seqno {}", seqno);
                self.emit_event(DriverEvent::Deferred { seqno });
                Ok(Some(CycleOutcome::Deferred))
            }
            Ok(CycleOutcome::Reconciled { changed }) => {
                self.state.last_seqno = Some(seqno);
                self.state.cycles += 1;
                self.state.last_reconciled_at = Some(Utc::now());
                if changed {
                    info!("Resolver file {} updated (seqno {})", self.resolver.location(), seqno);
                } else {
                    debug!("Resolver file {} already up to date (seqno {})", self.resolver.location(), seqno);
                }
                self.emit_event(DriverEvent::Reconciled { seqno, changed });
                Ok(Some(CycleOutcome::Reconciled { changed }))
            }
            Err(e) => {
                self.state.failures += 1;
                self.emit_event(DriverEvent::Failed {
                    seqno,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Reconcile the resolver file with the store, if the system is ready
    ///
    /// Does not look at sequence numbers; see [`SyncDriver::sync`].
    pub async fn maybe_reconcile(&mut self) -> Result<CycleOutcome> {
        if !self.state.system_ready {
            if !self.store.system_configured().await? {
                return Ok(CycleOutcome::Deferred);
            }
            info!("System configuration complete");
            self.state.system_ready = true;
        }

        let current = self.resolver.read_lines().await?;
        let snapshot = self.store.snapshot().await?;
        let desired = DesiredState::from_snapshot(&snapshot, &self.limits);
        debug!("Desired resolver state: {:?}", desired);

        let updated = reconcile(current.clone(), &desired);
        let changed = render(&updated) != render(&current);
        self.resolver.write_lines(&updated).await?;

        Ok(CycleOutcome::Reconciled { changed })
    }

    async fn handle_change(&mut self, seqno: u64, retry: &mut Option<Pin<Box<Sleep>>>) {
        match self.sync(seqno).await {
            Ok(Some(CycleOutcome::Deferred)) => {
                *retry = Some(Box::pin(tokio::time::sleep(self.readiness_backoff)));
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to sync resolver file (seqno {}): {}", seqno, e);
                // Retried on the next change notification
            }
        }
    }

    /// Answer a control request; returns `true` if the driver should stop
    fn handle_control(&mut self, request: ControlRequest) -> bool {
        let ControlRequest { command, reply } = request;
        debug!("Handling control command {:?}", command);

        let (text, exit) = match command {
            ControlCommand::Exit => {
                info!("Exit requested over control channel");
                (String::new(), true)
            }
            ControlCommand::Status => {
                let text = self
                    .status_json()
                    .unwrap_or_else(|e| format!("error: {e}"));
                (text, false)
            }
            ControlCommand::DiagDump { feature } => (diag_basic_handler(&feature), false),
        };

        if reply.send(text).is_err() {
            debug!("Control client went away before the reply");
        }
        exit
    }

    /// Emit a driver event
    fn emit_event(&self, event: DriverEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                trace!("Event receiver dropped");
            }
        }
    }
}

async fn recv_control(
    control_rx: &mut Option<mpsc::Receiver<ControlRequest>>,
) -> Option<ControlRequest> {
    match control_rx {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn wait_retry(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}
