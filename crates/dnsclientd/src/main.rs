// # dnsclientd - DNS Client Sync Daemon
//
// Thin integration layer: all resolver file logic lives in dnsclient-core.
//
// The dnsclientd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the config store, resolver file and control socket
// 4. Running the sync driver until shutdown
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Resolver File
// - `DNSCLIENT_RESOLV_CONF`: Resolver file to maintain (default `/etc/resolv.conf`)
//
// ### Config Store
// - `DNSCLIENT_STORE_TYPE`: Type of config store (file)
// - `DNSCLIENT_STORE_PATH`: Snapshot file (for file store)
// - `DNSCLIENT_STORE_POLL_MS`: Snapshot poll interval in milliseconds
//
// ### Driver
// - `DNSCLIENT_READINESS_BACKOFF_MS`: Delay before re-checking system readiness
//
// ### Control
// - `DNSCLIENT_CONTROL_SOCKET`: Unix socket for `exit`, `status` and
//   `diag-dump basic <feature>` requests (disabled when unset)
//
// ### Logging
// - `DNSCLIENT_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export DNSCLIENT_STORE_TYPE=file
// export DNSCLIENT_STORE_PATH=/var/lib/dnsclient/db.json
// export DNSCLIENT_CONTROL_SOCKET=/run/dnsclientd.ctl
//
// dnsclientd
// ```

use anyhow::{Context, Result};
use dnsclient_core::config::{ConfigStoreConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_RESOLV_CONF_PATH};
use dnsclient_core::control::{self, ControlSocket};
use dnsclient_core::traits::ConfigStore;
use dnsclient_core::{
    DaemonConfig, DriverEvent, FileConfigStore, FileResolverFile, SyncDriver,
};
use std::env;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown (signal or `exit` request)
/// - 1: Configuration or startup error
/// - 5: Unexpected failure; the supervisor should restart the daemon
#[derive(Debug, Clone, Copy)]
enum DnsClientExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime failure or panic
    Restart = 5,
}

impl From<DnsClientExitCode> for ExitCode {
    fn from(code: DnsClientExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    resolv_conf: String,
    store_type: String,
    store_path: Option<String>,
    store_poll_ms: Option<u64>,
    readiness_backoff_ms: Option<u64>,
    control_socket: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            resolv_conf: env::var("DNSCLIENT_RESOLV_CONF")
                .unwrap_or_else(|_| DEFAULT_RESOLV_CONF_PATH.to_string()),
            store_type: env::var("DNSCLIENT_STORE_TYPE").unwrap_or_else(|_| "file".to_string()),
            store_path: env::var("DNSCLIENT_STORE_PATH").ok(),
            store_poll_ms: parse_var("DNSCLIENT_STORE_POLL_MS")?,
            readiness_backoff_ms: parse_var("DNSCLIENT_READINESS_BACKOFF_MS")?,
            control_socket: env::var("DNSCLIENT_CONTROL_SOCKET")
                .ok()
                .filter(|s| !s.is_empty()),
            log_level: env::var("DNSCLIENT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the environment-level settings
    ///
    /// Checks what the core configuration cannot know about: supported store
    /// types, paths on this host and the log level.
    fn validate(&self) -> Result<()> {
        // The in-memory store has no writer outside the process, so it is
        // only offered to library users.
        match self.store_type.as_str() {
            "file" => {}
            _ => anyhow::bail!(
                "DNSCLIENT_STORE_TYPE '{}' is not supported. \
                Supported types: file",
                self.store_type
            ),
        }

        if self.store_type == "file" && self.store_path.as_ref().is_none_or(|p| p.is_empty()) {
            anyhow::bail!(
                "DNSCLIENT_STORE_PATH is required when DNSCLIENT_STORE_TYPE=file. \
                Set it via: export DNSCLIENT_STORE_PATH=/var/lib/dnsclient/db.json"
            );
        }

        if let Some(parent) = std::path::Path::new(&self.resolv_conf).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "DNSCLIENT_RESOLV_CONF parent directory does not exist: {}",
                parent.display()
            );
        }

        if let Some(poll) = self.store_poll_ms
            && !(10..=60_000).contains(&poll)
        {
            anyhow::bail!(
                "DNSCLIENT_STORE_POLL_MS must be between 10 and 60000. Got: {}",
                poll
            );
        }

        if let Some(backoff) = self.readiness_backoff_ms
            && !(10..=60_000).contains(&backoff)
        {
            anyhow::bail!(
                "DNSCLIENT_READINESS_BACKOFF_MS must be between 10 and 60000. Got: {}",
                backoff
            );
        }

        if self.log_level().is_none() {
            anyhow::bail!(
                "DNSCLIENT_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        Ok(())
    }

    fn log_level(&self) -> Option<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }

    /// Build the core configuration
    fn daemon_config(&self) -> Result<DaemonConfig> {
        let mut config = DaemonConfig::new();
        config.resolver.path = self.resolv_conf.clone();
        config.store = ConfigStoreConfig::File {
            path: self.store_path.clone().unwrap_or_default(),
            poll_interval_ms: self.store_poll_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        };
        if let Some(backoff) = self.readiness_backoff_ms {
            config.driver.readiness_backoff_ms = backoff;
        }
        config.control.socket_path = self.control_socket.clone();

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .ok()
        .map(|value| {
            value
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number. Got: {:?}", name, value))
        })
        .transpose()
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DnsClientExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DnsClientExitCode::ConfigError.into();
    }

    let daemon_config = match config.daemon_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return DnsClientExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let log_level = config.log_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DnsClientExitCode::ConfigError.into();
    }

    info!("Starting dnsclientd daemon");
    info!(
        "Resolver file: {}, config store: {}",
        daemon_config.resolver.path,
        daemon_config.store.type_name()
    );

    // Single-threaded runtime: the driver loop is the only consumer of state
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DnsClientExitCode::Restart.into();
        }
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        rt.block_on(async {
            let daemon = match Daemon::start(daemon_config).await {
                Ok(daemon) => daemon,
                Err(e) => {
                    error!("Startup failed: {:#}", e);
                    return DnsClientExitCode::ConfigError;
                }
            };

            match daemon.run().await {
                Ok(()) => DnsClientExitCode::CleanShutdown,
                Err(e) => {
                    error!("Daemon error: {:#}", e);
                    DnsClientExitCode::Restart
                }
            }
        })
    }));

    match outcome {
        Ok(code) => {
            info!("dnsclientd exiting with code {}", code as u8);
            code.into()
        }
        Err(_) => {
            error!("Daemon panicked, exiting for restart");
            DnsClientExitCode::Restart.into()
        }
    }
}

/// Wired-up daemon, ready to run
struct Daemon {
    driver: SyncDriver,
    events: mpsc::Receiver<DriverEvent>,
    control_server: Option<JoinHandle<()>>,
}

impl Daemon {
    /// Open the store, bind the control socket and build the driver
    async fn start(config: DaemonConfig) -> Result<Self> {
        let store: Box<dyn ConfigStore> = match &config.store {
            ConfigStoreConfig::File {
                path,
                poll_interval_ms,
            } => Box::new(
                FileConfigStore::new(path, Duration::from_millis(*poll_interval_ms))
                    .await
                    .with_context(|| format!("Failed to open config store {}", path))?,
            ),
            ConfigStoreConfig::Memory => {
                anyhow::bail!("The memory config store cannot back the daemon; use a file store")
            }
        };

        let resolver = Box::new(FileResolverFile::new(&config.resolver.path));
        let (mut driver, events) = SyncDriver::new(store, resolver, &config)?;

        let mut control_server = None;
        if let Some(path) = &config.control.socket_path {
            let (handle, control_rx) = control::channel(config.control.channel_capacity);
            let socket = ControlSocket::bind(path, handle)?;
            control_server = Some(tokio::spawn(socket.serve()));
            driver = driver.with_control(control_rx);
        }

        Ok(Self {
            driver,
            events,
            control_server,
        })
    }

    /// Run until a shutdown signal or an `exit` request
    async fn run(self) -> Result<()> {
        let Daemon {
            mut driver,
            mut events,
            control_server,
        } = self;

        let event_logger = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                debug!("Driver event: {:?}", event);
            }
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let signals = install_shutdown_signals()?;
        let signal_task = tokio::spawn(async move {
            let signal = signals.await;
            info!("Received shutdown signal: {}", signal);
            let _ = shutdown_tx.send(());
        });

        let result = driver.run_with_shutdown(Some(shutdown_rx)).await;

        signal_task.abort();
        if let Some(server) = control_server {
            server.abort();
            // Dropping the serve future removes the socket file
            let _ = server.await;
        }
        // The driver holds the event sender
        drop(driver);
        let _ = event_logger.await;

        info!("Shutting down daemon");
        result.map_err(Into::into)
    }
}

/// Register handlers for SIGTERM and SIGINT
///
/// Registration happens before the driver starts so an early signal is not
/// lost. The returned future resolves with the name of the first signal.
#[cfg(unix)]
fn install_shutdown_signals() -> Result<impl Future<Output = &'static str> + Send + 'static> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Wait for Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn install_shutdown_signals() -> Result<impl Future<Output = &'static str> + Send + 'static> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
            std::future::pending::<()>().await;
        }
        "SIGINT"
    })
}
