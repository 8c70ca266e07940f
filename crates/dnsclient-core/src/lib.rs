// # dnsclient-core
//
// Core library for the DNS client resolv.conf sync daemon.
//
// ## Architecture Overview
//
// The daemon keeps the host resolver configuration file in step with the
// DNS client rows of a configuration store:
// - **ConfigStore**: Trait for reading rows and watching change sequence numbers
// - **ResolverFile**: Trait for reading and rewriting the resolver file
// - **DesiredState**: Sanitized projection of the DNS client rows
// - **reconcile**: Line-level rewrite that leaves unmanaged lines untouched
// - **SyncDriver**: Event loop tying notifications, readiness and control together
//
// ## Design Principles
//
// 1. **Single-Threaded Loop**: One task owns the driver state
// 2. **Edit, Don't Regenerate**: Comments and unknown directives survive every rewrite
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Idempotency**: Reconciling twice yields the same file

pub mod config;
pub mod control;
pub mod desired;
pub mod driver;
pub mod error;
pub mod reconcile;
pub mod resolver;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use traits::{ConfigStore, DnsClientRow, ResolverFile, Snapshot, SystemRow};
pub use driver::{CycleOutcome, DriverEvent, DriverState, SyncDriver};
pub use desired::{DesiredState, HostMapping};
pub use reconcile::{LineKind, reconcile};
pub use config::{DaemonConfig, ConfigStoreConfig, DriverConfig, Limits};
pub use control::{ControlCommand, ControlHandle, ControlSocket};
pub use error::{Error, Result};
pub use resolver::{FileResolverFile, MemoryResolverFile};
pub use store::{FileConfigStore, MemoryConfigStore};
