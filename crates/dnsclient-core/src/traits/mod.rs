//! Core traits for the DNS client sync daemon
//!
//! This module defines the abstract interfaces at the daemon's boundaries.
//!
//! - [`ConfigStore`]: Read-only view of the configuration database rows
//! - [`ResolverFile`]: Whole-file access to the resolver configuration

pub mod config_store;
pub mod resolver_file;

pub use config_store::{ConfigStore, DnsClientRow, Snapshot, SystemRow};
pub use resolver_file::ResolverFile;
