//! Config store implementations
//!
//! This module provides implementations of the ConfigStore trait:
//! - `MemoryConfigStore`: In-process rows, changed through setters
//! - `FileConfigStore`: A JSON snapshot file polled for changes

pub mod file;
pub mod memory;

pub use file::FileConfigStore;
pub use memory::MemoryConfigStore;
