//! Resolver file implementations
//!
//! This module provides implementations of the ResolverFile trait:
//! - `FileResolverFile`: The real file on disk (truncate-and-rewrite)
//! - `MemoryResolverFile`: An in-memory file for tests and embedding

pub mod file;
pub mod memory;

pub use file::FileResolverFile;
pub use memory::MemoryResolverFile;
