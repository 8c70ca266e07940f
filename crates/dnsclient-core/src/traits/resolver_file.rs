// # Resolver File Trait
//
// Defines whole-file access to the resolver configuration file.
//
// ## Semantics
//
// - `read_lines()` returns every line with its `\n` terminator; a missing
//   file reads as no lines
// - `write_lines()` truncates and rewrites the whole file; no appends and no
//   partial writes
//
// The daemon is assumed to be the only writer, so no locking is done.

use async_trait::async_trait;

/// Trait for resolver file implementations
#[async_trait]
pub trait ResolverFile: Send + Sync {
    /// Read the current file as terminated lines
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: The lines (empty if the file does not exist)
    /// - `Err(Error)`: The file exists but could not be read
    async fn read_lines(&self) -> Result<Vec<String>, crate::Error>;

    /// Replace the file contents with `lines`
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The file now holds exactly the concatenated lines
    /// - `Err(Error)`: The file could not be written
    async fn write_lines(&self, lines: &[String]) -> Result<(), crate::Error>;

    /// Human-readable location (for logging)
    fn location(&self) -> String;
}
