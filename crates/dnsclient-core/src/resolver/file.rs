// # File Resolver File
//
// On-disk implementation of ResolverFile.
//
// ## Write Semantics
//
// The file is opened with truncation and rewritten in full on every cycle.
// It is written in place, never renamed over, since `/etc/resolv.conf` may be
// a symlink or a bind mount.
//
// ## Missing File
//
// A missing file reads as empty, so the first cycle creates it. The parent
// directory must exist.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::reconcile::{render, split_lines};
use crate::traits::ResolverFile;

/// Resolver configuration file on disk
///
/// # Example
///
/// ```rust,no_run
/// use dnsclient_core::resolver::FileResolverFile;
/// use dnsclient_core::traits::ResolverFile;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let file = FileResolverFile::new("/etc/resolv.conf");
///     let mut lines = file.read_lines().await?;
///     lines.push("nameserver 10.0.0.1\n".to_string());
///     file.write_lines(&lines).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileResolverFile {
    path: PathBuf,
}

impl FileResolverFile {
    /// Create a handle for the file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResolverFile for FileResolverFile {
    async fn read_lines(&self) -> Result<Vec<String>, Error> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Resolver file does not exist yet: {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(Error::resolver_file(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        Ok(split_lines(&content))
    }

    async fn write_lines(&self, lines: &[String]) -> Result<(), Error> {
        let content = render(lines);

        let mut file = fs::File::create(&self.path).await.map_err(|e| {
            Error::resolver_file(format!("Failed to open {}: {}", self.path.display(), e))
        })?;

        file.write_all(content.as_bytes()).await.map_err(|e| {
            Error::resolver_file(format!("Failed to write {}: {}", self.path.display(), e))
        })?;

        file.flush().await.map_err(|e| {
            Error::resolver_file(format!("Failed to flush {}: {}", self.path.display(), e))
        })?;

        tracing::trace!(
            "Wrote {} bytes to {}",
            content.len(),
            self.path.display()
        );
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
