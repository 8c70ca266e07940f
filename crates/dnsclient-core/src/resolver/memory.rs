// # Memory Resolver File
//
// In-memory implementation of ResolverFile.
//
// Content is kept as a single string and split on read, exactly like the
// on-disk file, so an empty reserved header line disappears on the next read
// just as it does on disk.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::reconcile::{render, split_lines};
use crate::traits::ResolverFile;

/// In-memory resolver file
///
/// Clones share the same content.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolverFile {
    content: Arc<RwLock<String>>,
}

impl MemoryResolverFile {
    /// Create an empty file
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a file holding `content`
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: Arc::new(RwLock::new(content.into())),
        }
    }

    /// Current content
    pub async fn content(&self) -> String {
        self.content.read().await.clone()
    }
}

#[async_trait]
impl ResolverFile for MemoryResolverFile {
    async fn read_lines(&self) -> Result<Vec<String>, Error> {
        Ok(split_lines(&self.content.read().await))
    }

    async fn write_lines(&self, lines: &[String]) -> Result<(), Error> {
        *self.content.write().await = render(lines);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
