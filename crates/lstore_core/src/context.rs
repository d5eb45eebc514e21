//! Owned runtime context shared by journal components.

use crate::config::Config;
use lstore_storage::{FileSystem, InMemoryFileSystem, OsFileSystem};
use std::path::Path;
use std::sync::Arc;

/// Configuration and file system handle passed to every component that
/// touches storage.
///
/// A context is built once by the owner of the store and handed to pools,
/// partitions and the journal reader/writer as `&Arc<JournalContext>`. Its
/// lifetime is the lifetime of the last component holding it.
///
/// # Example
///
/// ```rust
/// use lstore_core::{Config, JournalContext};
///
/// let ctx = JournalContext::in_memory(Config::default());
/// assert_eq!(ctx.config().file_extension, "jrnl");
/// ```
#[derive(Debug)]
pub struct JournalContext {
    config: Config,
    fs: Arc<dyn FileSystem>,
}

impl JournalContext {
    /// Creates a context over an arbitrary file system.
    #[must_use]
    pub fn new(config: Config, fs: Arc<dyn FileSystem>) -> Arc<Self> {
        Arc::new(Self { config, fs })
    }

    /// Creates a context over the OS file system.
    #[must_use]
    pub fn os(config: Config) -> Arc<Self> {
        Self::new(config, Arc::new(OsFileSystem::new()))
    }

    /// Creates a context over a fresh in-memory file system.
    #[must_use]
    pub fn in_memory(config: Config) -> Arc<Self> {
        Self::new(config, Arc::new(InMemoryFileSystem::new()))
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the file system.
    #[must_use]
    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Returns true if `name` carries the configured journal file extension.
    #[must_use]
    pub fn is_journal_file_name(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.config.file_extension)
    }

    /// Fsyncs a directory when `sync_on_move` is enabled.
    pub(crate) fn sync_dir(&self, dir: &Path) -> crate::CoreResult<()> {
        if self.config.sync_on_move {
            self.fs.sync_dir(dir)?;
        }
        Ok(())
    }
}
