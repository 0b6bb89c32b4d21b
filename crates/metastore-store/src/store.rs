//! The store handle.

use std::path::{Path, PathBuf};

use redb::backends::InMemoryBackend;
use redb::{Builder, Database as Engine};

use metastore_common::error::MetastoreResult;

use crate::txn::{ReadTx, WriteTx, ENTRIES, REGIONS};

/// Store configuration.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Path of the catalog file. Ignored when `memory` is set.
    pub path: Option<PathBuf>,
    /// Keep the catalog in memory only.
    pub memory: bool,
    /// Fill an empty partition location from its storage descriptor when
    /// the partition is added.
    pub copy_sd_location: bool,
}

impl StoreConfig {
    /// Creates an in-memory configuration.
    pub fn in_memory() -> Self {
        Self {
            memory: true,
            ..Default::default()
        }
    }

    /// Creates a configuration backed by a file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Sets the write-side location fallback.
    #[must_use]
    pub fn copy_sd_location(mut self, enabled: bool) -> Self {
        self.copy_sd_location = enabled;
        self
    }
}

/// Handle to the catalog.
///
/// Owns the storage engine. Share it with `Arc`; every operation opens its
/// own transaction, so the handle itself needs no locking. Write
/// transactions are serialized by the engine; reads see the last
/// committed state.
pub struct MetaStore {
    engine: Engine,
    config: StoreConfig,
}

impl MetaStore {
    /// Opens a store with the given configuration.
    pub fn open(config: StoreConfig) -> MetastoreResult<Self> {
        let engine = match (&config.path, config.memory) {
            (Some(path), false) => {
                tracing::info!("Opening catalog at {:?}", path);
                Engine::create(path)?
            }
            _ => {
                tracing::info!("Opening in-memory catalog");
                Builder::new().create_with_backend(InMemoryBackend::new())?
            }
        };

        let store = Self { engine, config };
        store.init_tables()?;
        Ok(store)
    }

    /// Opens an in-memory store.
    pub fn open_memory() -> MetastoreResult<Self> {
        Self::open(StoreConfig::in_memory())
    }

    /// Opens (or creates) a store backed by the file at `path`.
    pub fn open_path(path: impl AsRef<Path>) -> MetastoreResult<Self> {
        Self::open(StoreConfig::with_path(path.as_ref()))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn init_tables(&self) -> MetastoreResult<()> {
        let txn = self.engine.begin_write()?;
        {
            txn.open_table(REGIONS)?;
            txn.open_table(ENTRIES)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Runs `f` in a write transaction.
    ///
    /// Commits when `f` succeeds. When `f` fails the transaction is aborted
    /// and the error from `f` is returned.
    pub(crate) fn update<T, F>(&self, f: F) -> MetastoreResult<T>
    where
        F: FnOnce(&mut WriteTx<'_>) -> MetastoreResult<T>,
    {
        let txn = self.engine.begin_write()?;
        let result = {
            let mut tx = WriteTx::open(&txn)?;
            f(&mut tx)
        };

        match result {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = txn.abort() {
                    tracing::warn!("Failed to abort transaction: {}", abort_err);
                }
                Err(err)
            }
        }
    }

    /// Runs `f` against a read-only snapshot.
    pub(crate) fn view<T, F>(&self, f: F) -> MetastoreResult<T>
    where
        F: FnOnce(&ReadTx) -> MetastoreResult<T>,
    {
        let tx = ReadTx::open(self.engine.begin_read()?)?;
        f(&tx)
    }
}

impl std::fmt::Debug for MetaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = StoreConfig::in_memory();
        assert!(config.memory);
        assert!(!config.copy_sd_location);

        let config = StoreConfig::with_path("/tmp/x.db").copy_sd_location(true);
        assert_eq!(config.path, Some(PathBuf::from("/tmp/x.db")));
        assert!(!config.memory);
        assert!(config.copy_sd_location);
    }

    #[test]
    fn test_open_memory() {
        let store = MetaStore::open_memory().unwrap();
        assert!(store.config().memory);
        store.view(|_| Ok(())).unwrap();
    }

    #[test]
    fn test_open_path_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hms2.db");
        let store = MetaStore::open_path(&path).unwrap();
        assert!(path.exists());
        drop(store);

        // Reopening an existing file works.
        MetaStore::open_path(&path).unwrap();
    }
}
