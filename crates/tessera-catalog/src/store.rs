//! Durable sys store backed by redb.
//!
//! Provides typed put/delete/load methods for each record family. Writes
//! are synchronous (write txn + commit) and must succeed before the owning
//! operation is acknowledged; a newly elected leader reloads everything
//! through the load methods. Reads go through the in-memory registries in
//! the service layer — this module only handles persistence.

use crate::tables;
use crate::types::{ReplicationUniverse, RestorationEntry, SnapshotEntry};
use redb::{Database, ReadableTable};
use std::path::Path;
use tessera_common::{Error, RestorationId, SnapshotId, TableDescriptor, TableId, UniverseId};
use tracing::error;

/// Error type for sys store operations
#[derive(Debug, thiserror::Error)]
pub enum SysStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::TransactionError> for SysStoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<SysStoreError> for Error {
    fn from(e: SysStoreError) -> Self {
        Self::Persistence(e.to_string())
    }
}

pub type SysStoreResult<T> = Result<T, SysStoreError>;

/// Durable sys store backed by redb.
pub struct SysStore {
    db: Database,
}

impl SysStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> SysStoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create all tables eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::CATALOG_TABLES)?;
            let _t = write_txn.open_table(tables::SNAPSHOTS)?;
            let _t = write_txn.open_table(tables::RESTORATIONS)?;
            let _t = write_txn.open_table(tables::UNIVERSES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // ---- Catalog tables ----

    pub fn put_table(&self, table: &TableDescriptor) -> SysStoreResult<()> {
        self.put_bincode(tables::CATALOG_TABLES, table.id.as_str(), table)
    }

    pub fn delete_table(&self, id: &TableId) -> SysStoreResult<()> {
        self.delete_key(tables::CATALOG_TABLES, id.as_str())
    }

    pub fn load_tables(&self) -> SysStoreResult<Vec<TableDescriptor>> {
        self.load_bincode_table(tables::CATALOG_TABLES)
    }

    // ---- Snapshots ----

    pub fn put_snapshot(&self, entry: &SnapshotEntry) -> SysStoreResult<()> {
        self.put_bincode(tables::SNAPSHOTS, &entry.id.to_string(), entry)
    }

    pub fn delete_snapshot(&self, id: &SnapshotId) -> SysStoreResult<()> {
        self.delete_key(tables::SNAPSHOTS, &id.to_string())
    }

    pub fn load_snapshots(&self) -> SysStoreResult<Vec<SnapshotEntry>> {
        self.load_bincode_table(tables::SNAPSHOTS)
    }

    // ---- Restorations ----

    pub fn put_restoration(&self, entry: &RestorationEntry) -> SysStoreResult<()> {
        self.put_bincode(tables::RESTORATIONS, &entry.id.to_string(), entry)
    }

    pub fn delete_restoration(&self, id: &RestorationId) -> SysStoreResult<()> {
        self.delete_key(tables::RESTORATIONS, &id.to_string())
    }

    pub fn load_restorations(&self) -> SysStoreResult<Vec<RestorationEntry>> {
        self.load_bincode_table(tables::RESTORATIONS)
    }

    // ---- Replication universes ----

    pub fn put_universe(&self, universe: &ReplicationUniverse) -> SysStoreResult<()> {
        self.put_bincode(tables::UNIVERSES, universe.universe_id.as_str(), universe)
    }

    pub fn delete_universe(&self, id: &UniverseId) -> SysStoreResult<()> {
        self.delete_key(tables::UNIVERSES, id.as_str())
    }

    pub fn load_universes(&self) -> SysStoreResult<Vec<ReplicationUniverse>> {
        self.load_bincode_table(tables::UNIVERSES)
    }

    // ---- Generic helpers ----

    fn put_bincode<T: serde::Serialize>(
        &self,
        table_def: redb::TableDefinition<&str, &[u8]>,
        key: &str,
        value: &T,
    ) -> SysStoreResult<()> {
        let bytes = bincode::serialize(value)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table_def)?;
            table.insert(key, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_key(
        &self,
        table_def: redb::TableDefinition<&str, &[u8]>,
        key: &str,
    ) -> SysStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table_def)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn load_bincode_table<T: serde::de::DeserializeOwned>(
        &self,
        table_def: redb::TableDefinition<&str, &[u8]>,
    ) -> SysStoreResult<Vec<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_def)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            let key = entry.0.value().to_string();
            let bytes = entry.1.value();
            match bincode::deserialize::<T>(bytes) {
                Ok(val) => result.push(val),
                Err(e) => error!("Failed to decode sys store entry '{}': {}", key, e),
            }
        }
        Ok(result)
    }
}
