//! In-memory single-cluster fixture for backup tests.
//!
//! `FakeTablets` stands in for the storage shards: rows carry their
//! commit hybrid time, snapshots copy a tablet's rows, and restore
//! replaces live rows with the captured ones at or before the cut-off.
//! Failure injection and gating hooks let tests exercise the FAILED
//! paths and in-flight states deterministically.

use crate::restore::RestorationController;
use crate::snapshot::SnapshotManager;
use crate::tablet::{RetryPolicy, TabletProxy};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tessera_catalog::{Catalog, CreateTableSpec, SysStore};
use tessera_common::{
    Clock, ColumnSchema, ColumnType, Error, HybridTime, ManualClock, PartitionSchema, Result,
    Schema, SnapshotId, TableDescriptor, TableName, TabletId,
};

#[derive(Clone, Copy, Debug)]
struct Row {
    value: i32,
    committed_at: HybridTime,
}

type TabletRows = BTreeMap<i32, Row>;

/// Fake shard fleet implementing [`TabletProxy`]
#[derive(Default)]
pub(crate) struct FakeTablets {
    rows: Mutex<HashMap<TabletId, TabletRows>>,
    snapshots: Mutex<HashMap<(TabletId, SnapshotId), TabletRows>>,
    fail_create: Mutex<HashSet<TabletId>>,
    fail_restore: Mutex<HashSet<TabletId>>,
    creates_held: AtomicBool,
    restores_held: AtomicBool,
}

impl FakeTablets {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail_create_on(&self, tablet: &TabletId) {
        self.fail_create.lock().insert(tablet.clone());
    }

    pub(crate) fn fail_restore_on(&self, tablet: &TabletId) {
        self.fail_restore.lock().insert(tablet.clone());
    }

    pub(crate) fn clear_restore_failures(&self) {
        self.fail_restore.lock().clear();
    }

    /// Park snapshot creation calls until released
    pub(crate) fn hold_creates(&self) {
        self.creates_held.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release_creates(&self) {
        self.creates_held.store(false, Ordering::SeqCst);
    }

    /// Park restore calls until released
    pub(crate) fn hold_restores(&self) {
        self.restores_held.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release_restores(&self) {
        self.restores_held.store(false, Ordering::SeqCst);
    }

    fn write(&self, tablet: &TabletId, key: i32, value: i32, committed_at: HybridTime) {
        self.rows
            .lock()
            .entry(tablet.clone())
            .or_default()
            .insert(key, Row { value, committed_at });
    }

    fn delete(&self, tablet: &TabletId, key: i32) {
        if let Some(rows) = self.rows.lock().get_mut(tablet) {
            rows.remove(&key);
        }
    }

    fn read(&self, tablet: &TabletId, key: i32) -> Option<i32> {
        self.rows
            .lock()
            .get(tablet)
            .and_then(|rows| rows.get(&key))
            .map(|row| row.value)
    }

    async fn gate(held: &AtomicBool) {
        while held.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

#[async_trait]
impl TabletProxy for FakeTablets {
    async fn create_tablet_snapshot(
        &self,
        tablet: &TabletId,
        snapshot: &SnapshotId,
    ) -> Result<()> {
        Self::gate(&self.creates_held).await;
        if self.fail_create.lock().contains(tablet) {
            return Err(Error::Unavailable(format!("tablet {tablet} unreachable")));
        }
        let rows = self.rows.lock().get(tablet).cloned().unwrap_or_default();
        self.snapshots
            .lock()
            .insert((tablet.clone(), *snapshot), rows);
        Ok(())
    }

    async fn delete_tablet_snapshot(
        &self,
        tablet: &TabletId,
        snapshot: &SnapshotId,
    ) -> Result<()> {
        self.snapshots.lock().remove(&(tablet.clone(), *snapshot));
        Ok(())
    }

    async fn restore_tablet_snapshot(
        &self,
        tablet: &TabletId,
        snapshot: &SnapshotId,
        restore_at: HybridTime,
    ) -> Result<()> {
        Self::gate(&self.restores_held).await;
        if self.fail_restore.lock().contains(tablet) {
            return Err(Error::Unavailable(format!("tablet {tablet} unreachable")));
        }
        let captured = self
            .snapshots
            .lock()
            .get(&(tablet.clone(), *snapshot))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("snapshot {snapshot} on tablet {tablet}")))?;
        let restored: TabletRows = captured
            .into_iter()
            .filter(|(_, row)| row.committed_at <= restore_at)
            .collect();
        self.rows.lock().insert(tablet.clone(), restored);
        Ok(())
    }
}

/// One fully wired control plane over fake tablets
pub(crate) struct Fixture {
    #[allow(dead_code)]
    dir: TempDir,
    pub(crate) store: Arc<SysStore>,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) tablets: Arc<FakeTablets>,
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) retry: RetryPolicy,
    pub(crate) manager: Arc<SnapshotManager>,
    pub(crate) restorer: Arc<RestorationController>,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SysStore::open(dir.path().join("sys_catalog.redb")).unwrap());
        let catalog = Arc::new(Catalog::open(Arc::clone(&store)).unwrap());
        let tablets = FakeTablets::new();
        let clock = Arc::new(ManualClock::new(HybridTime::from_micros(1_000_000)));
        let retry = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        };
        let manager = SnapshotManager::open(
            Arc::clone(&catalog),
            Arc::clone(&store),
            tablets.clone(),
            clock.clone(),
            retry,
        )
        .unwrap();
        let restorer = RestorationController::open(
            Arc::clone(&store),
            tablets.clone(),
            clock.clone(),
            retry,
            Arc::clone(&manager),
        )
        .unwrap();
        Self {
            dir,
            store,
            catalog,
            tablets,
            clock,
            retry,
            manager,
            restorer,
        }
    }

    fn kv_schema(transactional: bool) -> Schema {
        Schema::new(
            vec![
                ColumnSchema::key("k", ColumnType::Int32),
                ColumnSchema::value("v", ColumnType::Int32),
            ],
            transactional,
        )
    }

    pub(crate) fn create_kv_table(
        &self,
        keyspace: &str,
        name: &str,
        transactional: bool,
    ) -> TableDescriptor {
        self.catalog
            .create_table(CreateTableSpec {
                name: TableName::new(keyspace, name),
                schema: Self::kv_schema(transactional),
                partition: PartitionSchema::hash(vec!["k".into()], 3),
                indexed_table: None,
            })
            .unwrap()
    }

    /// Same name shape as `create_kv_table` but a different schema
    pub(crate) fn create_wide_table(&self, keyspace: &str, name: &str) -> TableDescriptor {
        let mut schema = Self::kv_schema(false);
        schema
            .columns
            .push(ColumnSchema::value("extra", ColumnType::String));
        self.catalog
            .create_table(CreateTableSpec {
                name: TableName::new(keyspace, name),
                schema,
                partition: PartitionSchema::hash(vec!["k".into()], 3),
                indexed_table: None,
            })
            .unwrap()
    }

    /// Attach a covering index on `v` to an existing table
    pub(crate) fn create_index(&self, table: &TableDescriptor, index_name: &str) -> TableDescriptor {
        self.catalog
            .create_table(CreateTableSpec {
                name: TableName::new(table.name.keyspace.clone(), index_name),
                schema: Schema::new(
                    vec![
                        ColumnSchema::key("v", ColumnType::Int32),
                        ColumnSchema::value("k", ColumnType::Int32),
                    ],
                    false,
                ),
                partition: PartitionSchema::hash(vec!["v".into()], 3),
                indexed_table: Some(table.id.clone()),
            })
            .unwrap()
    }

    /// Create a table plus one index; returns the table with its index
    /// back-reference populated.
    pub(crate) fn create_indexed_kv_table(
        &self,
        keyspace: &str,
        name: &str,
        index_name: &str,
    ) -> TableDescriptor {
        let table = self.create_kv_table(keyspace, name, false);
        self.create_index(&table, index_name);
        self.catalog.lookup(&table.id).unwrap()
    }

    fn route(table: &TableDescriptor, key: i32) -> &TabletId {
        &table.tablet_ids[key.unsigned_abs() as usize % table.tablet_ids.len()]
    }

    /// Write a row, returning its commit time
    pub(crate) fn write_row(&self, table: &TableDescriptor, key: i32, value: i32) -> HybridTime {
        self.clock.advance(Duration::from_millis(1));
        let committed_at = self.clock.now();
        self.tablets
            .write(Self::route(table, key), key, value, committed_at);
        committed_at
    }

    pub(crate) fn delete_row(&self, table: &TableDescriptor, key: i32) {
        self.tablets.delete(Self::route(table, key), key);
    }

    pub(crate) fn read_row(&self, table: &TableDescriptor, key: i32) -> Option<i32> {
        self.tablets.read(Self::route(table, key), key)
    }
}

/// Poll `check` until it holds or the attempt budget runs out.
pub(crate) async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..500 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
