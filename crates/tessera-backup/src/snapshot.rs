//! Snapshot manager: consistent point-in-time captures across shards.
//!
//! Creation durably records a CREATING entry, then coordinates a cut
//! across every tablet owning the requested tables. The entry reaches
//! COMPLETE only after every tablet acknowledges; any exhausted shard
//! failure marks it FAILED — there are no partial snapshots. Entries are
//! written through the sys store on every transition so a new leader can
//! resume in-flight work.

use crate::tablet::{RetryPolicy, TabletProxy};
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tessera_catalog::{Catalog, SnapshotEntry, SnapshotState, SysStore, TableRef};
use tessera_common::{Clock, Error, Result, SnapshotId, TableId, TableName, TabletId};
use tracing::{error, info, warn};

/// Leader-side snapshot registry and coordination driver
pub struct SnapshotManager {
    pub(crate) catalog: Arc<Catalog>,
    store: Arc<SysStore>,
    tablets: Arc<dyn TabletProxy>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    snapshots: RwLock<HashMap<SnapshotId, SnapshotEntry>>,
}

impl SnapshotManager {
    /// Hydrate the manager from the sys store.
    ///
    /// Call [`SnapshotManager::resume`] afterwards (inside a runtime) to
    /// re-drive non-terminal entries.
    pub fn open(
        catalog: Arc<Catalog>,
        store: Arc<SysStore>,
        tablets: Arc<dyn TabletProxy>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Result<Arc<Self>> {
        let mut snapshots = HashMap::new();
        for entry in store.load_snapshots()? {
            snapshots.insert(entry.id, entry);
        }
        info!("Snapshot manager loaded {} entries", snapshots.len());
        Ok(Arc::new(Self {
            catalog,
            store,
            tablets,
            clock,
            retry,
            snapshots: RwLock::new(snapshots),
        }))
    }

    /// Re-drive coordination for entries a previous leader left in flight.
    ///
    /// Terminal entries are left untouched.
    pub fn resume(self: &Arc<Self>) {
        let pending: Vec<(SnapshotId, SnapshotState)> = self
            .snapshots
            .read()
            .values()
            .filter(|e| matches!(e.state, SnapshotState::Creating | SnapshotState::Deleting))
            .map(|e| (e.id, e.state))
            .collect();
        for (id, state) in pending {
            info!("Resuming snapshot {} in state {:?}", id, state);
            let manager = Arc::clone(self);
            match state {
                SnapshotState::Creating => {
                    tokio::spawn(async move { manager.drive_create(id).await });
                }
                SnapshotState::Deleting => {
                    tokio::spawn(async move { manager.drive_delete(id).await });
                }
                _ => {}
            }
        }
    }

    /// Start a snapshot of the given tables (indexes are captured with
    /// their tables). Returns once the CREATING entry is durable; callers
    /// observe completion by polling [`SnapshotManager::list_snapshots`].
    pub fn create_snapshot(self: &Arc<Self>, tables: &[TableName]) -> Result<SnapshotId> {
        if tables.is_empty() {
            return Err(Error::invalid_argument(
                "cannot create a snapshot of an empty table set",
            ));
        }

        let mut table_refs = Vec::with_capacity(tables.len());
        for name in tables {
            let descriptor = self
                .catalog
                .lookup_by_name(name)
                .ok_or_else(|| Error::not_found(format!("table {name}")))?;
            if descriptor.is_index() {
                return Err(Error::invalid_argument(format!(
                    "{name} is an index; snapshot its indexed table instead"
                )));
            }
            let mut tablet_ids = descriptor.tablet_ids.clone();
            for index_id in &descriptor.indexes {
                tablet_ids.extend(self.catalog.lookup(index_id)?.tablet_ids);
            }
            table_refs.push(TableRef {
                table_id: descriptor.id,
                index_ids: descriptor.indexes,
                tablet_ids,
            });
        }
        let table_ids: Vec<TableId> = table_refs.iter().map(|r| r.table_id.clone()).collect();

        let entry = SnapshotEntry {
            id: SnapshotId::new(),
            state: SnapshotState::Creating,
            table_refs,
            created_at: self.clock.now(),
            diagnostic: None,
        };
        let id = entry.id;

        {
            let mut snapshots = self.snapshots.write();
            if let Some(conflict) = snapshots
                .values()
                .find(|e| e.state == SnapshotState::Creating && e.overlaps(&table_ids))
            {
                return Err(Error::illegal_state(format!(
                    "snapshot {} is already being created for an overlapping table set",
                    conflict.id
                )));
            }
            self.store.put_snapshot(&entry)?;
            snapshots.insert(id, entry);
        }

        info!("Snapshot {} created over {} tables", id, tables.len());
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.drive_create(id).await });
        Ok(id)
    }

    /// All snapshot entries, ordered by creation time.
    ///
    /// Safe to call concurrently with creation; reflects in-flight state.
    pub fn list_snapshots(&self) -> Vec<SnapshotEntry> {
        let mut entries: Vec<_> = self.snapshots.read().values().cloned().collect();
        entries.sort_by_key(|e| (e.created_at, e.id.to_string()));
        entries
    }

    /// Look up a single snapshot entry.
    pub fn get(&self, id: &SnapshotId) -> Result<SnapshotEntry> {
        self.snapshots
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("snapshot {id}")))
    }

    /// Delete a snapshot. Idempotent once deletion has started; a FAILED
    /// snapshot left no tablet data, so its record is simply dropped.
    pub fn delete_snapshot(self: &Arc<Self>, id: &SnapshotId) -> Result<()> {
        let mut snapshots = self.snapshots.write();
        let entry = snapshots
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("snapshot {id}")))?;
        match entry.state {
            SnapshotState::Deleted | SnapshotState::Deleting => Ok(()),
            SnapshotState::Creating => Err(Error::illegal_state(format!(
                "snapshot {id} is still being created"
            ))),
            SnapshotState::Failed => {
                self.store.delete_snapshot(id)?;
                snapshots.remove(id);
                Ok(())
            }
            SnapshotState::Complete => {
                entry.state = SnapshotState::Deleting;
                self.store.put_snapshot(entry)?;
                let manager = Arc::clone(self);
                let id = *id;
                tokio::spawn(async move { manager.drive_delete(id).await });
                Ok(())
            }
        }
    }

    /// Transition an entry, persisting the new state. Same-state is a
    /// no-op; a non-monotonic transition is ignored with a warning.
    fn set_state(
        &self,
        id: SnapshotId,
        next: SnapshotState,
        diagnostic: Option<String>,
    ) -> Result<()> {
        let mut snapshots = self.snapshots.write();
        let entry = snapshots
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("snapshot {id}")))?;
        if entry.state == next {
            return Ok(());
        }
        if !entry.state.can_transition_to(next) {
            warn!(
                "Ignoring snapshot {} transition {:?} -> {:?}",
                id, entry.state, next
            );
            return Ok(());
        }
        entry.state = next;
        if diagnostic.is_some() {
            entry.diagnostic = diagnostic;
        }
        self.store.put_snapshot(entry)?;
        Ok(())
    }

    /// Fan out the consistent cut to every tablet; fan in acknowledgments.
    async fn drive_create(self: Arc<Self>, id: SnapshotId) {
        let Ok(entry) = self.get(&id) else { return };
        if entry.state != SnapshotState::Creating {
            return;
        }

        let outcome = self.fan_out(&entry, |proxy, tablet| async move {
            proxy.create_tablet_snapshot(&tablet, &id).await
        });
        let result = match outcome.await {
            Ok(()) => {
                info!("Snapshot {} complete", id);
                self.set_state(id, SnapshotState::Complete, None)
            }
            Err((tablet, e)) => {
                warn!("Snapshot {} failed on tablet {}: {}", id, tablet, e);
                self.set_state(
                    id,
                    SnapshotState::Failed,
                    Some(format!("tablet {tablet}: {e}")),
                )
            }
        };
        if let Err(e) = result {
            error!("Failed to persist snapshot {} transition: {}", id, e);
        }
    }

    async fn drive_delete(self: Arc<Self>, id: SnapshotId) {
        let Ok(entry) = self.get(&id) else { return };
        if entry.state != SnapshotState::Deleting {
            return;
        }

        let outcome = self.fan_out(&entry, |proxy, tablet| async move {
            proxy.delete_tablet_snapshot(&tablet, &id).await
        });
        let result = match outcome.await {
            Ok(()) => {
                info!("Snapshot {} deleted", id);
                self.set_state(id, SnapshotState::Deleted, None)
            }
            Err((tablet, e)) => self.set_state(
                id,
                SnapshotState::Failed,
                Some(format!("tablet {tablet}: {e}")),
            ),
        };
        if let Err(e) = result {
            error!("Failed to persist snapshot {} transition: {}", id, e);
        }
    }

    /// Run `op` against every tablet of the entry with bounded retries,
    /// returning the first failure with the offending tablet id.
    async fn fan_out<F, Fut>(
        &self,
        entry: &SnapshotEntry,
        op: F,
    ) -> std::result::Result<(), (TabletId, Error)>
    where
        F: Fn(Arc<dyn TabletProxy>, TabletId) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let tablets: Vec<TabletId> = entry
            .table_refs
            .iter()
            .flat_map(|r| r.tablet_ids.iter().cloned())
            .collect();
        let results = join_all(tablets.into_iter().map(|tablet| {
            let what = format!("snapshot {} coordination on tablet {}", entry.id, tablet);
            let proxy = Arc::clone(&self.tablets);
            let op = &op;
            async move {
                self.retry
                    .run(&what, || op(Arc::clone(&proxy), tablet.clone()))
                    .await
                    .map_err(|e| (tablet, e))
            }
        }))
        .await;
        results.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, eventually};

    #[tokio::test]
    async fn test_create_snapshot_completes() {
        let fx = Fixture::new();
        let table = fx.create_kv_table("ks", "t", false);
        fx.write_row(&table, 1, 1);

        let id = fx.manager.create_snapshot(&[table.name.clone()]).unwrap();
        assert!(
            eventually(|| fx.manager.get(&id).unwrap().state == SnapshotState::Complete).await
        );

        let listed = fx.manager.list_snapshots();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].table_refs[0].table_id, table.id);
    }

    #[tokio::test]
    async fn test_empty_table_set_rejected() {
        let fx = Fixture::new();
        let err = fx.manager.create_snapshot(&[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_unknown_table_rejected() {
        let fx = Fixture::new();
        let err = fx
            .manager
            .create_snapshot(&[TableName::new("ks", "missing")])
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("ks.missing not found"));
    }

    #[tokio::test]
    async fn test_shard_failure_marks_snapshot_failed() {
        let fx = Fixture::new();
        let table = fx.create_kv_table("ks", "t", false);
        fx.tablets.fail_create_on(&table.tablet_ids[0]);

        let id = fx.manager.create_snapshot(&[table.name.clone()]).unwrap();
        assert!(eventually(|| fx.manager.get(&id).unwrap().state == SnapshotState::Failed).await);

        let entry = fx.manager.get(&id).unwrap();
        let diagnostic = entry.diagnostic.unwrap();
        assert!(diagnostic.contains(table.tablet_ids[0].as_str()));
    }

    #[tokio::test]
    async fn test_concurrent_creation_on_same_tables_rejected() {
        let fx = Fixture::new();
        let table = fx.create_kv_table("ks", "t", false);

        fx.tablets.hold_creates();
        let first = fx.manager.create_snapshot(&[table.name.clone()]).unwrap();
        let err = fx
            .manager
            .create_snapshot(&[table.name.clone()])
            .unwrap_err();
        assert!(err.is_illegal_state());
        assert!(err.to_string().contains(&first.to_string()));

        fx.tablets.release_creates();
        assert!(
            eventually(|| fx.manager.get(&first).unwrap().state == SnapshotState::Complete).await
        );
    }

    #[tokio::test]
    async fn test_independent_table_sets_proceed_in_parallel() {
        let fx = Fixture::new();
        let t1 = fx.create_kv_table("ks", "t1", false);
        let t2 = fx.create_kv_table("ks", "t2", false);

        let a = fx.manager.create_snapshot(&[t1.name.clone()]).unwrap();
        let b = fx.manager.create_snapshot(&[t2.name.clone()]).unwrap();
        assert!(eventually(|| fx.manager.get(&a).unwrap().state == SnapshotState::Complete).await);
        assert!(eventually(|| fx.manager.get(&b).unwrap().state == SnapshotState::Complete).await);
    }

    #[tokio::test]
    async fn test_delete_snapshot() {
        let fx = Fixture::new();
        let table = fx.create_kv_table("ks", "t", false);
        let id = fx.manager.create_snapshot(&[table.name.clone()]).unwrap();
        assert!(
            eventually(|| fx.manager.get(&id).unwrap().state == SnapshotState::Complete).await
        );

        fx.manager.delete_snapshot(&id).unwrap();
        assert!(eventually(|| fx.manager.get(&id).unwrap().state == SnapshotState::Deleted).await);
        // Idempotent once deleted.
        fx.manager.delete_snapshot(&id).unwrap();

        let missing = SnapshotId::new();
        assert!(fx.manager.delete_snapshot(&missing).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_resume_redrives_in_flight_creation() {
        let fx = Fixture::new();
        let table = fx.create_kv_table("ks", "t", false);

        fx.tablets.hold_creates();
        let id = fx.manager.create_snapshot(&[table.name.clone()]).unwrap();

        // Simulate leader failover: reopen from the same sys store while
        // the old coordination task is still gated.
        let manager = SnapshotManager::open(
            Arc::clone(&fx.catalog),
            Arc::clone(&fx.store),
            fx.tablets.clone(),
            fx.clock.clone(),
            fx.retry,
        )
        .unwrap();
        assert_eq!(manager.get(&id).unwrap().state, SnapshotState::Creating);

        fx.tablets.release_creates();
        manager.resume();
        assert!(eventually(|| manager.get(&id).unwrap().state == SnapshotState::Complete).await);
    }

    #[tokio::test]
    async fn test_terminal_entries_survive_reopen_unchanged() {
        let fx = Fixture::new();
        let table = fx.create_kv_table("ks", "t", false);
        let id = fx.manager.create_snapshot(&[table.name.clone()]).unwrap();
        assert!(
            eventually(|| fx.manager.get(&id).unwrap().state == SnapshotState::Complete).await
        );
        let before = fx.manager.get(&id).unwrap();

        let manager = SnapshotManager::open(
            Arc::clone(&fx.catalog),
            Arc::clone(&fx.store),
            fx.tablets.clone(),
            fx.clock.clone(),
            fx.retry,
        )
        .unwrap();
        manager.resume();
        assert_eq!(manager.get(&id).unwrap(), before);
    }
}
