//! Time-travel restoration from completed snapshots.
//!
//! A restoration rolls every tablet captured by a snapshot back to the
//! content as of a cut-off time: the snapshot's own creation time, or an
//! earlier caller-supplied target. Each attempt is its own durable entry
//! with an independent lifecycle; only one non-terminal restoration may
//! cover a given table at a time.

use crate::snapshot::SnapshotManager;
use crate::tablet::{RetryPolicy, TabletProxy};
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tessera_catalog::{RestorationEntry, RestorationState, SnapshotState, SysStore};
use tessera_common::{
    Clock, Error, RestorationId, RestoreTarget, Result, SnapshotId, TableId,
};
use tracing::{error, info, warn};

/// Leader-side restoration registry and coordination driver
pub struct RestorationController {
    store: Arc<SysStore>,
    tablets: Arc<dyn TabletProxy>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    snapshots: Arc<SnapshotManager>,
    restorations: RwLock<HashMap<RestorationId, RestorationEntry>>,
}

impl RestorationController {
    /// Hydrate the controller from the sys store.
    pub fn open(
        store: Arc<SysStore>,
        tablets: Arc<dyn TabletProxy>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        snapshots: Arc<SnapshotManager>,
    ) -> Result<Arc<Self>> {
        let mut restorations = HashMap::new();
        for entry in store.load_restorations()? {
            restorations.insert(entry.id, entry);
        }
        info!("Restoration controller loaded {} entries", restorations.len());
        Ok(Arc::new(Self {
            store,
            tablets,
            clock,
            retry,
            snapshots,
            restorations: RwLock::new(restorations),
        }))
    }

    /// Re-drive restorations a previous leader left in flight.
    pub fn resume(self: &Arc<Self>) {
        let pending: Vec<RestorationId> = self
            .restorations
            .read()
            .values()
            .filter(|e| !e.state.is_terminal())
            .map(|e| e.id)
            .collect();
        for id in pending {
            info!("Resuming restoration {}", id);
            let controller = Arc::clone(self);
            tokio::spawn(async move { controller.drive_restore(id).await });
        }
    }

    /// Start restoring a completed snapshot.
    ///
    /// Without a target the cut-off is the snapshot's creation time. A
    /// relative target is resolved against the time this request is
    /// processed, not against snapshot creation.
    pub fn restore_snapshot(
        self: &Arc<Self>,
        snapshot_id: &SnapshotId,
        target: Option<RestoreTarget>,
    ) -> Result<RestorationId> {
        let snapshot = self
            .snapshots
            .get(snapshot_id)
            .map_err(|_| Error::not_found(format!("completed snapshot {snapshot_id}")))?;
        if snapshot.state != SnapshotState::Complete {
            return Err(Error::not_found(format!(
                "completed snapshot {snapshot_id}"
            )));
        }

        let requested_at = self.clock.now();
        let restore_at = match target {
            Some(target) => target.resolve(requested_at)?,
            None => snapshot.created_at,
        };
        let table_ids: Vec<TableId> =
            snapshot.table_refs.iter().map(|r| r.table_id.clone()).collect();

        let entry = RestorationEntry {
            id: RestorationId::new(),
            snapshot_id: *snapshot_id,
            state: RestorationState::Created,
            requested_at,
            restore_at,
            table_refs: snapshot.table_refs,
            diagnostic: None,
        };
        let id = entry.id;

        {
            let mut restorations = self.restorations.write();
            if let Some(conflict) = restorations
                .values()
                .find(|e| !e.state.is_terminal() && e.overlaps(&table_ids))
            {
                return Err(Error::illegal_state(format!(
                    "restoration {} is already in progress for an overlapping table set",
                    conflict.id
                )));
            }
            self.store.put_restoration(&entry)?;
            restorations.insert(id, entry);
        }

        info!(
            "Restoration {} created from snapshot {} at cut-off {}",
            id, snapshot_id, restore_at
        );
        let controller = Arc::clone(self);
        tokio::spawn(async move { controller.drive_restore(id).await });
        Ok(id)
    }

    /// All restoration entries, ordered by request time.
    pub fn list_restorations(&self) -> Vec<RestorationEntry> {
        let mut entries: Vec<_> = self.restorations.read().values().cloned().collect();
        entries.sort_by_key(|e| (e.requested_at, e.id.to_string()));
        entries
    }

    /// Look up a single restoration entry.
    pub fn get(&self, id: &RestorationId) -> Result<RestorationEntry> {
        self.restorations
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("restoration {id}")))
    }

    fn set_state(
        &self,
        id: RestorationId,
        next: RestorationState,
        diagnostic: Option<String>,
    ) -> Result<()> {
        let mut restorations = self.restorations.write();
        let entry = restorations
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("restoration {id}")))?;
        if entry.state == next {
            return Ok(());
        }
        if !entry.state.can_transition_to(next) {
            warn!(
                "Ignoring restoration {} transition {:?} -> {:?}",
                id, entry.state, next
            );
            return Ok(());
        }
        entry.state = next;
        if diagnostic.is_some() {
            entry.diagnostic = diagnostic;
        }
        self.store.put_restoration(entry)?;
        Ok(())
    }

    async fn drive_restore(self: Arc<Self>, id: RestorationId) {
        let Ok(entry) = self.get(&id) else { return };
        if entry.state.is_terminal() {
            return;
        }

        // The capture is only restorable while every table it covers
        // still resolves to the same identity; a table replaced since the
        // snapshot was taken fails the whole attempt rather than partially
        // applying.
        for table_id in entry.captured_table_ids() {
            if self.snapshots.catalog.lookup(&table_id).is_err() {
                warn!(
                    "Restoration {} aborted: table {} no longer exists",
                    id, table_id
                );
                self.finish(
                    id,
                    RestorationState::Failed,
                    Some(format!("table {table_id} not found; snapshot is not restorable")),
                );
                return;
            }
        }

        if let Err(e) = self.set_state(id, RestorationState::Restoring, None) {
            error!("Failed to persist restoration {} transition: {}", id, e);
            return;
        }

        let tablets: Vec<_> = entry
            .table_refs
            .iter()
            .flat_map(|r| r.tablet_ids.iter().cloned())
            .collect();
        let snapshot_id = entry.snapshot_id;
        let restore_at = entry.restore_at;
        let results = join_all(tablets.into_iter().map(|tablet| {
            let what = format!("restoration {id} on tablet {tablet}");
            let proxy = Arc::clone(&self.tablets);
            let retry = self.retry;
            async move {
                retry
                    .run(&what, || {
                        proxy.restore_tablet_snapshot(&tablet, &snapshot_id, restore_at)
                    })
                    .await
                    .map_err(|e| (tablet, e))
            }
        }))
        .await;

        match results.into_iter().collect::<std::result::Result<(), _>>() {
            Ok(()) => {
                info!("Restoration {} complete", id);
                self.finish(id, RestorationState::Restored, None);
            }
            Err((tablet, e)) => {
                warn!("Restoration {} failed on tablet {}: {}", id, tablet, e);
                self.finish(
                    id,
                    RestorationState::Failed,
                    Some(format!("tablet {tablet}: {e}")),
                );
            }
        }
    }

    fn finish(&self, id: RestorationId, state: RestorationState, diagnostic: Option<String>) {
        if let Err(e) = self.set_state(id, state, diagnostic) {
            error!("Failed to persist restoration {} transition: {}", id, e);
        }
    }
}
