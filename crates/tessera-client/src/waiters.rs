//! Ready-made waiters over the backup service's status listings.

use crate::poll::{PollOptions, wait_for};
use tessera_backup::{RestorationController, SnapshotManager};
use tessera_catalog::{RestorationState, SnapshotEntry, SnapshotState};
use tessera_common::{Error, RestorationId, Result, SnapshotId};

/// The single completed snapshot a caller expects to exist.
///
/// More or fewer entries than one means the cluster is not in the state
/// the caller assumed and is reported as `Corruption`.
pub fn completed_snapshot(manager: &SnapshotManager) -> Result<SnapshotEntry> {
    let mut entries = manager.list_snapshots();
    if entries.len() != 1 {
        return Err(Error::Corruption(format!(
            "Wrong snapshot count {}",
            entries.len()
        )));
    }
    let entry = entries.remove(0);
    if entry.state != SnapshotState::Complete {
        return Err(Error::illegal_state(format!(
            "snapshot {} is in state {:?}",
            entry.id, entry.state
        )));
    }
    Ok(entry)
}

/// Wait until the snapshot reaches COMPLETE.
///
/// A FAILED snapshot aborts the wait with its diagnostic.
pub async fn wait_for_snapshot_complete(
    manager: &SnapshotManager,
    id: &SnapshotId,
    options: &PollOptions,
) -> Result<()> {
    wait_for(options, &format!("snapshot {id} to complete"), || async move {
        let entry = manager.get(id)?;
        match entry.state {
            SnapshotState::Complete => Ok(true),
            SnapshotState::Failed => Err(Error::illegal_state(format!(
                "snapshot {id} failed: {}",
                entry.diagnostic.unwrap_or_default()
            ))),
            _ => Ok(false),
        }
    })
    .await
}

/// Wait until no snapshot is mid-creation or mid-deletion.
///
/// Any FAILED snapshot aborts the wait.
pub async fn wait_for_snapshots_complete(
    manager: &SnapshotManager,
    options: &PollOptions,
) -> Result<()> {
    wait_for(options, "all snapshots to settle", || async move {
        for entry in manager.list_snapshots() {
            match entry.state {
                SnapshotState::Creating | SnapshotState::Deleting => return Ok(false),
                SnapshotState::Failed => {
                    return Err(Error::illegal_state(format!(
                        "snapshot {} failed: {}",
                        entry.id,
                        entry.diagnostic.unwrap_or_default()
                    )));
                }
                SnapshotState::Complete | SnapshotState::Deleted => {}
            }
        }
        Ok(true)
    })
    .await
}

/// Wait until the restoration reaches RESTORED.
///
/// A FAILED restoration aborts the wait with its diagnostic.
pub async fn wait_for_restoration_done(
    controller: &RestorationController,
    id: &RestorationId,
    options: &PollOptions,
) -> Result<()> {
    wait_for(options, &format!("restoration {id} to finish"), || async move {
        let entry = controller.get(id)?;
        match entry.state {
            RestorationState::Restored => Ok(true),
            RestorationState::Failed => Err(Error::illegal_state(format!(
                "restoration {id} failed: {}",
                entry.diagnostic.unwrap_or_default()
            ))),
            RestorationState::Created | RestorationState::Restoring => Ok(false),
        }
    })
    .await
}
