//! Stored types for control-plane persistence.
//!
//! These records are serialized to redb via bincode. Each one is a
//! resumable state machine keyed by its operation id: non-terminal states
//! are re-driven after a leader restart, terminal states are never
//! revisited.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tessera_common::{HybridTime, RestorationId, SnapshotId, StreamId, TableId, TabletId, UniverseId};

/// Capture of one table inside a snapshot: the table identity, the
/// identities of its indexes, and the tablets owning its shards at
/// creation time. Immutable once the snapshot completes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub table_id: TableId,
    pub index_ids: Vec<TableId>,
    pub tablet_ids: Vec<TabletId>,
}

impl TableRef {
    /// All table identities covered by this ref (the table and its indexes)
    #[must_use]
    pub fn all_table_ids(&self) -> Vec<TableId> {
        let mut ids = Vec::with_capacity(1 + self.index_ids.len());
        ids.push(self.table_id.clone());
        ids.extend(self.index_ids.iter().cloned());
        ids
    }
}

/// Snapshot lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotState {
    Creating,
    Complete,
    Deleting,
    Deleted,
    Failed,
}

impl SnapshotState {
    /// Whether any further transition is allowed out of this state
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Deleted | Self::Failed)
    }

    /// State transitions are monotonic; everything else is rejected.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Creating, Self::Complete | Self::Failed)
                | (Self::Complete, Self::Deleting)
                | (Self::Deleting, Self::Deleted | Self::Failed)
        )
    }
}

/// Durable record of one point-in-time snapshot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub id: SnapshotId,
    pub state: SnapshotState,
    /// Tables captured at creation time, in request order
    pub table_refs: Vec<TableRef>,
    pub created_at: HybridTime,
    /// Human-readable reason once the entry is `Failed`
    pub diagnostic: Option<String>,
}

impl SnapshotEntry {
    /// Ids of every table and index captured by this snapshot
    #[must_use]
    pub fn captured_table_ids(&self) -> Vec<TableId> {
        self.table_refs
            .iter()
            .flat_map(TableRef::all_table_ids)
            .collect()
    }

    /// Whether this snapshot's table set intersects the given one
    #[must_use]
    pub fn overlaps(&self, table_ids: &[TableId]) -> bool {
        self.table_refs
            .iter()
            .any(|r| table_ids.contains(&r.table_id))
    }
}

/// Restoration lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestorationState {
    Created,
    Restoring,
    Restored,
    Failed,
}

impl RestorationState {
    /// Whether the restoration has finished, one way or the other
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Restored | Self::Failed)
    }

    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Restoring | Self::Failed)
                | (Self::Restoring, Self::Restored | Self::Failed)
        )
    }
}

/// Durable record of one restoration attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestorationEntry {
    pub id: RestorationId,
    /// The snapshot being restored from
    pub snapshot_id: SnapshotId,
    pub state: RestorationState,
    /// When the leader processed the restore request
    pub requested_at: HybridTime,
    /// Cut-off: mutations committed strictly after this time are reverted
    pub restore_at: HybridTime,
    /// Table set captured from the snapshot when the restore was requested
    pub table_refs: Vec<TableRef>,
    /// Human-readable reason once the entry is `Failed`
    pub diagnostic: Option<String>,
}

impl RestorationEntry {
    /// Ids of every table and index the restoration covers
    #[must_use]
    pub fn captured_table_ids(&self) -> Vec<TableId> {
        self.table_refs
            .iter()
            .flat_map(TableRef::all_table_ids)
            .collect()
    }

    /// Whether this restoration's table set intersects the given one
    #[must_use]
    pub fn overlaps(&self, table_ids: &[TableId]) -> bool {
        self.table_refs
            .iter()
            .any(|r| table_ids.contains(&r.table_id))
    }
}

/// Replication universe lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UniverseState {
    /// Stub written before validation; a failed setup leaves this behind
    Initializing,
    Active,
    Failed,
}

/// Durable record of one cross-cluster replication relationship
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationUniverse {
    pub universe_id: UniverseId,
    pub state: UniverseState,
    /// Producer master endpoints, mutable via alter operations
    pub producer_master_addresses: Vec<String>,
    /// Producer table identity -> change-stream identity, one per table
    pub table_stream_map: BTreeMap<TableId, StreamId>,
}
