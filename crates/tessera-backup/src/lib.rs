//! Tessera Backup - snapshot, export/import, and restoration control
//!
//! This crate implements the leader-side "backup service" of the control
//! plane: point-in-time snapshots across storage shards, portable metadata
//! export/import with deterministic identity-conflict resolution, and
//! time-travel restoration. All state is written through the durable sys
//! store so a newly elected leader resumes in-flight operations.

pub mod export;
pub mod import;
pub mod restore;
pub mod snapshot;
pub mod tablet;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use export::{
    ExportedIndex, ExportedMetadata, ExportedTable, METADATA_FORMAT_VERSION,
    MIN_METADATA_FORMAT_VERSION, read_metadata, write_metadata,
};
pub use import::{ImportNames, ImportedTable};
pub use restore::RestorationController;
pub use snapshot::SnapshotManager;
pub use tablet::{RetryPolicy, TabletProxy};
