//! Tessera Metadata Catalog - identity store and durable sys store
//!
//! The catalog is the authoritative store of keyspace/table/index
//! identities and schemas, owned by the elected cluster leader. The sys
//! store persists catalog entries and every control-plane operation record
//! (snapshots, restorations, replication universes) so a newly elected
//! leader resumes from durable state.

pub mod catalog;
pub mod store;
pub mod tables;
pub mod types;

// Re-exports
pub use catalog::{Catalog, CreateTableSpec};
pub use store::{SysStore, SysStoreError, SysStoreResult};
pub use types::{
    ReplicationUniverse, RestorationEntry, RestorationState, SnapshotEntry, SnapshotState,
    TableRef, UniverseState,
};
