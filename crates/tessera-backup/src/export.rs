//! Portable snapshot metadata.
//!
//! An export file carries everything a foreign cluster needs to rebuild
//! the captured tables: names, identities, schemas, and partitioning,
//! with indexes nested under their tables. The artifact is versioned
//! JSON; readers accept any version back to
//! [`MIN_METADATA_FORMAT_VERSION`], and fields added since then are
//! optional on the way in.

use crate::snapshot::SnapshotManager;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tessera_common::{
    Error, HybridTime, PartitionSchema, Result, Schema, SnapshotId, TableId, TableName,
};
use tracing::info;

/// Version written by this build
pub const METADATA_FORMAT_VERSION: u32 = 2;
/// Oldest version this build still reads (v1 lacks `created_at`)
pub const MIN_METADATA_FORMAT_VERSION: u32 = 1;

/// Index definition nested under its exported table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportedIndex {
    pub name: TableName,
    pub table_id: TableId,
    pub schema: Schema,
    pub partition: PartitionSchema,
}

/// One captured table with its indexes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportedTable {
    pub name: TableName,
    pub table_id: TableId,
    pub schema: Schema,
    pub partition: PartitionSchema,
    pub indexes: Vec<ExportedIndex>,
}

/// Self-contained snapshot metadata artifact
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportedMetadata {
    pub format_version: u32,
    pub snapshot_id: SnapshotId,
    /// Snapshot creation time; absent in v1 artifacts
    #[serde(default)]
    pub created_at: Option<HybridTime>,
    pub tables: Vec<ExportedTable>,
}

impl ExportedMetadata {
    fn check_version(&self) -> Result<()> {
        if self.format_version < MIN_METADATA_FORMAT_VERSION
            || self.format_version > METADATA_FORMAT_VERSION
        {
            return Err(Error::invalid_argument(format!(
                "unsupported snapshot metadata format version {} (supported: {} to {})",
                self.format_version, MIN_METADATA_FORMAT_VERSION, METADATA_FORMAT_VERSION
            )));
        }
        Ok(())
    }
}

impl SnapshotManager {
    /// Build the portable metadata for a completed snapshot.
    ///
    /// Table definitions are read from the live catalog, so renames made
    /// after the snapshot completed are reflected in the artifact.
    pub fn export_snapshot(&self, id: &SnapshotId) -> Result<ExportedMetadata> {
        let entry = self.get(id).map_err(|_| completed_not_found(id))?;
        if entry.state != tessera_catalog::SnapshotState::Complete {
            return Err(completed_not_found(id));
        }

        let mut tables = Vec::with_capacity(entry.table_refs.len());
        for table_ref in &entry.table_refs {
            let descriptor = self.catalog.lookup(&table_ref.table_id)?;
            let mut indexes = Vec::with_capacity(table_ref.index_ids.len());
            for index_id in &table_ref.index_ids {
                let index = self.catalog.lookup(index_id)?;
                indexes.push(ExportedIndex {
                    name: index.name,
                    table_id: index.id,
                    schema: index.schema,
                    partition: index.partition,
                });
            }
            tables.push(ExportedTable {
                name: descriptor.name,
                table_id: descriptor.id,
                schema: descriptor.schema,
                partition: descriptor.partition,
                indexes,
            });
        }

        Ok(ExportedMetadata {
            format_version: METADATA_FORMAT_VERSION,
            snapshot_id: *id,
            created_at: Some(entry.created_at),
            tables,
        })
    }

    /// Export a completed snapshot's metadata to a JSON file.
    pub fn export_snapshot_to_file(&self, id: &SnapshotId, destination: &Path) -> Result<()> {
        let metadata = self.export_snapshot(id)?;
        write_metadata(&metadata, destination)?;
        info!("Exported snapshot {} to {}", id, destination.display());
        Ok(())
    }
}

fn completed_not_found(id: &SnapshotId) -> Error {
    Error::not_found(format!("completed snapshot {id}"))
}

/// Serialize a metadata artifact to a file.
pub fn write_metadata(metadata: &ExportedMetadata, destination: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| Error::Serialization(e.to_string()))?;
    fs::write(destination, json).map_err(|e| {
        Error::Persistence(format!("cannot write {}: {e}", destination.display()))
    })
}

/// Read and validate a metadata artifact from a file.
pub fn read_metadata(source: &Path) -> Result<ExportedMetadata> {
    let bytes = fs::read(source)
        .map_err(|e| Error::Persistence(format!("cannot read {}: {e}", source.display())))?;
    let metadata: ExportedMetadata = serde_json::from_slice(&bytes).map_err(|e| {
        Error::invalid_argument(format!("malformed snapshot metadata {}: {e}", source.display()))
    })?;
    metadata.check_version()?;
    Ok(metadata)
}
