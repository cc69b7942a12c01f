//! Import of exported snapshot metadata into the live catalog.
//!
//! Naming follows a total precedence, evaluated per table: no names
//! supplied means reuse the original names (and the existing identity,
//! when a schema-compatible table already holds them); a keyspace alone
//! re-homes the original table name; keyspace plus table name are taken
//! literally. Any rename that would leave an index name ambiguous is an
//! error, never a guess.
//!
//! Import is all-or-nothing: every table in the artifact is planned and
//! validated before the first catalog mutation.

use crate::export::{ExportedIndex, ExportedMetadata, ExportedTable};
use crate::snapshot::SnapshotManager;
use tessera_catalog::CreateTableSpec;
use tessera_common::{Error, Result, Schema, TableDescriptor, TableId, TableName};
use tracing::info;

/// Target naming for an import request. Unset fields fall back to the
/// names recorded in the artifact.
#[derive(Clone, Debug, Default)]
pub struct ImportNames {
    pub keyspace: Option<String>,
    pub table: Option<String>,
    pub index: Option<String>,
}

impl ImportNames {
    /// Import under the artifact's original names
    #[must_use]
    pub fn original() -> Self {
        Self::default()
    }
}

/// Outcome of importing one table from an artifact
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportedTable {
    pub name: TableName,
    pub table_id: TableId,
    /// True when an existing schema-compatible table's identity was reused
    pub same_ids: bool,
    /// Imported indexes, in artifact order
    pub indexes: Vec<(TableName, TableId)>,
}

struct TablePlan<'a> {
    exported: &'a ExportedTable,
    table_name: TableName,
    /// Existing table whose identity is reused, when compatible
    reuse: Option<TableDescriptor>,
    indexes: Vec<IndexPlan<'a>>,
}

struct IndexPlan<'a> {
    exported: &'a ExportedIndex,
    name: TableName,
    /// Existing index whose identity is reused, when compatible
    reuse: Option<TableDescriptor>,
}

impl SnapshotManager {
    /// Import an exported artifact, creating or reusing tables per the
    /// naming precedence. Nothing is created if any table fails
    /// validation.
    pub fn import_snapshot(
        &self,
        metadata: &ExportedMetadata,
        names: &ImportNames,
    ) -> Result<Vec<ImportedTable>> {
        if metadata.tables.is_empty() {
            return Err(Error::invalid_argument(format!(
                "artifact for snapshot {} contains no tables",
                metadata.snapshot_id
            )));
        }
        if metadata.tables.len() > 1 && (names.table.is_some() || names.index.is_some()) {
            return Err(Error::invalid_argument(
                "table and index renames require a single-table artifact",
            ));
        }

        let plans: Vec<TablePlan<'_>> = metadata
            .tables
            .iter()
            .map(|table| self.plan_table(table, names))
            .collect::<Result<_>>()?;

        let mut imported = Vec::with_capacity(plans.len());
        for plan in plans {
            imported.push(self.apply_plan(plan)?);
        }
        info!(
            "Imported snapshot {} metadata: {} tables",
            metadata.snapshot_id,
            imported.len()
        );
        Ok(imported)
    }

    fn plan_table<'a>(
        &self,
        exported: &'a ExportedTable,
        names: &ImportNames,
    ) -> Result<TablePlan<'a>> {
        // Renaming a table with indexes is only unambiguous when the
        // index names are pinned down too, and vice versa.
        if names.table.is_some() && names.index.is_none() && !exported.indexes.is_empty() {
            return Err(Error::AlreadyExists(format!(
                "index rename required: table {} has index {}",
                exported.name, exported.indexes[0].name
            )));
        }
        if names.index.is_some() && exported.indexes.is_empty() {
            return Err(Error::invalid_argument(format!(
                "index rename supplied but table {} has no index",
                exported.name
            )));
        }
        if names.index.is_some() && exported.indexes.len() > 1 {
            return Err(Error::AlreadyExists(format!(
                "index rename is ambiguous: table {} has {} indexes",
                exported.name,
                exported.indexes.len()
            )));
        }

        let keyspace = names
            .keyspace
            .clone()
            .unwrap_or_else(|| exported.name.keyspace.clone());
        let table_name = TableName::new(
            keyspace.clone(),
            names
                .table
                .clone()
                .unwrap_or_else(|| exported.name.name.clone()),
        );
        let reuse = match self.catalog.lookup_by_name(&table_name) {
            Some(existing) => {
                if existing.is_index() {
                    return Err(Error::AlreadyExists(format!(
                        "table {table_name} already exists as an index"
                    )));
                }
                if !reusable(&existing, &exported.schema, &exported.partition) {
                    return Err(Error::AlreadyExists(format!(
                        "table {table_name} already exists with a different schema"
                    )));
                }
                Some(existing)
            }
            None => None,
        };

        let mut indexes = Vec::with_capacity(exported.indexes.len());
        for index in &exported.indexes {
            let name = TableName::new(
                keyspace.clone(),
                names
                    .index
                    .clone()
                    .unwrap_or_else(|| index.name.name.clone()),
            );
            let index_reuse = match self.catalog.lookup_by_name(&name) {
                Some(existing) => {
                    if !reusable(&existing, &index.schema, &index.partition) {
                        return Err(Error::AlreadyExists(format!(
                            "index {name} already exists with a different schema"
                        )));
                    }
                    let indexes_destination = match (&reuse, &existing.indexed_table) {
                        (Some(table), Some(indexed)) => *indexed == table.id,
                        _ => false,
                    };
                    if !indexes_destination {
                        return Err(Error::AlreadyExists(format!(
                            "index {name} already exists on a different table"
                        )));
                    }
                    Some(existing)
                }
                None => None,
            };
            indexes.push(IndexPlan {
                exported: index,
                name,
                reuse: index_reuse,
            });
        }

        Ok(TablePlan {
            exported,
            table_name,
            reuse,
            indexes,
        })
    }

    fn apply_plan(&self, plan: TablePlan<'_>) -> Result<ImportedTable> {
        let same_ids = plan.reuse.is_some();
        let table = match plan.reuse {
            Some(existing) => existing,
            None => self.catalog.create_table(CreateTableSpec {
                name: plan.table_name,
                schema: plan.exported.schema.clone(),
                partition: plan.exported.partition.clone(),
                indexed_table: None,
            })?,
        };

        let mut indexes = Vec::with_capacity(plan.indexes.len());
        for index_plan in plan.indexes {
            let index = match index_plan.reuse {
                Some(existing) => existing,
                None => self.catalog.create_table(CreateTableSpec {
                    name: index_plan.name,
                    schema: index_plan.exported.schema.clone(),
                    partition: index_plan.exported.partition.clone(),
                    indexed_table: Some(table.id.clone()),
                })?,
            };
            indexes.push((index.name, index.id));
        }

        Ok(ImportedTable {
            name: table.name,
            table_id: table.id,
            same_ids,
            indexes,
        })
    }
}

fn reusable(
    existing: &TableDescriptor,
    schema: &Schema,
    partition: &tessera_common::PartitionSchema,
) -> bool {
    existing.schema.compatible_with(schema, false) && existing.partition == *partition
}
