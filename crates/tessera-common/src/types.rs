//! Core type definitions for the Tessera control plane
//!
//! This module defines identifiers, table naming, and the schema model
//! shared by the catalog, backup, and replication components.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a snapshot, assigned at creation, immutable
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(Uuid);

impl SnapshotId {
    /// Generate a new random snapshot ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotId({})", self.0)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a restoration attempt, distinct from snapshot ids
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestorationId(Uuid);

impl RestorationId {
    /// Generate a new random restoration ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RestorationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RestorationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RestorationId({})", self.0)
    }
}

impl fmt::Display for RestorationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a table or index
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct TableId(String);

impl TableId {
    /// Create from an existing identifier string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random table ID
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Get the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableId({:?})", self.0)
    }
}

/// Unique identifier for a tablet (one shard of a table)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct TabletId(String);

impl TabletId {
    /// Create from an existing identifier string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random tablet ID
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Get the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TabletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TabletId({:?})", self.0)
    }
}

/// Identifier of a change-capture stream on a producer cluster.
///
/// Also called a "bootstrap id" when handed to replication setup.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct StreamId(String);

impl StreamId {
    /// Create from an existing identifier string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random stream ID
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Get the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({:?})", self.0)
    }
}

/// Name of a cross-cluster replication relationship
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct UniverseId(String);

impl UniverseId {
    /// Create from an existing identifier string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UniverseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UniverseId({:?})", self.0)
    }
}

/// Fully qualified table name: keyspace plus table
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    pub keyspace: String,
    pub name: String,
}

impl TableName {
    /// Create a new fully qualified table name
    pub fn new(keyspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Debug for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableName({}.{})", self.keyspace, self.name)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.keyspace, self.name)
    }
}

/// Column value type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Int32,
    Int64,
    Float64,
    Bool,
    String,
    Binary,
    Timestamp,
}

/// Schema for a single column
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    /// Whether this column is part of the primary key
    pub is_key: bool,
}

impl ColumnSchema {
    /// Create a non-nullable key column
    pub fn key(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            is_key: true,
        }
    }

    /// Create a nullable value column
    pub fn value(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            is_key: false,
        }
    }
}

/// Table schema: ordered columns plus table-level properties
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnSchema>,
    /// Whether the table participates in distributed transactions
    pub transactional: bool,
}

impl Schema {
    /// Create a new schema
    #[must_use]
    pub fn new(columns: Vec<ColumnSchema>, transactional: bool) -> Self {
        Self {
            columns,
            transactional,
        }
    }

    /// Names of the primary key columns, in declaration order
    #[must_use]
    pub fn key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Structural, field-for-field schema comparison.
    ///
    /// The transactional flag is part of the comparison unless the caller
    /// explicitly tolerates divergence on it.
    #[must_use]
    pub fn compatible_with(&self, other: &Self, tolerate_transactional_divergence: bool) -> bool {
        if self.columns != other.columns {
            return false;
        }
        tolerate_transactional_divergence || self.transactional == other.transactional
    }
}

/// Hash-partitioning scheme mapping rows to tablets
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSchema {
    /// Columns the row key is hashed on
    pub hash_columns: Vec<String>,
    /// Number of tablets the table is split into
    pub num_tablets: u32,
}

impl PartitionSchema {
    /// Hash-partition on the given columns across `num_tablets` tablets
    pub fn hash(hash_columns: Vec<String>, num_tablets: u32) -> Self {
        Self {
            hash_columns,
            num_tablets,
        }
    }
}

/// Full catalog entry for a table or index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub id: TableId,
    pub name: TableName,
    pub schema: Schema,
    pub partition: PartitionSchema,
    /// Tablets owning this table's shards, assigned at creation
    pub tablet_ids: Vec<TabletId>,
    /// Ids of indexes attached to this table
    pub indexes: Vec<TableId>,
    /// For an index: the table it indexes (back-reference)
    pub indexed_table: Option<TableId>,
}

impl TableDescriptor {
    /// Whether this descriptor is an index rather than a plain table
    #[must_use]
    pub fn is_index(&self) -> bool {
        self.indexed_table.is_some()
    }
}
