//! Redb table definitions for the durable sys store.

use redb::TableDefinition;

// Catalog identities
pub const CATALOG_TABLES: TableDefinition<&str, &[u8]> = TableDefinition::new("catalog_tables");

// Control-plane operation records
pub const SNAPSHOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");
pub const RESTORATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("restorations");
pub const UNIVERSES: TableDefinition<&str, &[u8]> = TableDefinition::new("universes");
