//! Leader-owned identity store for keyspaces, tables, and indexes.
//!
//! All mutation happens on the elected leader under the catalog's own
//! serialization; every write goes through the sys store before the
//! in-memory maps change. Readers get cloned descriptors, a consistent
//! snapshot per operation.

use crate::store::SysStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tessera_common::{
    Error, PartitionSchema, Result, Schema, TableDescriptor, TableId, TableName, TabletId,
};
use tracing::{debug, info};

/// Request to create one table or index
#[derive(Clone, Debug)]
pub struct CreateTableSpec {
    pub name: TableName,
    pub schema: Schema,
    pub partition: PartitionSchema,
    /// When set, the new entry is an index on the given table
    pub indexed_table: Option<TableId>,
}

struct Inner {
    tables: HashMap<TableId, TableDescriptor>,
    by_name: HashMap<TableName, TableId>,
}

/// The metadata catalog: authoritative table/keyspace/index identities
pub struct Catalog {
    store: Arc<SysStore>,
    inner: RwLock<Inner>,
}

impl Catalog {
    /// Hydrate the catalog from the sys store.
    pub fn open(store: Arc<SysStore>) -> Result<Self> {
        let mut tables = HashMap::new();
        let mut by_name = HashMap::new();
        for table in store.load_tables()? {
            by_name.insert(table.name.clone(), table.id.clone());
            tables.insert(table.id.clone(), table);
        }
        info!("Catalog loaded with {} tables", tables.len());
        Ok(Self {
            store,
            inner: RwLock::new(Inner { tables, by_name }),
        })
    }

    /// Create a table or index, allocating its identity and tablets.
    pub fn create_table(&self, spec: CreateTableSpec) -> Result<TableDescriptor> {
        if spec.partition.num_tablets == 0 {
            return Err(Error::invalid_argument(format!(
                "table {} must have at least one tablet",
                spec.name
            )));
        }

        let mut inner = self.inner.write();
        if inner.by_name.contains_key(&spec.name) {
            return Err(Error::AlreadyExists(format!(
                "table {} already exists",
                spec.name
            )));
        }

        // An index must reference an existing plain table.
        let mut parent = match &spec.indexed_table {
            Some(parent_id) => {
                let parent = inner
                    .tables
                    .get(parent_id)
                    .ok_or_else(|| Error::not_found(format!("indexed table {parent_id}")))?;
                if parent.is_index() {
                    return Err(Error::invalid_argument(format!(
                        "table {} cannot index the index {}",
                        spec.name, parent.name
                    )));
                }
                Some(parent.clone())
            }
            None => None,
        };

        let descriptor = TableDescriptor {
            id: TableId::generate(),
            name: spec.name,
            schema: spec.schema,
            partition: spec.partition.clone(),
            tablet_ids: (0..spec.partition.num_tablets)
                .map(|_| TabletId::generate())
                .collect(),
            indexes: Vec::new(),
            indexed_table: spec.indexed_table,
        };

        self.store.put_table(&descriptor)?;
        if let Some(parent) = parent.as_mut() {
            parent.indexes.push(descriptor.id.clone());
            self.store.put_table(parent)?;
            inner.tables.insert(parent.id.clone(), parent.clone());
        }

        debug!("Created table {} ({})", descriptor.name, descriptor.id);
        inner
            .by_name
            .insert(descriptor.name.clone(), descriptor.id.clone());
        inner
            .tables
            .insert(descriptor.id.clone(), descriptor.clone());
        Ok(descriptor)
    }

    /// Look up a table by identity.
    pub fn lookup(&self, id: &TableId) -> Result<TableDescriptor> {
        self.inner
            .read()
            .tables
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("table {id}")))
    }

    /// Look up a table by fully qualified name.
    pub fn lookup_by_name(&self, name: &TableName) -> Option<TableDescriptor> {
        let inner = self.inner.read();
        let id = inner.by_name.get(name)?;
        inner.tables.get(id).cloned()
    }

    /// Delete a table (dropping its indexes) or a single index.
    pub fn delete_table(&self, id: &TableId) -> Result<()> {
        let mut inner = self.inner.write();
        let descriptor = inner
            .tables
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("table {id}")))?;

        // Dropping an index detaches it from its table.
        if let Some(parent_id) = &descriptor.indexed_table
            && let Some(parent) = inner.tables.get(parent_id)
        {
            let mut parent = parent.clone();
            parent.indexes.retain(|i| i != id);
            self.store.put_table(&parent)?;
            inner.tables.insert(parent.id.clone(), parent);
        }

        for index_id in &descriptor.indexes {
            self.store.delete_table(index_id)?;
            if let Some(index) = inner.tables.remove(index_id) {
                inner.by_name.remove(&index.name);
            }
        }

        self.store.delete_table(id)?;
        inner.by_name.remove(&descriptor.name);
        inner.tables.remove(id);
        debug!("Deleted table {} ({})", descriptor.name, id);
        Ok(())
    }

    /// Rename a table, keeping its identity.
    pub fn rename_table(&self, id: &TableId, new_name: TableName) -> Result<TableDescriptor> {
        let mut inner = self.inner.write();
        let mut descriptor = inner
            .tables
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("table {id}")))?;
        if descriptor.name == new_name {
            return Ok(descriptor);
        }
        if inner.by_name.contains_key(&new_name) {
            return Err(Error::AlreadyExists(format!(
                "table {new_name} already exists"
            )));
        }

        let old_name = std::mem::replace(&mut descriptor.name, new_name);
        self.store.put_table(&descriptor)?;
        inner.by_name.remove(&old_name);
        inner
            .by_name
            .insert(descriptor.name.clone(), descriptor.id.clone());
        inner.tables.insert(id.clone(), descriptor.clone());
        debug!("Renamed table {} -> {}", old_name, descriptor.name);
        Ok(descriptor)
    }

    /// All tables and indexes, ordered by name.
    pub fn list_tables(&self) -> Vec<TableDescriptor> {
        let inner = self.inner.read();
        let mut tables: Vec<_> = inner.tables.values().cloned().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        tables
    }
}
