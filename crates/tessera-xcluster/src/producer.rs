//! Collaborator seam to the producer cluster.
//!
//! The replication controller talks to the remote cluster through these
//! traits; the wire transport behind them is not this crate's concern.

use async_trait::async_trait;
use std::sync::Arc;
use tessera_common::{Result, Schema, StreamId, TableId};

/// Client handle to a producer cluster's masters.
#[async_trait]
pub trait ProducerClient: Send + Sync {
    /// Schema of a producer table.
    ///
    /// Fails with `NotFound` ("`<id>` not found") for an unknown table.
    async fn get_table_schema(&self, table: &TableId) -> Result<Schema>;

    /// Resolve a change stream to the table it captures.
    ///
    /// Fails with `NotFound` naming the stream id when it does not exist.
    async fn get_stream(&self, stream: &StreamId) -> Result<TableId>;

    /// Create a change stream on a producer table.
    async fn create_stream(&self, table: &TableId) -> Result<StreamId>;

    /// Tear down a change stream.
    async fn delete_stream(&self, stream: &StreamId) -> Result<()>;
}

/// Factory for producer clients, keyed by master addresses.
#[async_trait]
pub trait ProducerConnector: Send + Sync {
    /// Connect to the producer cluster behind the given master endpoints.
    async fn connect(&self, master_addresses: &[String]) -> Result<Arc<dyn ProducerClient>>;
}
