//! Tessera xCluster - cross-cluster replication control
//!
//! This crate manages replication universes: consumer-side subscriptions
//! to a producer cluster's change streams for a set of tables. Setup
//! validates stream identity and schema compatibility before anything is
//! registered; alterations are serialized per universe; teardown is safe
//! even for universes a failed setup left half-configured.

pub mod controller;
pub mod producer;

// Re-exports
pub use controller::{AlterOperation, ReplicationController};
pub use producer::{ProducerClient, ProducerConnector};
