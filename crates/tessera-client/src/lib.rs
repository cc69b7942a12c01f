//! Tessera Client - polling helpers for asynchronous operations
//!
//! Control-plane mutations complete asynchronously; callers observe them
//! by polling list/status endpoints until the owning entry reaches a
//! terminal state. This crate provides the generic retry-with-deadline
//! loop and ready-made waiters for snapshots and restorations.

pub mod poll;
pub mod waiters;

// Re-exports
pub use poll::{PollOptions, wait_for};
pub use waiters::{
    completed_snapshot, wait_for_restoration_done, wait_for_snapshot_complete,
    wait_for_snapshots_complete,
};
