//! Tessera Common - Shared types and utilities
//!
//! This crate provides the identifiers, schema model, hybrid-time clock,
//! error definitions, and configuration used across all Tessera
//! control-plane components.

pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use config::MasterConfig;
pub use error::{Error, Result};
pub use time::{Clock, HybridTime, ManualClock, RestoreTarget, SystemClock};
pub use types::*;
