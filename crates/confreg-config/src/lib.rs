//! Confreg Config - Versioned configuration registry
//!
//! This crate provides:
//! - Configuration, labeled configuration and group entities
//! - CRUD with `(name, version)` uniqueness
//! - Group membership edits and exact label filtering
//! - Idempotent creates keyed by client token and body hash

pub mod keys;
pub mod model;
pub mod service;

// Re-export commonly used types
pub use model::*;
pub use service::{ConfigRegistry, EntityRegistry, GroupService, IdempotencyLedger};
