//! Confreg Common - Shared types and utilities
//!
//! This crate provides the foundational types used across all Confreg components:
//! - Error types and error codes
//! - Identifier, version and label-filter validation
//! - Common constants

pub mod error;
pub mod utils;

// Re-exports for convenience
pub use error::{ConfregError, ErrorCode, Result};
pub use utils::{is_valid, parse_label_filter, parse_version, validate_identifier};

/// Request header carrying the client-supplied idempotency token
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Default HTTP port
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default Consul agent address
pub const DEFAULT_CONSUL_ADDRESS: &str = "http://localhost:8500";
