//! Storage key layout
//!
//! Every family is list-able by prefix, and no family prefix is a prefix of
//! another (`configs/` vs `configGroups/` differ at the slash).

/// Labeled configurations
pub const LABELED_CONFIG_PREFIX: &str = "configs/";

/// Plain configurations
pub const PLAIN_CONFIG_PREFIX: &str = "plainConfigs/";

/// Configuration groups
pub const GROUP_PREFIX: &str = "configGroups/";

/// Idempotency ledger records
pub const IDEMPOTENCY_PREFIX: &str = "idempotency/";

pub fn entity_key(prefix: &str, name: &str, version: u32) -> String {
    format!("{}{}/{}", prefix, name, version)
}

pub fn idempotency_key(token: &str, content_hash: &str) -> String {
    format!("{}{}/{}", IDEMPOTENCY_PREFIX, token, content_hash)
}
