//! Storage model types shared by all backends

use serde::{Deserialize, Serialize};

/// Revision value that only matches an absent key in compare-and-swap
pub const ABSENT_REVISION: u64 = 0;

/// A stored value together with its modification revision.
///
/// The revision changes on every write to the key and is the token used for
/// optimistic compare-and-swap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KvEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub revision: u64,
}

/// Storage backend selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageMode {
    /// Process-local map, lost on restart
    #[default]
    Memory,
    /// Consul KV over its HTTP API
    Consul,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageMode::Memory => write!(f, "memory"),
            StorageMode::Consul => write!(f, "consul"),
        }
    }
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(StorageMode::Memory),
            "consul" => Ok(StorageMode::Consul),
            _ => Err(format!("Invalid storage mode: {}", s)),
        }
    }
}
