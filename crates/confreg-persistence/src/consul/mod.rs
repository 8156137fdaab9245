// Consul KV storage backend
// Talks to a Consul agent over its HTTP API and maps ModifyIndex onto the
// store revision used for compare-and-swap

use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use confreg_common::DEFAULT_CONSUL_ADDRESS;

use crate::model::{KvEntry, StorageMode};
use crate::traits::KvStore;

// ============================================================================
// KV Models
// ============================================================================

/// Consul KV Pair as returned by `GET /v1/kv/{key}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KVPair {
    #[serde(rename = "Key")]
    pub key: String,

    #[serde(rename = "CreateIndex", default)]
    pub create_index: u64,

    #[serde(rename = "ModifyIndex", default)]
    pub modify_index: u64,

    #[serde(rename = "LockIndex", default)]
    pub lock_index: u64,

    #[serde(rename = "Flags", default)]
    pub flags: u64,

    #[serde(rename = "Value", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>, // Base64 encoded

    #[serde(rename = "Session", default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

impl KVPair {
    /// Get raw bytes of the value; a null value decodes to an empty payload
    pub fn raw_value(&self) -> anyhow::Result<Vec<u8>> {
        match &self.value {
            Some(v) => BASE64
                .decode(v)
                .with_context(|| format!("invalid base64 value for key '{}'", self.key)),
            None => Ok(Vec::new()),
        }
    }

    fn into_entry(self) -> anyhow::Result<KvEntry> {
        let value = self.raw_value()?;
        Ok(KvEntry {
            key: self.key,
            value,
            revision: self.modify_index,
        })
    }
}

// ============================================================================
// Client configuration
// ============================================================================

/// Consul connection settings
#[derive(Debug, Clone)]
pub struct ConsulConfig {
    /// Agent base URL, e.g. `http://localhost:8500`
    pub address: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_CONSUL_ADDRESS.to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

// ============================================================================
// Store
// ============================================================================

/// Consul-backed key-value store
#[derive(Clone)]
pub struct ConsulKvStore {
    client: reqwest::Client,
    base_url: String,
}

impl ConsulKvStore {
    pub fn new(config: ConsulConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build Consul HTTP client")?;

        let mut base_url = config.address.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            base_url = format!("http://{}", base_url);
        }

        Ok(Self { client, base_url })
    }

    fn kv_url(&self, key: &str) -> String {
        format!("{}/v1/kv/{}", self.base_url, key)
    }

    async fn read_bool(response: reqwest::Response, op: &str, key: &str) -> anyhow::Result<bool> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!("Consul {} '{}' failed with {}: {}", op, key, status, body);
        }
        parse_bool_body(&body).with_context(|| format!("Consul {} '{}' returned '{}'", op, key, body))
    }
}

fn parse_bool_body(body: &str) -> anyhow::Result<bool> {
    match body.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => bail!("unexpected boolean body '{}'", other),
    }
}

#[async_trait]
impl KvStore for ConsulKvStore {
    fn storage_mode(&self) -> StorageMode {
        StorageMode::Consul
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<KvEntry>> {
        let response = self
            .client
            .get(self.kv_url(key))
            .send()
            .await
            .with_context(|| format!("Consul get '{}' failed", key))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .with_context(|| format!("Consul get '{}' failed", key))?;

        let pairs: Vec<KVPair> = response
            .json()
            .await
            .with_context(|| format!("Consul get '{}' returned malformed body", key))?;

        pairs
            .into_iter()
            .find(|pair| pair.key == key)
            .map(KVPair::into_entry)
            .transpose()
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()> {
        let response = self
            .client
            .put(self.kv_url(key))
            .body(value)
            .send()
            .await
            .with_context(|| format!("Consul put '{}' failed", key))?;

        if !Self::read_bool(response, "put", key).await? {
            bail!("Consul refused put for '{}'", key);
        }
        debug!(key, "Consul put");
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        value: Vec<u8>,
        expected_revision: u64,
    ) -> anyhow::Result<bool> {
        let response = self
            .client
            .put(self.kv_url(key))
            .query(&[("cas", expected_revision)])
            .body(value)
            .send()
            .await
            .with_context(|| format!("Consul cas '{}' failed", key))?;

        let swapped = Self::read_bool(response, "cas", key).await?;
        debug!(key, expected_revision, swapped, "Consul compare-and-swap");
        Ok(swapped)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let response = self
            .client
            .delete(self.kv_url(key))
            .send()
            .await
            .with_context(|| format!("Consul delete '{}' failed", key))?;

        Self::read_bool(response, "delete", key).await?;
        Ok(())
    }

    async fn compare_and_delete(
        &self,
        key: &str,
        expected_revision: u64,
    ) -> anyhow::Result<bool> {
        let response = self
            .client
            .delete(self.kv_url(key))
            .query(&[("cas", expected_revision)])
            .send()
            .await
            .with_context(|| format!("Consul cas delete '{}' failed", key))?;

        Self::read_bool(response, "cas delete", key).await
    }

    async fn list_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<KvEntry>> {
        let response = self
            .client
            .get(self.kv_url(prefix))
            .query(&[("recurse", "true")])
            .send()
            .await
            .with_context(|| format!("Consul list '{}' failed", prefix))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = response
            .error_for_status()
            .with_context(|| format!("Consul list '{}' failed", prefix))?;

        let pairs: Vec<KVPair> = response
            .json()
            .await
            .with_context(|| format!("Consul list '{}' returned malformed body", prefix))?;

        pairs.into_iter().map(KVPair::into_entry).collect()
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        let response = self
            .client
            .get(format!("{}/v1/status/leader", self.base_url))
            .send()
            .await
            .context("Consul agent unreachable")?
            .error_for_status()
            .context("Consul status check failed")?;

        let leader: String = response
            .json()
            .await
            .context("Consul status returned malformed body")?;
        if leader.is_empty() {
            bail!("Consul cluster has no leader");
        }
        Ok(())
    }
}
