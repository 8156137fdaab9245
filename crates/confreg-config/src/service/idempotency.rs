//! Idempotency ledger
//!
//! A create carrying a client token is recorded under
//! `idempotency/{token}/{contentHash}`. Presenting the same token with the
//! same body again is rejected as a duplicate; the same token with a
//! different body is an unrelated request.
//!
//! The entity is written first and the ledger record second. If the ledger
//! write fails, the error is surfaced and a retry with the same token
//! reaches the entity write and fails with `AlreadyExists` instead of being
//! recognized as a duplicate. There is no multi-key transaction to close
//! that window.

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use confreg_common::{ConfregError, Result, validate_identifier};
use confreg_persistence::KvStore;

use crate::keys::idempotency_key;

/// Ledger value field holding the body hash
const BODY_HASH_FIELD: &str = "body-hash";

/// Hex-encoded SHA-256 of the canonical JSON form of `body`.
///
/// Object keys are sorted recursively before hashing, so two bodies that
/// differ only in field order hash identically.
pub fn compute_content_hash<T: Serialize + ?Sized>(body: &T) -> Result<String> {
    let value = serde_json::to_value(body).context("failed to serialize request body")?;
    Ok(hash_value(value))
}

fn hash_value(value: Value) -> String {
    let canonical = canonicalize(value).to_string();
    const_hex::encode(Sha256::digest(canonical.as_bytes()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Records which `(token, contentHash)` pairs have already been accepted
#[derive(Clone)]
pub struct IdempotencyLedger {
    store: Arc<dyn KvStore>,
}

impl IdempotencyLedger {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Whether this exact pair was recorded. Absence is `Ok(false)`; only
    /// storage faults are errors.
    pub async fn check_if_exists(&self, token: &str, content_hash: &str) -> Result<bool> {
        validate_identifier("idempotency key", token)?;
        Ok(self
            .store
            .get(&idempotency_key(token, content_hash))
            .await?
            .is_some())
    }

    /// Persist the pair. Recording an existing pair again is harmless.
    pub async fn record(&self, token: &str, content_hash: &str) -> Result<()> {
        validate_identifier("idempotency key", token)?;
        let value = serde_json::to_vec(&json!({ BODY_HASH_FIELD: content_hash }))
            .context("failed to encode ledger record")?;

        let created = self
            .store
            .put_if_absent(&idempotency_key(token, content_hash), value)
            .await?;
        debug!(token, content_hash, created, "Recorded idempotency key");
        Ok(())
    }

    /// Run `create` at most once per `(token, hash(body))`.
    ///
    /// Without a token the create runs unguarded.
    pub async fn create_once<B, F, Fut, T>(
        &self,
        token: Option<&str>,
        body: &B,
        create: F,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(token) = token else {
            return create().await;
        };
        validate_identifier("idempotency key", token)?;

        let content_hash = compute_content_hash(body)?;
        if self.check_if_exists(token, &content_hash).await? {
            return Err(ConfregError::conflict(format!(
                "request with idempotency key '{}' was already processed",
                token
            )));
        }

        let created = create().await?;

        if let Err(e) = self.record(token, &content_hash).await {
            warn!(
                token,
                content_hash = %content_hash,
                error = %e,
                "Entity stored but idempotency record failed; a retry will see AlreadyExists"
            );
            return Err(e);
        }
        Ok(created)
    }
}
