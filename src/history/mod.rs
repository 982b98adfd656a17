//! Client interaction history.
//!
//! One read/append interface over two backends:
//!
//! - `local`: JSON partition files under the workspace data directory
//! - `remote`: a REST-backed keyed store shared by the whole agency
//!
//! The backend is selected ONCE at construction from
//! [`RemoteStoreConfig`]; callers never branch on configuration again.
//! Partitions are keyed by [`ClientId`], a normalized identifier, so
//! lookups are insensitive to case and surrounding whitespace.

mod local;
mod remote;

pub use local::LocalHistoryStore;
pub use remote::RemoteHistoryStore;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{RemoteStoreConfig, StorageConfig};
use crate::error::StoreError;

/// Normalized client identifier used as the history partition key.
///
/// Two raw identifiers differing only by case or surrounding whitespace
/// resolve to the same partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Normalize a raw identifier. Returns `None` when nothing is left
    /// after trimming.
    pub fn new(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One resolved case. Created exactly once per successful generation and
/// immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Display timestamp of when the case was resolved.
    pub date: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_number: Option<String>,
}

/// Ordered interaction records for one client, newest first.
pub type HistoryPartition = Vec<InteractionRecord>;

/// Backend-agnostic history access, keyed by normalized client identifier.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Read the partition for `client`, newest first. A client with no
    /// prior interactions yields an empty partition.
    async fn read(&self, client: &ClientId) -> Result<HistoryPartition, StoreError>;

    /// Append one record to the partition for `client`.
    async fn append(&self, client: &ClientId, record: &InteractionRecord)
    -> Result<(), StoreError>;
}

/// Build the authoritative history store from configuration.
///
/// Remote wins when enabled and fully configured; the local store backs
/// everything else. This is the only place backend selection happens.
pub fn from_config(
    remote: &RemoteStoreConfig,
    storage: &StorageConfig,
) -> Result<Arc<dyn HistoryStore>, StoreError> {
    let local = LocalHistoryStore::new(storage);
    if remote.is_authoritative()
        && let (Some(endpoint), Some(credential)) = (&remote.endpoint, &remote.credential)
    {
        let store = RemoteHistoryStore::new(endpoint.clone(), credential.clone(), local)?;
        Ok(Arc::new(store))
    } else {
        Ok(Arc::new(local))
    }
}
