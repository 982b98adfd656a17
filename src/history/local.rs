//! File-backed local history partitions.
//!
//! One JSON file per normalized client identifier under
//! `<data_dir>/history/`. Reads and writes are synchronous filesystem
//! operations; an append is visible to the next read.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::StorageConfig;
use crate::error::StoreError;
use crate::history::{ClientId, HistoryPartition, HistoryStore, InteractionRecord};

/// Most recent records kept per local partition.
pub(crate) const PARTITION_CAP: usize = 10;

/// Local history store rooted at the workspace data directory.
#[derive(Debug, Clone)]
pub struct LocalHistoryStore {
    dir: PathBuf,
}

impl LocalHistoryStore {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            dir: storage.data_dir.join("history"),
        }
    }

    fn partition_path(&self, client: &ClientId) -> PathBuf {
        self.dir.join(format!("{}.json", partition_key(client.as_str())))
    }

    fn read_partition(&self, client: &ClientId) -> Result<HistoryPartition, StoreError> {
        let path = self.partition_path(client);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(StoreError::Local(format!(
                    "failed to read partition {}: {err}",
                    path.display()
                )));
            }
        };
        serde_json::from_slice(&raw).map_err(|err| {
            StoreError::Local(format!(
                "corrupt partition {}: {err}",
                path.display()
            ))
        })
    }

    fn write_partition(
        &self,
        client: &ClientId,
        partition: &HistoryPartition,
    ) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|err| {
            StoreError::Local(format!(
                "failed to create history dir {}: {err}",
                self.dir.display()
            ))
        })?;

        let path = self.partition_path(client);
        let raw = serde_json::to_vec_pretty(partition)
            .map_err(|err| StoreError::Local(format!("failed to serialize partition: {err}")))?;

        // Write-then-rename so a crash mid-write never leaves a truncated
        // partition behind.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, raw).map_err(|err| {
            StoreError::Local(format!("failed to write {}: {err}", tmp.display()))
        })?;
        std::fs::rename(&tmp, &path).map_err(|err| {
            StoreError::Local(format!("failed to replace {}: {err}", path.display()))
        })
    }
}

#[async_trait]
impl HistoryStore for LocalHistoryStore {
    async fn read(&self, client: &ClientId) -> Result<HistoryPartition, StoreError> {
        self.read_partition(client)
    }

    async fn append(
        &self,
        client: &ClientId,
        record: &InteractionRecord,
    ) -> Result<(), StoreError> {
        let mut partition = self.read_partition(client)?;
        partition.insert(0, record.clone());
        partition.truncate(PARTITION_CAP);
        self.write_partition(client, &partition)
    }
}

/// Keep partition filenames filesystem-safe and deterministic.
pub(crate) fn partition_key(id: &str) -> String {
    let key = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .trim_matches('-')
        .to_string();
    if key.is_empty() { "client".to_string() } else { key }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn store_in(dir: &std::path::Path) -> LocalHistoryStore {
        LocalHistoryStore::new(&StorageConfig {
            data_dir: dir.to_path_buf(),
        })
    }

    fn record(summary: &str) -> InteractionRecord {
        InteractionRecord {
            date: "2026-08-08 10:00".to_string(),
            summary: summary.to_string(),
            policy_number: None,
        }
    }

    #[tokio::test]
    async fn read_of_fresh_identifier_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let client = ClientId::new("Jane Doe").expect("id");

        assert_eq!(store.read(&client).await.expect("read"), Vec::new());
    }

    #[tokio::test]
    async fn append_is_visible_to_the_next_read_newest_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let client = ClientId::new("Jane Doe").expect("id");

        store.append(&client, &record("first")).await.expect("append");
        store.append(&client, &record("second")).await.expect("append");

        let partition = store.read(&client).await.expect("read");
        assert_eq!(partition.len(), 2);
        assert_eq!(partition[0].summary, "second");
        assert_eq!(partition[1].summary, "first");
    }

    #[tokio::test]
    async fn case_variants_share_one_partition() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        let written = ClientId::new("Jane Doe ").expect("id");
        store.append(&written, &record("moved house")).await.expect("append");

        let queried = ClientId::new("  JANE DOE").expect("id");
        let partition = store.read(&queried).await.expect("read");
        assert_eq!(partition.len(), 1);
        assert_eq!(partition[0].summary, "moved house");
    }

    #[tokio::test]
    async fn partition_is_capped_to_the_most_recent_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let client = ClientId::new("busy client").expect("id");

        for i in 0..(PARTITION_CAP + 3) {
            store
                .append(&client, &record(&format!("case {i}")))
                .await
                .expect("append");
        }

        let partition = store.read(&client).await.expect("read");
        assert_eq!(partition.len(), PARTITION_CAP);
        assert_eq!(partition[0].summary, format!("case {}", PARTITION_CAP + 2));
    }

    #[tokio::test]
    async fn corrupt_partition_surfaces_a_local_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let client = ClientId::new("broken").expect("id");

        std::fs::create_dir_all(dir.path().join("history")).expect("mkdir");
        std::fs::write(dir.path().join("history/broken.json"), "not json").expect("write");

        let err = store.read(&client).await.expect_err("must fail");
        assert!(matches!(err, StoreError::Local(_)));
    }

    #[test]
    fn partition_key_is_filesystem_safe() {
        assert_eq!(partition_key("jane doe"), "jane-doe");
        assert_eq!(partition_key("acme & söhne gmbh"), "acme---s-hne-gmbh");
        assert_eq!(partition_key("!!!"), "client");
    }
}
