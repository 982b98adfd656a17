//! REST-backed shared history store.
//!
//! Talks to a Supabase-style keyed resource (`client_memory`) over its
//! REST surface. A failed query is logged and reads as an empty partition,
//! never as stale local data and never as an error the case workflow has
//! to handle; inserts are best-effort. Every append also lands in the
//! local mirror, which is not consulted on reads.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::StoreError;
use crate::history::{
    ClientId, HistoryPartition, HistoryStore, InteractionRecord, LocalHistoryStore,
};

const CLIENT_MEMORY_RESOURCE: &str = "rest/v1/client_memory";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Row shape of the `client_memory` resource.
#[derive(Debug, Deserialize)]
struct ClientMemoryRow {
    #[allow(dead_code)]
    #[serde(default)]
    client_id: String,
    summary: String,
    date: String,
    #[serde(default)]
    policy_number: Option<String>,
    #[allow(dead_code)]
    #[serde(default)]
    created_at: Option<String>,
}

impl From<ClientMemoryRow> for InteractionRecord {
    fn from(row: ClientMemoryRow) -> Self {
        Self {
            date: row.date,
            summary: row.summary,
            policy_number: row.policy_number,
        }
    }
}

#[derive(Debug, Serialize)]
struct NewClientMemoryRow<'a> {
    client_id: &'a str,
    summary: &'a str,
    date: &'a str,
    policy_number: Option<&'a str>,
}

/// Remote history store with a local write-through mirror.
pub struct RemoteHistoryStore {
    http: reqwest::Client,
    endpoint: Url,
    credential: SecretString,
    mirror: LocalHistoryStore,
}

impl RemoteHistoryStore {
    pub fn new(
        endpoint: Url,
        credential: SecretString,
        mirror: LocalHistoryStore,
    ) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| StoreError::Remote(err.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            credential,
            mirror,
        })
    }

    fn resource_url(&self) -> String {
        format!(
            "{}/{CLIENT_MEMORY_RESOURCE}",
            self.endpoint.as_str().trim_end_matches('/')
        )
    }

    async fn fetch_rows(&self, client: &ClientId) -> Result<Vec<ClientMemoryRow>, StoreError> {
        let url = format!(
            "{}?client_id=eq.{}&select=*&order=created_at.desc",
            self.resource_url(),
            urlencoding::encode(client.as_str())
        );

        let response = self
            .http
            .get(&url)
            .header("apikey", self.credential.expose_secret())
            .bearer_auth(self.credential.expose_secret())
            .send()
            .await
            .map_err(|err| StoreError::Remote(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Remote(format!(
                "history query failed with HTTP {status}"
            )));
        }

        response
            .json::<Vec<ClientMemoryRow>>()
            .await
            .map_err(|err| StoreError::Remote(format!("unreadable history payload: {err}")))
    }

    async fn insert_row(
        &self,
        client: &ClientId,
        record: &InteractionRecord,
    ) -> Result<(), StoreError> {
        let row = NewClientMemoryRow {
            client_id: client.as_str(),
            summary: &record.summary,
            date: &record.date,
            policy_number: record.policy_number.as_deref(),
        };

        let response = self
            .http
            .post(self.resource_url())
            .header("apikey", self.credential.expose_secret())
            .bearer_auth(self.credential.expose_secret())
            .json(&row)
            .send()
            .await
            .map_err(|err| StoreError::Remote(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Remote(format!(
                "history insert failed with HTTP {status}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for RemoteHistoryStore {
    /// Remote reads degrade to an empty partition on any failure. Stale
    /// local data is never substituted for the authoritative store.
    async fn read(&self, client: &ClientId) -> Result<HistoryPartition, StoreError> {
        match self.fetch_rows(client).await {
            Ok(rows) => Ok(rows.into_iter().map(InteractionRecord::from).collect()),
            Err(err) => {
                tracing::warn!(client = %client, error = %err, "remote history read failed; continuing with empty history");
                Ok(Vec::new())
            }
        }
    }

    /// The remote insert is best-effort; the local mirror is updated
    /// regardless of its outcome.
    async fn append(
        &self,
        client: &ClientId,
        record: &InteractionRecord,
    ) -> Result<(), StoreError> {
        if let Err(err) = self.insert_row(client, record).await {
            tracing::warn!(client = %client, error = %err, "remote history insert failed; record kept in local mirror only");
        }
        self.mirror.append(client, record).await
    }
}
