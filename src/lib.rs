//! Makler: client-aware AI triage copilot core for insurance agencies.
//!
//! The crate implements the workflow behind an agent-facing triage
//! workspace: an incoming client email (screenshot or pasted text) is
//! combined with the agency playbook and the client's interaction history,
//! submitted to a generation endpoint with a fixed response schema, and the
//! structured result (extracted identity, policy number, analysis, and
//! bilingual reply drafts) is folded back into history with exactly one
//! record per successful case.
//!
//! Component map:
//!
//! - [`history`]: one read/append interface over the local partition files
//!   and the shared REST-backed store; the authoritative backend is picked
//!   once from configuration.
//! - [`knowledge`]: assembles the multi-part request envelope (prompt,
//!   history digest, email input, optional handbook attachment).
//! - [`generation`]: the endpoint seam, with typed failures for credential,
//!   auth, empty, and malformed responses.
//! - [`case`]: the orchestrator owning the
//!   `Idle -> Pending -> {Succeeded | Failed}` state machine and its
//!   single-flight guarantee.
//! - [`settings`] / [`config`] / [`playbook`]: persisted configuration,
//!   resolved once and injected into the components above.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use makler::case::CaseOrchestrator;
//! use makler::config::Config;
//! use makler::generation::GeminiClient;
//! use makler::knowledge::CaseInput;
//! use makler::playbook::PlaybookStore;
//! use makler::{history, telemetry};
//!
//! # async fn run() -> anyhow::Result<()> {
//! telemetry::init();
//! let config = Config::load()?;
//!
//! let store = history::from_config(&config.remote_store, &config.storage)?;
//! let generation = Arc::new(GeminiClient::new(config.generation.clone())?);
//! let orchestrator = CaseOrchestrator::new(store, generation);
//!
//! let playbook = PlaybookStore::new(&config.storage).load()?;
//! let outcome = orchestrator
//!     .run_case(
//!         Some(CaseInput::Text("Hello, I moved last week...".to_string())),
//!         Some("Jane Doe"),
//!         &playbook,
//!     )
//!     .await?;
//! println!("{}", outcome.result.reply_english);
//! # Ok(())
//! # }
//! ```

pub mod case;
pub mod config;
pub mod error;
pub mod generation;
pub mod history;
pub mod knowledge;
pub mod playbook;
pub mod settings;
pub mod telemetry;

pub use case::{CaseOrchestrator, CaseOutcome, CaseState};
pub use config::{Config, GenerationConfig, RemoteStoreConfig, StorageConfig};
pub use error::{CaseError, ConfigError, GenerationError, StoreError};
pub use generation::{CaseResult, GeminiClient, GenerationClient};
pub use history::{
    ClientId, HistoryPartition, HistoryStore, InteractionRecord, LocalHistoryStore,
    RemoteHistoryStore,
};
pub use knowledge::{CaseInput, EnvelopePart, RequestEnvelope};
pub use playbook::{HandbookDocument, Playbook, PlaybookStore};
pub use settings::Settings;
