//! Case orchestration: the `Idle -> Pending -> {Succeeded | Failed}`
//! workflow.
//!
//! One workspace runs at most one case at a time. The single-flight guard
//! is structural: the state is checked and set under a lock before the
//! generation call is dispatched, so the invariant holds for programmatic
//! callers, not just for a disabled button. History I/O can never decide a
//! case: reads degrade to empty history, and the post-success append is
//! best-effort.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use tracing::warn;

use crate::error::CaseError;
use crate::generation::{CaseResult, GenerationClient};
use crate::history::{ClientId, HistoryStore, InteractionRecord};
use crate::knowledge::{self, CaseInput};
use crate::playbook::Playbook;

/// The outcome of a successful case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
    pub result: CaseResult,
    /// The effective client identifier: the one supplied by the agent, or
    /// the name the model extracted when none was supplied. `None` only
    /// when neither yielded a usable identifier.
    pub client_id: Option<ClientId>,
}

/// Workspace case state. Exactly one exists per workspace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaseState {
    #[default]
    Idle,
    Pending,
    Succeeded(CaseOutcome),
    Failed(CaseError),
}

/// Drives one triage case end to end: resolve history, assemble the
/// envelope, invoke generation, persist the new interaction record.
pub struct CaseOrchestrator {
    history: Arc<dyn HistoryStore>,
    generation: Arc<dyn GenerationClient>,
    state: Mutex<CaseState>,
}

impl CaseOrchestrator {
    pub fn new(history: Arc<dyn HistoryStore>, generation: Arc<dyn GenerationClient>) -> Self {
        Self {
            history,
            generation,
            state: Mutex::new(CaseState::Idle),
        }
    }

    /// Snapshot of the current case state.
    pub fn state(&self) -> CaseState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Discard all in-progress state and return to `Idle`. Permitted from
    /// any state.
    pub fn reset_workspace(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = CaseState::Idle;
    }

    /// Run one case.
    ///
    /// Input is validated before the `Pending` transition, so an invalid
    /// case never locks the workspace. While a case is pending, further
    /// calls fail with [`CaseError::CaseInFlight`] without reaching the
    /// generation endpoint. Re-running an identical case after completion
    /// appends an independent new record; there is no deduplication.
    pub async fn run_case(
        &self,
        input: Option<CaseInput>,
        client_id: Option<&str>,
        playbook: &Playbook,
    ) -> Result<CaseOutcome, CaseError> {
        let validated = knowledge::validate_input(input.as_ref())?;

        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if matches!(*state, CaseState::Pending) {
                return Err(CaseError::CaseInFlight);
            }
            *state = CaseState::Pending;
        }

        let outcome = self.execute(validated, client_id, playbook).await;

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Ok(outcome) => {
                *state = CaseState::Succeeded(outcome.clone());
                Ok(outcome)
            }
            Err(err) => {
                *state = CaseState::Failed(err.clone());
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        input: &CaseInput,
        client_id: Option<&str>,
        playbook: &Playbook,
    ) -> Result<CaseOutcome, CaseError> {
        let supplied = client_id.and_then(ClientId::new);

        // Identity may be discovered from the generation result itself, so
        // a missing identifier means empty history, not an error.
        let history = match &supplied {
            Some(client) => match self.history.read(client).await {
                Ok(partition) => partition,
                Err(err) => {
                    warn!(client = %client, error = %err, "history read failed; continuing with empty history");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let envelope = knowledge::assemble(Some(input), supplied.as_ref(), &history, playbook)?;
        let result = self.generation.generate(&envelope).await?;

        let effective = supplied.or_else(|| ClientId::new(&result.extracted_client_name));
        if let Some(client) = &effective {
            let record = InteractionRecord {
                date: Local::now().format("%Y-%m-%d %H:%M").to_string(),
                summary: result.analysis.clone(),
                policy_number: result.extracted_policy_number.clone(),
            };
            // The case already succeeded from the agent's perspective;
            // persistence failures are logged, never escalated.
            if let Err(err) = self.history.append(client, &record).await {
                warn!(client = %client, error = %err, "failed to persist interaction record after successful case");
            }
        } else {
            warn!("no usable client identifier; interaction record not persisted");
        }

        Ok(CaseOutcome {
            result,
            client_id: effective,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;

    use super::*;
    use crate::config::StorageConfig;
    use crate::error::{GenerationError, StoreError};
    use crate::history::{HistoryPartition, LocalHistoryStore};
    use crate::knowledge::RequestEnvelope;

    fn sample_result() -> CaseResult {
        CaseResult {
            analysis: "Client reports a move.".to_string(),
            recommendation: "Update the address on all policies.".to_string(),
            next_steps: "Confirm effective date.".to_string(),
            reply_english: "Dear Jane...".to_string(),
            reply_german: "Liebe Jane...".to_string(),
            extracted_client_name: "Jane Doe".to_string(),
            extracted_policy_number: None,
        }
    }

    struct FakeGeneration {
        calls: AtomicUsize,
        outcome: Result<CaseResult, GenerationError>,
        /// When set, `generate` parks until notified so tests can observe
        /// the pending state.
        gate: Option<Arc<Notify>>,
    }

    impl FakeGeneration {
        fn succeeding(result: CaseResult) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome: Ok(result),
                gate: None,
            })
        }

        fn failing(err: GenerationError) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome: Err(err),
                gate: None,
            })
        }

        fn gated(result: CaseResult, gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome: Ok(result),
                gate: Some(gate),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationClient for FakeGeneration {
        async fn generate(
            &self,
            _envelope: &RequestEnvelope,
        ) -> Result<CaseResult, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.outcome.clone()
        }
    }

    fn local_store(dir: &std::path::Path) -> Arc<LocalHistoryStore> {
        Arc::new(LocalHistoryStore::new(&StorageConfig {
            data_dir: dir.to_path_buf(),
        }))
    }

    #[tokio::test]
    async fn invalid_input_never_enters_pending() {
        let dir = tempfile::tempdir().expect("tempdir");
        let generation = FakeGeneration::succeeding(sample_result());
        let orchestrator = CaseOrchestrator::new(local_store(dir.path()), generation.clone());

        let err = orchestrator
            .run_case(None, Some("Jane Doe"), &Playbook::default())
            .await
            .expect_err("must fail");

        assert!(matches!(err, CaseError::InvalidInput(_)));
        assert_eq!(orchestrator.state(), CaseState::Idle);
        assert_eq!(generation.call_count(), 0);
    }

    #[tokio::test]
    async fn second_case_while_pending_is_rejected_without_a_generation_call() {
        let dir = tempfile::tempdir().expect("tempdir");
        let gate = Arc::new(Notify::new());
        let generation = FakeGeneration::gated(sample_result(), gate.clone());
        let orchestrator = Arc::new(CaseOrchestrator::new(
            local_store(dir.path()),
            generation.clone(),
        ));

        let first = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .run_case(
                        Some(CaseInput::Text("I moved.".to_string())),
                        Some("Jane Doe"),
                        &Playbook::default(),
                    )
                    .await
            })
        };

        // Wait until the first case is parked inside the generation call.
        while generation.call_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(orchestrator.state(), CaseState::Pending);

        let err = orchestrator
            .run_case(
                Some(CaseInput::Text("Second email".to_string())),
                Some("Jane Doe"),
                &Playbook::default(),
            )
            .await
            .expect_err("must be rejected");
        assert_eq!(err, CaseError::CaseInFlight);
        assert_eq!(generation.call_count(), 1);

        gate.notify_one();
        first.await.expect("join").expect("first case succeeds");
        assert_eq!(generation.call_count(), 1);
    }

    #[tokio::test]
    async fn success_appends_exactly_one_record_with_the_extracted_policy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = local_store(dir.path());
        let mut result = sample_result();
        result.extracted_policy_number = Some("HH-4711".to_string());
        let generation = FakeGeneration::succeeding(result);
        let orchestrator = CaseOrchestrator::new(store.clone(), generation);

        let outcome = orchestrator
            .run_case(
                Some(CaseInput::Text("My policy HH-4711...".to_string())),
                Some("Jane Doe"),
                &Playbook::default(),
            )
            .await
            .expect("case succeeds");

        assert_eq!(
            outcome.client_id,
            Some(ClientId::new("jane doe").expect("id"))
        );
        let partition = store
            .read(&ClientId::new("jane doe").expect("id"))
            .await
            .expect("read");
        assert_eq!(partition.len(), 1);
        assert_eq!(partition[0].summary, "Client reports a move.");
        assert_eq!(partition[0].policy_number.as_deref(), Some("HH-4711"));
        assert!(matches!(orchestrator.state(), CaseState::Succeeded(_)));
    }

    #[tokio::test]
    async fn failure_appends_nothing_and_exposes_the_error_kind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = local_store(dir.path());
        let generation = FakeGeneration::failing(GenerationError::EmptyResponse);
        let orchestrator = CaseOrchestrator::new(store.clone(), generation);

        let err = orchestrator
            .run_case(
                Some(CaseInput::Text("I moved.".to_string())),
                Some("Jane Doe"),
                &Playbook::default(),
            )
            .await
            .expect_err("case fails");

        assert_eq!(err, CaseError::Generation(GenerationError::EmptyResponse));
        assert_eq!(
            orchestrator.state(),
            CaseState::Failed(CaseError::Generation(GenerationError::EmptyResponse))
        );
        let partition = store
            .read(&ClientId::new("jane doe").expect("id"))
            .await
            .expect("read");
        assert_eq!(partition, HistoryPartition::new());
    }

    #[tokio::test]
    async fn identity_is_learned_from_the_result_when_not_supplied() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = local_store(dir.path());
        let generation = FakeGeneration::succeeding(sample_result());
        let orchestrator = CaseOrchestrator::new(store.clone(), generation);

        let outcome = orchestrator
            .run_case(
                Some(CaseInput::Text("I moved.".to_string())),
                None,
                &Playbook::default(),
            )
            .await
            .expect("case succeeds");

        let learned = ClientId::new("Jane Doe").expect("id");
        assert_eq!(outcome.client_id, Some(learned.clone()));
        assert_eq!(store.read(&learned).await.expect("read").len(), 1);
    }

    #[tokio::test]
    async fn history_read_failure_does_not_fail_the_case() {
        struct CorruptReadStore(LocalHistoryStore);

        #[async_trait]
        impl HistoryStore for CorruptReadStore {
            async fn read(&self, _client: &ClientId) -> Result<HistoryPartition, StoreError> {
                Err(StoreError::Local("corrupt partition".to_string()))
            }
            async fn append(
                &self,
                client: &ClientId,
                record: &InteractionRecord,
            ) -> Result<(), StoreError> {
                self.0.append(client, record).await
            }
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(CorruptReadStore(LocalHistoryStore::new(&StorageConfig {
            data_dir: dir.path().to_path_buf(),
        })));
        let generation = FakeGeneration::succeeding(sample_result());
        let orchestrator = CaseOrchestrator::new(store, generation);

        orchestrator
            .run_case(
                Some(CaseInput::Text("I moved.".to_string())),
                Some("Jane Doe"),
                &Playbook::default(),
            )
            .await
            .expect("case still succeeds");
    }

    #[tokio::test]
    async fn reset_workspace_returns_to_idle_from_any_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let generation = FakeGeneration::failing(GenerationError::MissingCredential);
        let orchestrator = CaseOrchestrator::new(local_store(dir.path()), generation);

        let _ = orchestrator
            .run_case(
                Some(CaseInput::Text("I moved.".to_string())),
                None,
                &Playbook::default(),
            )
            .await;
        assert!(matches!(orchestrator.state(), CaseState::Failed(_)));

        orchestrator.reset_workspace();
        assert_eq!(orchestrator.state(), CaseState::Idle);
    }

    #[tokio::test]
    async fn rerunning_an_identical_case_appends_an_independent_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = local_store(dir.path());
        let generation = FakeGeneration::succeeding(sample_result());
        let orchestrator = CaseOrchestrator::new(store.clone(), generation);

        for _ in 0..2 {
            orchestrator
                .run_case(
                    Some(CaseInput::Text("I moved.".to_string())),
                    Some("Jane Doe"),
                    &Playbook::default(),
                )
                .await
                .expect("case succeeds");
            orchestrator.reset_workspace();
        }

        let partition = store
            .read(&ClientId::new("jane doe").expect("id"))
            .await
            .expect("read");
        assert_eq!(partition.len(), 2);
    }
}
