//! Workflow engine
//!
//! Sequences the staged pipeline for one query: intent analysis, the search
//! backend, draft-answer generation, then user confirmation. Each stage
//! suspends on its real awaited call; there are no artificial delays.
//!
//! Every run carries a cancellation token, checked at every resumption. The
//! token is the sole gate on whether a state mutation (and its published
//! snapshot) is applied: cancelling a run does not abort in-flight provider
//! calls, it discards their effects.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::flows::{AnswerFlow, IntentFlow};
use crate::llm::Llm;
use crate::search::SearchBackend;
use crate::types::{AppError, AppResult};
use crate::workflow::state::{Feedback, WorkflowState, WorkflowStatus};

/// The one user-facing failure message. Failures are not classified by
/// cause for the user; the cause goes to the log.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// Snapshot stream of a run, one item per applied state mutation, starting
/// with the freshly created `analyzing` state.
pub type WorkflowEvents = mpsc::UnboundedReceiver<WorkflowState>;

pub struct WorkflowEngine {
    llm: Arc<Llm>,
    backend: Arc<dyn SearchBackend>,
    config: Arc<Config>,
}

struct RunShared {
    state: Mutex<WorkflowState>,
    events: mpsc::UnboundedSender<WorkflowState>,
    cancel: CancellationToken,
}

impl RunShared {
    /// Apply a mutation and publish the snapshot, unless the run has been
    /// cancelled in the meantime.
    fn apply(&self, mutate: impl FnOnce(&mut WorkflowState)) -> bool {
        if self.cancel.is_cancelled() {
            debug!("Discarding state update from superseded run");
            return false;
        }
        let snapshot = {
            let mut state = self.state.lock().expect("workflow state lock poisoned");
            mutate(&mut state);
            state.clone()
        };
        let _ = self.events.send(snapshot);
        true
    }

    fn snapshot(&self) -> WorkflowState {
        self.state.lock().expect("workflow state lock poisoned").clone()
    }
}

/// Cloneable reference to a running workflow: snapshot access, feedback
/// submission, cancellation.
#[derive(Clone)]
pub struct WorkflowHandle {
    id: Uuid,
    shared: Arc<RunShared>,
}

impl std::fmt::Debug for WorkflowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl WorkflowHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> WorkflowState {
        self.shared.snapshot()
    }

    /// Cancel the run. Idempotent; already-completing stage calls keep
    /// running but none of their effects will be observable.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Route a user feedback signal to the run. Valid while a draft answer
    /// awaits confirmation; settles the run. Repeats after settlement are
    /// accepted and have no further effect.
    pub fn submit_feedback(&self, feedback: Feedback) -> AppResult<WorkflowState> {
        if self.shared.cancel.is_cancelled() {
            return Err(AppError::InvalidRequest(
                "workflow run was cancelled".to_string(),
            ));
        }

        let snapshot = {
            let mut state = self.shared.state.lock().expect("workflow state lock poisoned");
            match state.status {
                WorkflowStatus::Confirming => {
                    state.record_feedback(feedback);
                    state.clone()
                }
                WorkflowStatus::FeedbackSubmitted => return Ok(state.clone()),
                _ => {
                    return Err(AppError::InvalidRequest(
                        "no draft answer awaiting confirmation".to_string(),
                    ));
                }
            }
        };

        info!(run_id = %self.id, feedback = ?feedback, "User feedback submitted");
        let _ = self.shared.events.send(snapshot.clone());
        Ok(snapshot)
    }
}

impl WorkflowEngine {
    pub fn new(llm: Arc<Llm>, backend: Arc<dyn SearchBackend>, config: Arc<Config>) -> Self {
        Self {
            llm,
            backend,
            config,
        }
    }

    /// Start a run for a non-empty query. The state is created in
    /// `analyzing` and the pipeline task begins immediately.
    pub fn start(&self, query: &str) -> AppResult<(WorkflowHandle, WorkflowEvents)> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(RunShared {
            state: Mutex::new(WorkflowState::new(id, query)),
            events: events_tx,
            cancel: CancellationToken::new(),
        });

        // initial snapshot: the run exists and is analyzing
        let _ = shared.events.send(shared.snapshot());

        info!(run_id = %id, query = %query, "Search workflow started");
        tokio::spawn(run_pipeline(
            shared.clone(),
            self.llm.clone(),
            self.backend.clone(),
            self.config.clone(),
            query.to_string(),
        ));

        Ok((WorkflowHandle { id, shared }, events_rx))
    }
}

async fn run_pipeline(
    shared: Arc<RunShared>,
    llm: Arc<Llm>,
    backend: Arc<dyn SearchBackend>,
    config: Arc<Config>,
    query: String,
) {
    // 1. Analyze intent
    let intent = match IntentFlow::analyze(&llm, &config, &query).await {
        Ok(intent) => intent,
        Err(e) => {
            fail_run(&shared, "analyzing", e);
            return;
        }
    };
    if !shared.apply(|state| state.record_intent(intent.clone())) {
        return;
    }

    // 2. Search data sources
    let results = match backend.search(&query, &intent).await {
        Ok(results) => results,
        Err(e) => {
            fail_run(&shared, "searching", e);
            return;
        }
    };
    if !shared.apply(|state| state.record_results(results.clone())) {
        return;
    }

    // 3. Generate draft answer
    let corpus = AnswerFlow::format_results(&results);
    match AnswerFlow::generate(&llm, &config, &query, &corpus).await {
        Ok(draft) => {
            // 4. Entering `confirming`: the run now waits for feedback via
            // WorkflowHandle::submit_feedback
            shared.apply(|state| state.record_answer(draft));
        }
        Err(e) => fail_run(&shared, "generating", e),
    }
}

fn fail_run(shared: &RunShared, stage: &str, cause: AppError) {
    error!(stage = stage, error = %cause, "Search workflow stage failed");
    shared.apply(|state| state.fail(GENERIC_ERROR_MESSAGE));
}

/// Owns at most one active run. Submitting a new query supersedes the run
/// in flight: the old run is cancelled and a fresh state is built — nothing
/// from a superseded run is reused or observable afterwards.
pub struct WorkflowSession {
    engine: Arc<WorkflowEngine>,
    current: Mutex<Option<WorkflowHandle>>,
}

impl WorkflowSession {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self {
            engine,
            current: Mutex::new(None),
        }
    }

    pub fn submit(&self, query: &str) -> AppResult<(WorkflowHandle, WorkflowEvents)> {
        let mut current = self.current.lock().expect("session lock poisoned");
        if let Some(previous) = current.take() {
            info!(run_id = %previous.id(), "Superseding in-flight workflow run");
            previous.cancel();
        }

        let (handle, events) = self.engine.start(query)?;
        *current = Some(handle.clone());
        Ok((handle, events))
    }

    /// Tear the session down, cancelling any run in flight.
    pub fn close(&self) {
        let mut current = self.current.lock().expect("session lock poisoned");
        if let Some(handle) = current.take() {
            handle.cancel();
        }
    }
}
