//! Workflow state record and status lifecycle

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DraftAnswer, SearchIntent, SearchResult};

/// Stage of a search workflow run. Advances monotonically through
/// `analyzing → searching → generating → confirming → feedback_submitted`;
/// any non-terminal stage may instead drop into `error`. No stage is ever
/// re-entered for the same run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Analyzing,
    Searching,
    Generating,
    Confirming,
    FeedbackSubmitted,
    Error,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::FeedbackSubmitted | WorkflowStatus::Error)
    }

    fn ordinal(self) -> u8 {
        match self {
            WorkflowStatus::Analyzing => 1,
            WorkflowStatus::Searching => 2,
            WorkflowStatus::Generating => 3,
            WorkflowStatus::Confirming => 4,
            WorkflowStatus::FeedbackSubmitted => 5,
            WorkflowStatus::Error => 6,
        }
    }

    /// Whether moving to `next` keeps the lifecycle monotonic: one step
    /// forward, or into `error` from any non-terminal stage.
    pub fn can_advance_to(self, next: WorkflowStatus) -> bool {
        if next == WorkflowStatus::Error {
            return !self.is_terminal();
        }
        next.ordinal() == self.ordinal() + 1
    }
}

/// User verdict on a draft answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Yes,
    No,
    Partial,
}

/// The single mutable record of one workflow run. Snapshots of it are what
/// progress consumers see.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    pub id: Uuid,
    pub query: String,
    pub status: WorkflowStatus,
    pub intent: Option<SearchIntent>,
    pub results: Vec<SearchResult>,
    pub draft_answer: Option<DraftAnswer>,
    pub feedback: Option<Feedback>,
    pub error: Option<String>,
}

impl WorkflowState {
    pub fn new(id: Uuid, query: impl Into<String>) -> Self {
        Self {
            id,
            query: query.into(),
            status: WorkflowStatus::Analyzing,
            intent: None,
            results: Vec::new(),
            draft_answer: None,
            feedback: None,
            error: None,
        }
    }

    pub(crate) fn record_intent(&mut self, intent: SearchIntent) {
        self.intent = Some(intent);
        self.advance(WorkflowStatus::Searching);
    }

    pub(crate) fn record_results(&mut self, results: Vec<SearchResult>) {
        self.results = results;
        self.advance(WorkflowStatus::Generating);
    }

    pub(crate) fn record_answer(&mut self, draft: DraftAnswer) {
        self.draft_answer = Some(draft);
        self.advance(WorkflowStatus::Confirming);
    }

    pub(crate) fn record_feedback(&mut self, feedback: Feedback) {
        self.feedback = Some(feedback);
        self.advance(WorkflowStatus::FeedbackSubmitted);
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.status = WorkflowStatus::Error;
    }

    fn advance(&mut self, next: WorkflowStatus) {
        debug_assert!(
            self.status.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self.status,
            next
        );
        self.status = next;
    }
}
