//! Staged search workflow
//!
//! One run per submitted query, advancing through fixed stages:
//!
//! ```text
//! Query
//!   │
//!   ▼
//! ┌────────────┐
//! │ analyzing  │  → intent analysis (LLM)
//! └────────────┘
//!   │
//!   ▼
//! ┌────────────┐
//! │ searching  │  → multi-source retrieval (SearchBackend)
//! └────────────┘
//!   │
//!   ▼
//! ┌────────────┐
//! │ generating │  → draft answer (LLM)
//! └────────────┘
//!   │
//!   ▼
//! ┌────────────┐
//! │ confirming │  → awaits user feedback (yes / no / partial)
//! └────────────┘
//!   │
//!   ▼
//! feedback_submitted
//! ```
//!
//! Any stage may fail into the terminal `error` state instead. A run never
//! revisits a stage; a new query for the same session supersedes the run in
//! flight.

pub mod engine;
pub mod state;

pub use engine::{WorkflowEngine, WorkflowEvents, WorkflowHandle, WorkflowSession};
pub use state::{Feedback, WorkflowState, WorkflowStatus};
