//! Generation flows
//!
//! The two request/response functions that delegate to the external LLM
//! service, each a fixed instruction template with the caller's data
//! interpolated in:
//!
//! - **Intent flow**: classifies a query and selects the data sources the
//!   search stage should be routed to
//! - **Answer flow**: drafts an answer strictly from the supplied search
//!   results, with buffered and streaming entry points
//!
//! Both are stateless; the workflow engine sequences them.

pub mod answer;
pub mod intent;

pub use answer::AnswerFlow;
pub use intent::IntentFlow;
