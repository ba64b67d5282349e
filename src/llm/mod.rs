// LLM abstraction layer

pub mod anthropic;
pub mod glm;
pub mod openai;
pub mod provider;
pub mod sse;

pub use provider::*;
