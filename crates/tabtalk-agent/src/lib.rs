//! tabtalk-agent: the orchestration core
//!
//! Owns the transcript for one run and drives the two-pass
//! decide/execute/synthesize protocol against a `CompletionProvider`.

pub mod orchestrator;
pub mod system_prompt;

pub use orchestrator::{Agent, AgentConfig};
pub use system_prompt::SYSTEM_PROMPT;
