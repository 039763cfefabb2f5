// Prompt assembly (C3) and the agentic query pipeline (C5) over the
// model-agnostic `Driver` contract from `assistant-core`. This is also the
// only crate that depends on all three wire-driver crates, since resolving
// an active `BackendTag` into a live client requires them and
// `assistant-core` itself can't (see `provider_factory`).

pub mod agent_prompt;
pub mod pipeline;
pub mod prompts;
pub mod provider_factory;

pub use agent_prompt::{parse_agent_prompt, AgentPrompt};
pub use pipeline::{AgenticPipeline, BaselineRagRequest, RagAnswer, RetrievalDecision, ToolSelectionOutput};
pub use prompts::{assemble, index_to_citation, PromptVariant};
