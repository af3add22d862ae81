//! Orchestration of the prompt-to-part pipeline: a planner sketches an
//! approach, a coder emits PartScript, the evaluator runs it in isolation,
//! and failures feed back into the conversation as corrective hints until
//! the retry budget runs out.

pub mod analyze;
pub mod backend;
pub mod classify;
pub mod extract;
pub mod normalize;
pub mod pipeline;
pub mod prompts;

pub use analyze::{GeometryReport, NEAR_EMPTY_VOLUME_MM3, analyze};
pub use backend::{AgentError, Capability, ChatBackend, ChatMessage, OpenRouterBackend, Role};
pub use pipeline::{
    AttemptFailure, DesignRequest, Orchestrator, PipelineConfig, SessionError, SessionOutcome,
};
