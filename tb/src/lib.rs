//! Taskbreaker - timed microtask breakdowns from a two-stage LLM pipeline
//!
//! A task request such as "Study for Math Exam, 1 hour" is first broken down
//! into formatted steps by a conversational call that sees the session's
//! earlier turns. A second, stateless call restates those steps as JSON, which
//! is decoded into an ordered task/time list.
//!
//! # Modules
//!
//! - [`llm`] - Generation capability trait and HTTP providers
//! - [`prompts`] - Template loading and rendering
//! - [`memory`] - Per-session transcripts
//! - [`pipeline`] - Breakdown, extraction, parsing and the entry point
//! - [`config`] - Configuration types and loading
//! - [`cli`] / [`repl`] / [`display`] - Command-line surface

pub mod cli;
pub mod config;
pub mod display;
pub mod llm;
pub mod memory;
pub mod pipeline;
pub mod prompts;
pub mod repl;

// Re-export commonly used types
pub use config::{Config, LlmConfig, MemoryConfig, PipelineConfig, PromptsConfig};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, Role, create_client};
pub use memory::{Session, SessionStore, Turn};
pub use pipeline::{
    BreakdownOutcome, CoreError, DecodeError, ExtractedTask, Minutes, Pipeline, PipelineWarning, Stage, TimeBudget,
};
pub use prompts::{PromptError, PromptLoader, PromptRenderer, TemplateName};
