//! Prompt Template System
//!
//! Loads and renders the `.pmt` templates behind the two pipeline stages.
//!
//! Template loading chain:
//! 1. `{prompts.dir}/{name}.pmt` (user override)
//! 2. Embedded default compiled into the binary
//!
//! Templates use Handlebars syntax for variable substitution.

pub mod embedded;
mod loader;
mod renderer;

pub use loader::{PromptLoader, TemplateName, TemplateSource};
pub use renderer::{PromptError, PromptRenderer};
