//! StructuredExtractor - stage two of the pipeline
//!
//! Stateless: the only input is the breakdown text. The output is returned
//! exactly as generated, even when empty, and decoded by the parser.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::error::{CoreError, DecodeError, Stage};
use super::generate_text;
use crate::llm::{CompletionRequest, LlmClient};
use crate::prompts::PromptRenderer;

pub struct StructuredExtractor {
    llm: Arc<dyn LlmClient>,
    renderer: Arc<PromptRenderer>,
    deadline: Duration,
    max_tokens: u32,
}

impl StructuredExtractor {
    pub fn new(llm: Arc<dyn LlmClient>, renderer: Arc<PromptRenderer>, deadline: Duration, max_tokens: u32) -> Self {
        debug!(model = %llm.model(), ?deadline, max_tokens, "StructuredExtractor::new: called");
        Self {
            llm,
            renderer,
            deadline,
            max_tokens,
        }
    }

    /// Ask the model for the task/time mapping of a breakdown
    pub async fn extract(&self, breakdown: &str) -> Result<String, CoreError> {
        debug!(breakdown_len = breakdown.len(), "extract: called");
        let prompt = self.renderer.render_extract(breakdown)?;
        let request = CompletionRequest::prompt(prompt, self.max_tokens);
        generate_text(self.llm.as_ref(), request, self.deadline, Stage::Extraction).await
    }

    /// Re-ask after `previous` failed to decode with `error`
    pub async fn correct(&self, breakdown: &str, previous: &str, error: &DecodeError) -> Result<String, CoreError> {
        debug!(%error, "correct: called");
        let prompt = self
            .renderer
            .render_correction(breakdown, previous, &error.to_string())?;
        let request = CompletionRequest::prompt(prompt, self.max_tokens);
        generate_text(self.llm.as_ref(), request, self.deadline, Stage::Correction).await
    }
}
