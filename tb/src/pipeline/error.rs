//! Pipeline error and warning types

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::budget::{Minutes, TimeBudget};
use crate::llm::LlmError;
use crate::prompts::PromptError;

/// Which generation call a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Breakdown,
    Extraction,
    Correction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Breakdown => "breakdown",
            Stage::Extraction => "extraction",
            Stage::Correction => "correction",
        };
        write!(f, "{}", name)
    }
}

/// Extraction output that is not the expected JSON object
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Errors surfaced by the two-stage pipeline
#[derive(Debug, Error)]
pub enum CoreError {
    /// Startup problem: unusable template, unset model, unknown provider
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// A generation call failed; the session transcript was not modified
    #[error("Generation failed during {stage}: {source}")]
    Generation {
        stage: Stage,
        #[source]
        source: LlmError,
    },

    /// The extraction call itself failed after the breakdown was recorded
    #[error("Generation failed during extraction: {source}")]
    Extraction {
        breakdown: String,
        #[source]
        source: LlmError,
    },

    /// Extraction output could not be decoded; the breakdown is kept for a degraded display
    #[error("Could not decode extraction output: {source}")]
    Decode {
        breakdown: String,
        raw: String,
        #[source]
        source: DecodeError,
    },
}

impl CoreError {
    /// Startup-time configuration failure (as opposed to a per-request one)
    pub fn is_config(&self) -> bool {
        match self {
            CoreError::Config(_) => true,
            CoreError::Prompt(e) => !matches!(e, PromptError::Render { .. }),
            _ => false,
        }
    }

    /// The breakdown text, when the failure happened after stage one succeeded
    pub fn breakdown(&self) -> Option<&str> {
        match self {
            CoreError::Extraction { breakdown, .. } | CoreError::Decode { breakdown, .. } => Some(breakdown),
            _ => None,
        }
    }

    /// Attach the stage-one text to a failed extraction call
    pub(crate) fn with_breakdown(self, breakdown: String) -> Self {
        match self {
            CoreError::Generation { source, .. } => CoreError::Extraction { breakdown, source },
            other => other,
        }
    }

    /// Whether rerunning the whole pipeline may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Generation { source, .. } | CoreError::Extraction { source, .. } => source.is_retryable(),
            CoreError::Decode { .. } => true,
            _ => false,
        }
    }
}

/// Soft outcomes that do not fail the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PipelineWarning {
    /// Decoding worked but there was no `Task 1`; show the raw breakdown instead
    EmptyResult,

    /// Extracted times add up past the budget stated in the request
    OverBudget { budget: TimeBudget, total: Minutes },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::EmptyResult => write!(f, "no tasks could be extracted"),
            PipelineWarning::OverBudget { budget, total } => {
                write!(f, "extracted times total {} but the stated budget is {}", total, budget)
            }
        }
    }
}
