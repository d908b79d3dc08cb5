//! Prompt Renderer
//!
//! Compiles the pipeline templates once at startup and renders them per call.
//! Placeholder checks happen here, so a broken template is a startup error and
//! never a per-request one.

use std::collections::HashMap;

use handlebars::Handlebars;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::loader::{PromptLoader, TemplateName, TemplateSource};
use crate::memory::{Turn, render_transcript};

/// Template configuration and rendering failures
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Template '{template}' is missing required placeholder '{{{{{placeholder}}}}}'")]
    MissingPlaceholder {
        template: TemplateName,
        placeholder: &'static str,
    },

    #[error("Template '{template}' failed to load: {message}")]
    Load { template: TemplateName, message: String },

    #[error("Template '{template}' failed to compile: {message}")]
    Compile { template: TemplateName, message: String },

    #[error("Template '{template}' failed to render: {message}")]
    Render { template: TemplateName, message: String },
}

#[derive(Serialize)]
struct BreakdownContext<'a> {
    chat_history: String,
    input: &'a str,
}

#[derive(Serialize)]
struct ExtractContext<'a> {
    input: &'a str,
}

#[derive(Serialize)]
struct CorrectionContext<'a> {
    input: &'a str,
    previous: &'a str,
    error: &'a str,
}

/// Renders the breakdown, extraction and correction prompts
pub struct PromptRenderer {
    hbs: Handlebars<'static>,
    sources: HashMap<TemplateName, TemplateSource>,
}

impl PromptRenderer {
    /// Load, validate and compile every pipeline template
    pub fn from_loader(loader: &PromptLoader) -> Result<Self, PromptError> {
        debug!("PromptRenderer::from_loader: called");
        let mut templates = Vec::new();
        for name in TemplateName::ALL {
            let (text, source) = loader.load_template(name).map_err(|e| PromptError::Load {
                template: name,
                message: e.to_string(),
            })?;
            templates.push((name, text, source));
        }
        Self::compile(templates)
    }

    /// Build from literal template text (breakdown, extract, correction)
    pub fn from_strings(breakdown: &str, extract: &str, correction: &str) -> Result<Self, PromptError> {
        debug!("PromptRenderer::from_strings: called");
        Self::compile(vec![
            (TemplateName::Breakdown, breakdown.to_string(), TemplateSource::Embedded),
            (TemplateName::Extract, extract.to_string(), TemplateSource::Embedded),
            (TemplateName::Correction, correction.to_string(), TemplateSource::Embedded),
        ])
    }

    fn compile(templates: Vec<(TemplateName, String, TemplateSource)>) -> Result<Self, PromptError> {
        let mut hbs = Handlebars::new();
        hbs.set_strict_mode(true);
        hbs.register_escape_fn(handlebars::no_escape);

        let mut sources = HashMap::new();
        for (name, text, source) in templates {
            check_placeholders(name, &text)?;
            hbs.register_template_string(name.as_str(), &text)
                .map_err(|e| PromptError::Compile {
                    template: name,
                    message: e.to_string(),
                })?;
            info!(template = %name, ?source, "Registered prompt template");
            sources.insert(name, source);
        }

        Ok(Self { hbs, sources })
    }

    /// Where a template was loaded from
    pub fn source(&self, name: TemplateName) -> Option<&TemplateSource> {
        self.sources.get(&name)
    }

    /// Render the breakdown prompt from the session history and new input
    pub fn render_breakdown(&self, history: &[Turn], input: &str) -> Result<String, PromptError> {
        debug!(history_len = history.len(), input_len = input.len(), "render_breakdown: called");
        let ctx = BreakdownContext {
            chat_history: render_transcript(history),
            input,
        };
        self.render(TemplateName::Breakdown, &ctx)
    }

    /// Render the extraction prompt over a breakdown
    pub fn render_extract(&self, breakdown: &str) -> Result<String, PromptError> {
        debug!(breakdown_len = breakdown.len(), "render_extract: called");
        self.render(TemplateName::Extract, &ExtractContext { input: breakdown })
    }

    /// Render the correction prompt after an undecodable extraction
    pub fn render_correction(&self, breakdown: &str, previous: &str, error: &str) -> Result<String, PromptError> {
        debug!(previous_len = previous.len(), %error, "render_correction: called");
        let ctx = CorrectionContext {
            input: breakdown,
            previous,
            error,
        };
        self.render(TemplateName::Correction, &ctx)
    }

    fn render<T: Serialize>(&self, name: TemplateName, ctx: &T) -> Result<String, PromptError> {
        self.hbs.render(name.as_str(), ctx).map_err(|e| PromptError::Render {
            template: name,
            message: e.to_string(),
        })
    }
}

/// Fail if the template never references one of its required variables
fn check_placeholders(name: TemplateName, text: &str) -> Result<(), PromptError> {
    for &placeholder in name.required_placeholders() {
        let pattern = format!(r"\{{\{{\{{?~?\s*{}\s*~?\}}?\}}\}}", regex::escape(placeholder));
        let present = Regex::new(&pattern).map(|re| re.is_match(text)).unwrap_or(false);
        if !present {
            debug!(template = %name, %placeholder, "check_placeholders: missing");
            return Err(PromptError::MissingPlaceholder {
                template: name,
                placeholder,
            });
        }
    }
    Ok(())
}
