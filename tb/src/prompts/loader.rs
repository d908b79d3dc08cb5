//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to embedded defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use tracing::debug;

use super::embedded;

/// The templates the pipeline renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    Breakdown,
    Extract,
    Correction,
}

impl TemplateName {
    pub const ALL: [TemplateName; 3] = [TemplateName::Breakdown, TemplateName::Extract, TemplateName::Correction];

    /// File stem and registry name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakdown => "breakdown",
            Self::Extract => "extract",
            Self::Correction => "correction",
        }
    }

    /// Variables the template must reference
    pub fn required_placeholders(&self) -> &'static [&'static str] {
        match self {
            Self::Breakdown => &["chat_history", "input"],
            Self::Extract => &["input"],
            Self::Correction => &["input", "previous", "error"],
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a template's text came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    File(PathBuf),
    Embedded,
}

/// Loads raw template text
#[derive(Debug, Clone, Default)]
pub struct PromptLoader {
    /// Override directory holding `{name}.pmt` files
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `dir` before the embedded defaults
    pub fn new(dir: Option<impl AsRef<Path>>) -> Self {
        let override_dir = dir.map(|d| d.as_ref().to_path_buf());
        debug!(?override_dir, "PromptLoader::new: called");
        if let Some(dir) = &override_dir
            && !dir.exists()
        {
            debug!(?dir, "PromptLoader::new: override directory does not exist, embedded only");
            return Self::embedded_only();
        }
        Self { override_dir }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self { override_dir: None }
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. Override: `{dir}/{name}.pmt`
    /// 2. Embedded fallback
    pub fn load_template(&self, name: TemplateName) -> Result<(String, TemplateSource)> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(dir) = &self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found override");
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e))?;
                return Ok((text, TemplateSource::File(path)));
            }
            debug!(?path, "PromptLoader::load_template: no override");
        }

        embedded::get_embedded(name.as_str())
            .map(|text| (text.to_string(), TemplateSource::Embedded))
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }
}
