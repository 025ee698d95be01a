//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to
//! embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::{debug, info};

use super::embedded;

/// Template name of the system prompt
pub const SYSTEM_TEMPLATE: &str = "planner-system";

/// Template name of the per-round user prompt
pub const GENERATE_TEMPLATE: &str = "generate";

/// Values available to the generation template
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationContext {
    /// Request text, including any clarification answers
    pub request: String,
    /// Supplementary context that fit the role's budget
    pub attached_context: Option<String>,
    /// Summary of the previous round's violations
    pub guidance: Option<String>,
    /// Round that produced `guidance`
    pub round: u32,
}

impl GenerationContext {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, attached: impl Into<String>) -> Self {
        let attached = attached.into();
        self.attached_context = (!attached.trim().is_empty()).then_some(attached);
        self
    }

    /// Corrective guidance from a rejected round
    pub fn with_guidance(mut self, round: u32, guidance: impl Into<String>) -> Self {
        self.round = round;
        self.guidance = Some(guidance.into());
        self
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    /// Override directory (e.g. `.planwright/prompts/`)
    override_dir: Option<PathBuf>,
}

fn engine() -> Handlebars<'static> {
    let mut hbs = Handlebars::new();
    hbs.set_strict_mode(true);
    hbs.register_escape_fn(handlebars::no_escape);
    hbs
}

impl PromptLoader {
    /// Create a loader that checks `<root>/.planwright/prompts/` before the embedded set
    pub fn new(root: impl AsRef<Path>) -> Self {
        let dir = root.as_ref().join(".planwright/prompts");
        let exists = dir.is_dir();
        debug!(?dir, %exists, "PromptLoader::new: called");
        Self {
            hbs: engine(),
            override_dir: exists.then_some(dir),
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: engine(),
            override_dir: None,
        }
    }

    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(dir) = &self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt override {}: {}", path.display(), e));
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }

    /// The system prompt sent with every generation call
    pub fn system_prompt(&self) -> Result<String> {
        debug!("PromptLoader::system_prompt: called");
        self.load_template(SYSTEM_TEMPLATE)
    }

    /// Render a template with the given context
    pub fn render<T: Serialize>(&self, template_name: &str, context: &T) -> Result<String> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// Render the user prompt for one generation round
    pub fn generation_prompt(&self, context: &GenerationContext) -> Result<String> {
        info!(round = context.round, guided = context.guidance.is_some(), "Rendering generation prompt");
        self.render(GENERATE_TEMPLATE, context)
    }
}
