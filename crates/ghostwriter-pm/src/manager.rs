use std::collections::BTreeSet;
use std::path::Path;

use minijinja::{Environment, UndefinedBehavior};
use tracing::debug;

use crate::error::PmError;
use crate::template::{BUILTIN_TEMPLATES, PromptTemplate};

/// Name of the template used to build rewrite instructions.
///
/// Rendered with a single `original` variable holding the text to rewrite.
pub const REWRITE_TEMPLATE: &str = "rewrite";

/// Manages prompt templates and renders them with context variables.
///
/// Built-in templates are registered on construction. Templates loaded later
/// with [`load_dir`](Self::load_dir) or [`add_template`](Self::add_template)
/// replace built-ins with the same name.
#[derive(Debug)]
pub struct PromptManager {
    env: Environment<'static>,
    names: BTreeSet<String>,
}

impl PromptManager {
    /// Create a manager with all built-in templates registered.
    ///
    /// # Errors
    ///
    /// Returns `PmError::Syntax` if a built-in template fails to parse.
    pub fn new() -> Result<Self, PmError> {
        let mut env = Environment::new();
        // Missing variables fail loudly when printed but stay falsy in `if` checks.
        env.set_undefined_behavior(UndefinedBehavior::SemiStrict);

        let mut pm = Self {
            env,
            names: BTreeSet::new(),
        };
        for (name, source) in BUILTIN_TEMPLATES {
            pm.add_template(PromptTemplate::new(*name, *source))?;
        }
        Ok(pm)
    }

    /// Load all `.j2` / `.jinja` templates from a directory.
    ///
    /// The template name is the file stem, so `blog_post.j2` overrides the
    /// built-in `blog_post` template.
    pub fn load_dir(&mut self, dir: &Path) -> Result<(), PmError> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_template = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("j2" | "jinja")
            );
            if !is_template || !path.is_file() {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let source = std::fs::read_to_string(&path)?;
            debug!(template = name, path = %path.display(), "loaded template override");
            self.add_template(PromptTemplate::new(name, source))?;
        }
        Ok(())
    }

    /// Register a single template.
    pub fn add_template(&mut self, template: PromptTemplate) -> Result<(), PmError> {
        self.env
            .add_template_owned(template.name.clone(), template.source)?;
        self.names.insert(template.name);
        Ok(())
    }

    /// Render a template by name with the given context.
    pub fn render(&self, name: &str, ctx: &serde_json::Value) -> Result<String, PmError> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }

    /// Build the rewrite instruction for `original`, embedding it verbatim.
    pub fn rewrite_instruction(&self, original: &str) -> Result<String, PmError> {
        self.render(
            REWRITE_TEMPLATE,
            &serde_json::json!({ "original": original }),
        )
    }

    /// Returns the names of all registered templates in sorted order.
    pub fn list_templates(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    /// Returns the templates meant for content generation.
    ///
    /// This is [`list_templates`](Self::list_templates) minus the internal
    /// rewrite instruction.
    pub fn content_templates(&self) -> Vec<&str> {
        self.names
            .iter()
            .map(String::as_str)
            .filter(|name| *name != REWRITE_TEMPLATE)
            .collect()
    }
}
