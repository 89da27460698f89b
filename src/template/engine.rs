//! minijinja environment for manifest templates

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

use super::error::TemplateError;
use super::filters;
use super::parse_documents;
use crate::object::Document;

/// Template engine for resource descriptors
///
/// Supports:
/// - `{{ ... }}` variable references against the serialized configuration
/// - `{% if %}` / `{% for %}` blocks (add-on toggles, one document per node pool)
/// - Strict undefined variable handling
/// - `contains`, `indent` and `b64encode` helpers
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Create a new engine with the manifest helpers registered
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        // Block tags sit on their own lines in YAML templates
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);

        env.add_function("contains", filters::contains);
        env.add_filter("contains", filters::contains);
        env.add_filter("b64encode", filters::b64encode);

        Self { env }
    }

    /// Render template text against a serializable context
    pub fn render<S: Serialize>(&self, template: &str, ctx: &S) -> Result<String, TemplateError> {
        self.env
            .render_str(template, ctx)
            .map_err(TemplateError::classify)
    }

    /// Render template text and decode the output into documents
    ///
    /// Either every document of the template is returned or none is.
    pub fn render_documents<S: Serialize>(
        &self,
        template: &str,
        ctx: &S,
    ) -> Result<Vec<Document>, TemplateError> {
        let rendered = self.render(template, ctx)?;
        parse_documents(&rendered)
    }
}
