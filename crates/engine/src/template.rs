//! Template engines: `plain` (identity), `vars` (placeholder lookup) and
//! `jinja` (minijinja expressions).

use crate::error::RuntimeError;
use crate::escape::{escape_html, escape_markdown};
use minijinja::{AutoEscape, Environment};
use sceneflow_core::{ParseMode, TemplateKind};
use serde_json::{Map, Value};

/// Expression-template environment shared by every session of a flow.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::with_environment(Environment::new())
    }

    /// Wrap a pre-configured environment (custom filters, globals). Auto
    /// escaping is turned off and the `e_md`/`e_html` filters are added on
    /// top.
    pub fn with_environment(mut env: Environment<'static>) -> Self {
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_filter("e_md", |value: minijinja::Value| escape_markdown(&filter_text(&value)));
        env.add_filter("e_html", |value: minijinja::Value| escape_html(&filter_text(&value)));
        Self { env }
    }

    pub fn render_expression(
        &self,
        template: &str,
        context: &Map<String, Value>,
    ) -> Result<String, RuntimeError> {
        self.env
            .render_str(template, context)
            .map_err(|e| RuntimeError::Template(e.to_string()))
    }
}

fn filter_text(value: &minijinja::Value) -> String {
    if value.is_undefined() || value.is_none() {
        return String::new();
    }
    match value.as_str() {
        Some(s) => s.to_owned(),
        None => value.to_string(),
    }
}

/// Variable sources for one template application.
pub trait VariableScope {
    /// Value for a `vars` placeholder.
    fn lookup(&mut self, name: &str) -> Option<String>;
    /// Full context for an expression template.
    fn context(&mut self) -> Map<String, Value>;
}

/// Apply `kind` to `text`. Text without `{` is returned untouched by every
/// engine; `mode` escapes `vars` substitutions.
pub fn apply(
    engine: &TemplateEngine,
    kind: TemplateKind,
    text: &str,
    mode: Option<ParseMode>,
    scope: &mut dyn VariableScope,
) -> Result<String, RuntimeError> {
    if !text.contains('{') {
        return Ok(text.to_owned());
    }
    match kind {
        TemplateKind::Plain => Ok(text.to_owned()),
        TemplateKind::Vars => Ok(crate::variables::substitute(text, mode, |name| scope.lookup(name))),
        TemplateKind::Jinja => engine.render_expression(text, &scope.context()),
    }
}
