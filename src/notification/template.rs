//! This module provides a service for rendering templates using the minijinja
//! templating engine.

use minijinja::Environment;
use thiserror::Error;

/// A service for rendering templates using the minijinja templating engine.
pub struct TemplateService {
    env: Environment<'static>,
}

/// Error type for the TemplateService.
#[derive(Debug, Error)]
pub enum TemplateServiceError {
    /// The template is malformed or references a missing variable.
    #[error("Failed to render template: {0}")]
    RenderError(#[from] minijinja::Error),
}

impl Default for TemplateService {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateService").finish_non_exhaustive()
    }
}

impl TemplateService {
    /// Creates a new instance of `TemplateService`. Undefined variables are
    /// errors rather than empty strings.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);

        Self { env }
    }

    /// Renders a template with the given context.
    pub fn render(
        &self,
        template_str: &str,
        context: serde_json::Value,
    ) -> Result<String, TemplateServiceError> {
        tracing::trace!(template = template_str, context = %context, "Rendering template with context.");

        self.env.render_str(template_str, context).map_err(|e| {
            tracing::warn!(template = template_str, error = %e, "Failed to render template.");
            TemplateServiceError::RenderError(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_render_template_with_context() {
        let service = TemplateService::new();
        let template = "{{ target.name }} at {{ target.url }}";
        let context = json!({ "target": { "name": "Slots", "url": "https://example.com/" } });

        let result = service.render(template, context).unwrap();

        assert_eq!(result, "Slots at https://example.com/");
    }

    #[test]
    fn test_render_template_iterates_fields() {
        let service = TemplateService::new();
        let template = "{% for name, value in fields|items %}{{ name }}={{ value }};{% endfor %}";
        let context = json!({ "fields": { "date": "2024-05-01", "time": "10:00" } });

        let result = service.render(template, context).unwrap();

        assert_eq!(result, "date=2024-05-01;time=10:00;");
    }

    #[test]
    fn test_render_template_with_invalid_template() {
        let service = TemplateService::new();
        let result = service.render("Hello, {{ name }", json!({ "name": "World" }));
        assert!(matches!(result, Err(TemplateServiceError::RenderError(_))));
    }

    #[test]
    fn test_render_template_with_undefined_variable() {
        let service = TemplateService::new();
        let result = service.render("Hello, {{ missing }}", json!({}));
        assert!(result.is_err());
    }
}
