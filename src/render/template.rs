//! Template step for served files.
//!
//! The engine itself is a collaborator supplied at registration; the
//! placeholder engine here covers request metadata only.

use crate::handler::RequestContext;

pub trait TemplateEngine: Send + Sync {
    /// Render `source`, loaded from the file `name`, for one request.
    fn render(&self, name: &str, source: &str, context: &RequestContext) -> Result<String, String>;
}

/// Substitutes `{{request.method}}`, `{{request.path}}`, `{{request.id}}`
/// and `{{principal.subject}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderTemplates;

impl TemplateEngine for PlaceholderTemplates {
    fn render(&self, _name: &str, source: &str, context: &RequestContext) -> Result<String, String> {
        let subject = context
            .principal
            .as_ref()
            .map(|p| p.subject.as_str())
            .unwrap_or("");
        Ok(source
            .replace("{{request.method}}", context.method.as_str())
            .replace("{{request.path}}", &context.path)
            .replace("{{request.id}}", context.request_id.as_deref().unwrap_or(""))
            .replace("{{principal.subject}}", subject))
    }
}
