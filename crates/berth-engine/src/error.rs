//! Engine error types

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error("Template error")]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error("Chart error: {0}")]
    Chart(#[from] berth_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error kind for categorizing template errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    SyntaxError,
    TypeError,
    InvalidOperation,
    Other,
}

impl TemplateErrorKind {
    fn from_minijinja(kind: minijinja::ErrorKind) -> Self {
        match kind {
            minijinja::ErrorKind::UndefinedError => Self::UndefinedVariable,
            minijinja::ErrorKind::UnknownFilter => Self::UnknownFilter,
            minijinja::ErrorKind::SyntaxError => Self::SyntaxError,
            minijinja::ErrorKind::InvalidOperation => Self::InvalidOperation,
            minijinja::ErrorKind::NonPrimitive | minijinja::ErrorKind::NonKey => Self::TypeError,
            _ => Self::Other,
        }
    }
}

/// Template-specific error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(berth::template::render))]
pub struct TemplateError {
    /// Error message
    pub message: String,

    /// Error kind for categorization
    pub kind: TemplateErrorKind,

    /// Template source code
    #[source_code]
    pub src: NamedSource<String>,

    /// Error location in source
    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    /// Suggestion for fixing the error
    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Create a new template error from a MiniJinja error
    pub fn from_minijinja(err: minijinja::Error, template_name: &str, template_source: &str) -> Self {
        let kind = TemplateErrorKind::from_minijinja(err.kind());
        let span = err
            .line()
            .and_then(|line_num| calculate_span(template_source, line_num));

        let message = match err.detail() {
            Some(detail) => format!("{}: {}", template_name, detail),
            None => format!("{}: {}", template_name, err),
        };

        let suggestion = match kind {
            TemplateErrorKind::UndefinedVariable => Some(
                "Check the key exists in values.yaml, or use `| default(...)`".to_string(),
            ),
            TemplateErrorKind::UnknownFilter => Some(
                "Available filters: toyaml, tojson, b64encode, quote, nindent, indent, required"
                    .to_string(),
            ),
            TemplateErrorKind::SyntaxError => Some(
                "Check bracket matching: `{{ }}` for expressions, `{% %}` for statements"
                    .to_string(),
            ),
            _ => None,
        };

        Self {
            message,
            kind,
            src: NamedSource::new(template_name, template_source.to_string()),
            span,
            suggestion,
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

/// Calculate the source span for a given line number
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;

    for (current_line, line) in source.lines().enumerate() {
        if current_line + 1 == line_num {
            return Some(SourceSpan::new(offset.into(), line.len()));
        }
        offset += line.len() + 1;
    }

    None
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_span() {
        let source = "a: 1\nbb: 2\nccc: 3";
        let span = calculate_span(source, 2).unwrap();
        assert_eq!(span.offset(), 5);
        assert_eq!(span.len(), 5);
        assert!(calculate_span(source, 9).is_none());
    }

    #[test]
    fn test_from_minijinja_undefined() {
        let mut env = minijinja::Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        env.add_template("t.yaml", "a: 1\nb: {{ missing.key }}").unwrap();
        let err = env
            .get_template("t.yaml")
            .unwrap()
            .render(minijinja::context! {})
            .unwrap_err();

        let tmpl_err = TemplateError::from_minijinja(err, "t.yaml", "a: 1\nb: {{ missing.key }}");
        assert_eq!(tmpl_err.kind(), TemplateErrorKind::UndefinedVariable);
        assert!(tmpl_err.message.starts_with("t.yaml"));
        assert_eq!(tmpl_err.span.map(|s| s.offset()), Some(5));
        assert!(tmpl_err.suggestion.is_some());
    }
}
