//! Berth Engine - Jinja2 templating for Kubernetes charts
//!
//! Renders a chart's `templates/` directory against a values document with
//! MiniJinja plus a handful of Helm-style filters.

pub mod engine;
pub mod error;
pub mod filters;

pub use engine::{Engine, EngineBuilder, RenderResult};
pub use error::{EngineError, TemplateError, TemplateErrorKind};
