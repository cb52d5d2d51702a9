//! Template engine based on MiniJinja

use berth_core::{LoadedChart, TemplateContext};
use minijinja::Environment;
use std::collections::BTreeMap;

use crate::error::{Result, TemplateError};
use crate::filters;

/// Result of rendering a chart
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderResult {
    /// Rendered manifests by template file name, in file order
    pub manifests: BTreeMap<String, String>,

    /// Post-install notes (if NOTES.txt exists)
    pub notes: Option<String>,
}

/// Template engine builder
pub struct EngineBuilder {
    strict_mode: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self { strict_mode: true }
    }

    /// Set strict mode (fail on undefined variables)
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// Build the engine
    pub fn build(self) -> Engine {
        Engine::new(self.strict_mode)
    }
}

/// The template engine
#[derive(Debug, Clone)]
pub struct Engine {
    strict_mode: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Engine {
    /// Create a new engine
    pub fn new(strict_mode: bool) -> Self {
        Self { strict_mode }
    }

    /// Create a builder
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    fn create_environment(&self) -> Environment<'static> {
        let mut env = Environment::new();

        if self.strict_mode {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        } else {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Lenient);
        }

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("quote", filters::quote);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("indent", filters::indent);
        env.add_filter("required", filters::required);

        env
    }

    #[cfg(test)]
    fn render_string(
        &self,
        template: &str,
        context: &TemplateContext,
        template_name: &str,
    ) -> Result<String> {
        let mut env = self.create_environment();
        env.add_template_owned(template_name.to_string(), template.to_string())
            .map_err(|e| TemplateError::from_minijinja(e, template_name, template))?;

        let tmpl = env
            .get_template(template_name)
            .map_err(|e| TemplateError::from_minijinja(e, template_name, template))?;

        Ok(tmpl
            .render(context_value(context))
            .map_err(|e| TemplateError::from_minijinja(e, template_name, template))?)
    }

    /// Render all templates in a chart
    ///
    /// Files whose name starts with `_` are loaded as helpers but not emitted.
    /// Templates that render to nothing are dropped.
    pub fn render_chart(&self, chart: &LoadedChart, context: &TemplateContext) -> Result<RenderResult> {
        let template_files = chart.template_files()?;

        let mut env = self.create_environment();
        let mut sources = BTreeMap::new();

        for file_path in &template_files {
            let rel_path = file_path
                .strip_prefix(&chart.templates_dir)
                .unwrap_or(file_path);
            let template_name = rel_path.to_string_lossy().replace('\\', "/");
            let content = std::fs::read_to_string(file_path)?;

            env.add_template_owned(template_name.clone(), content.clone())
                .map_err(|e| TemplateError::from_minijinja(e, &template_name, &content))?;
            sources.insert(template_name, content);
        }

        let ctx = context_value(context);
        let mut result = RenderResult::default();

        for (template_name, content) in &sources {
            let file_name = template_name.rsplit('/').next().unwrap_or(template_name);
            if file_name.starts_with('_') {
                continue;
            }

            let tmpl = env
                .get_template(template_name)
                .map_err(|e| TemplateError::from_minijinja(e, template_name, content))?;
            let rendered = tmpl
                .render(&ctx)
                .map_err(|e| TemplateError::from_minijinja(e, template_name, content))?;

            if file_name.eq_ignore_ascii_case("NOTES.txt") {
                result.notes = Some(rendered);
                continue;
            }

            let trimmed = rendered.trim();
            if trimmed.is_empty() || trimmed == "---" {
                tracing::debug!(template = %template_name, "template rendered empty, skipping");
                continue;
            }

            let output_name = template_name
                .trim_end_matches(".j2")
                .trim_end_matches(".jinja2");
            result.manifests.insert(output_name.to_string(), rendered);
        }

        tracing::debug!(
            chart = %chart.metadata.name,
            manifests = result.manifests.len(),
            "rendered chart"
        );

        Ok(result)
    }
}

fn context_value(context: &TemplateContext) -> minijinja::Value {
    minijinja::context! {
        values => &context.values,
        release => &context.release,
        chart => &context.chart,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, TemplateErrorKind};
    use berth_core::{ChartMetadata, ReleaseInfo, Values};
    use semver::Version;
    use std::fs;
    use tempfile::TempDir;

    fn chart_metadata() -> ChartMetadata {
        ChartMetadata {
            name: "api".to_string(),
            version: Version::new(1, 0, 0),
            description: None,
            app_version: Some("2.0.0".to_string()),
        }
    }

    fn create_test_context() -> TemplateContext {
        let values = Values::from_yaml(
            r#"
image:
  repository: nginx
  tag: "1.25"
body:
  name: chart-api125
count: 3
"#,
        )
        .unwrap();

        TemplateContext::new(values, ReleaseInfo::for_install("chart-api125", "games"), &chart_metadata())
    }

    fn create_chart(dir: &std::path::Path) -> LoadedChart {
        fs::write(dir.join("Chart.yaml"), "apiVersion: v2\nname: api\nversion: 1.0.0\n").unwrap();
        fs::write(dir.join("values.yaml"), "image:\n  repository: nginx\n").unwrap();
        let templates = dir.join("templates");
        fs::create_dir(&templates).unwrap();
        fs::write(
            templates.join("_helpers.tpl"),
            "{% macro fullname(name) %}{{ name }}-svc{% endmacro %}",
        )
        .unwrap();
        fs::write(
            templates.join("deployment.yaml"),
            r#"{% from "_helpers.tpl" import fullname %}apiVersion: apps/v1
kind: Deployment
metadata:
  name: {{ fullname(values.body.name) }}
  namespace: {{ release.namespace }}
spec:
  replicas: {{ values.count }}
  template:
    spec:
      containers:
        - image: {{ values.image.repository }}:{{ values.image.tag }}
"#,
        )
        .unwrap();
        fs::write(templates.join("empty.yaml"), "{% if false %}x: 1{% endif %}").unwrap();
        fs::write(templates.join("NOTES.txt"), "Installed {{ release.name }}").unwrap();
        LoadedChart::load(dir).unwrap()
    }

    #[test]
    fn test_render_simple() {
        let engine = Engine::default();
        let ctx = create_test_context();

        let result = engine
            .render_string("replicas: {{ values.count }}", &ctx, "test.yaml")
            .unwrap();
        assert_eq!(result, "replicas: 3");
    }

    #[test]
    fn test_render_with_filters() {
        let engine = Engine::default();
        let ctx = create_test_context();

        let template = r#"image: {{ values.image | toyaml | nindent(2) }}"#;
        let result = engine.render_string(template, &ctx, "test.yaml").unwrap();

        assert!(result.contains("  repository: nginx"));
        assert!(result.contains("tag:"));
    }

    #[test]
    fn test_render_chart_info() {
        let engine = Engine::default();
        let ctx = create_test_context();

        let result = engine
            .render_string("{{ chart.name }}-{{ chart.appVersion }}-{{ release.isInstall }}", &ctx, "t")
            .unwrap();
        assert_eq!(result, "api-2.0.0-true");
    }

    #[test]
    fn test_undefined_error() {
        let engine = Engine::default();
        let ctx = create_test_context();

        let result = engine.render_string("value: {{ values.undefined_key.x }}", &ctx, "test.yaml");
        assert!(matches!(
            result,
            Err(EngineError::Template(ref e)) if e.kind() == TemplateErrorKind::UndefinedVariable
        ));
    }

    #[test]
    fn test_render_chart() {
        let dir = TempDir::new().unwrap();
        let chart = create_chart(dir.path());
        let engine = Engine::default();

        let result = engine.render_chart(&chart, &create_test_context()).unwrap();

        assert_eq!(result.manifests.len(), 1);
        let deployment = &result.manifests["deployment.yaml"];
        assert!(deployment.contains("name: chart-api125-svc"));
        assert!(deployment.contains("namespace: games"));
        assert!(deployment.contains("image: nginx:1.25"));
        assert_eq!(result.notes.as_deref(), Some("Installed chart-api125"));
    }

    #[test]
    fn test_lenient_mode() {
        let engine = Engine::builder().strict(false).build();
        let ctx = create_test_context();

        let result = engine.render_string("v: {{ values.nope }}", &ctx, "t").unwrap();
        assert_eq!(result, "v: ");
    }
}
