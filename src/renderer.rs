//! Template expansion with built-in context variables
//!
//! Templates are Jinja2-compatible (minijinja): `{{ value }}` interpolation,
//! `{% extends %}` / `{% include %}` layering across the store, and HTML
//! autoescaping of interpolated values.

use chrono::{DateTime, Local};
use minijinja::Environment;
use serde_json::{Map, Value};

use crate::store::{TemplateStore, MARKUP_EXT};
use crate::{DisplayConfig, Error, Result};

/// Expands named templates from a store into final markup
///
/// The display configuration is injected at construction; the clock is read
/// fresh on every [`render`](Self::render) call. The effective context is
/// built as `configured defaults < caller data < built-ins`, so built-in
/// variables always win on key collision.
///
/// Built-ins available to every template:
///
/// - `display`: width, height and `colors.<name>` palette entries
/// - `current_time`: 24-hour `HH:MM`
/// - `current_date`: `YYYY-MM-DD`
/// - `day_of_week`: full weekday name
pub struct TemplateRenderer {
    env: Environment<'static>,
    display: DisplayConfig,
}

impl TemplateRenderer {
    /// Create a renderer reading templates through `store`.
    pub fn new(store: &TemplateStore, display: DisplayConfig) -> Self {
        let mut env = Environment::new();

        // All filesystem access goes through the store so its name rules
        // apply to {% extends %} / {% include %} targets too.
        let loader_store = store.clone();
        env.set_loader(move |file| {
            let Some(name) = file.strip_suffix(&format!(".{}", MARKUP_EXT)) else {
                return Ok(None);
            };
            match loader_store.source(name) {
                Ok(source) => Ok(Some(source)),
                Err(Error::TemplateNotFound(_)) => Ok(None),
                Err(e) => Err(minijinja::Error::new(
                    minijinja::ErrorKind::InvalidOperation,
                    e.to_string(),
                )),
            }
        });

        Self { env, display }
    }

    /// Render `name` with `data`, reading the clock from the system.
    pub fn render(&self, name: &str, data: &Map<String, Value>) -> Result<String> {
        self.render_at(name, data, Local::now())
    }

    /// Render `name` with `data` at an explicit clock instant.
    pub fn render_at(
        &self,
        name: &str,
        data: &Map<String, Value>,
        now: DateTime<Local>,
    ) -> Result<String> {
        let file = format!("{}.{}", name, MARKUP_EXT);
        let template = self.env.get_template(&file).map_err(|e| {
            if matches!(e.kind(), minijinja::ErrorKind::TemplateNotFound) {
                Error::TemplateNotFound(name.to_string())
            } else {
                Error::TemplateRender(e.to_string())
            }
        })?;

        let context = self.context(data, now)?;
        template
            .render(minijinja::Value::from_serialize(&context))
            .map_err(|e| Error::TemplateRender(e.to_string()))
    }

    // Built-ins are inserted last so they overwrite colliding caller keys.
    fn context(&self, data: &Map<String, Value>, now: DateTime<Local>) -> Result<Map<String, Value>> {
        let mut context = data.clone();
        context.insert(
            "display".to_string(),
            serde_json::to_value(&self.display)
                .map_err(|e| Error::TemplateRender(format!("Invalid display config: {}", e)))?,
        );
        context.insert(
            "current_time".to_string(),
            Value::String(now.format("%H:%M").to_string()),
        );
        context.insert(
            "current_date".to_string(),
            Value::String(now.format("%Y-%m-%d").to_string()),
        );
        context.insert(
            "day_of_week".to_string(),
            Value::String(now.format("%A").to_string()),
        );
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::fs;

    fn renderer_with(files: &[(&str, &str)]) -> (tempfile::TempDir, TemplateRenderer) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        let store = TemplateStore::new(dir.path());
        let renderer = TemplateRenderer::new(&store, DisplayConfig::default());
        (dir, renderer)
    }

    fn data(value: serde_json::Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    // Monday, 2024-01-15 09:05 local time
    fn frozen_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 15, 9, 5, 0).unwrap()
    }

    #[test]
    fn test_builtin_variables() {
        let (_dir, renderer) = renderer_with(&[(
            "clock.html",
            "{{ current_time }}|{{ current_date }}|{{ day_of_week }}",
        )]);

        let markup = renderer
            .render_at("clock", &Map::new(), frozen_now())
            .unwrap();
        assert_eq!(markup, "09:05|2024-01-15|Monday");
    }

    #[test]
    fn test_display_config_in_context() {
        let (_dir, renderer) = renderer_with(&[(
            "size.html",
            "{{ display.width }}x{{ display.height }} {{ display.colors.red }}",
        )]);

        let markup = renderer.render("size", &Map::new()).unwrap();
        assert_eq!(markup, "800x480 #ff0000");
    }

    #[test]
    fn test_caller_data_interpolation() {
        let (_dir, renderer) = renderer_with(&[("weather.html", "{{ temperature }}°")]);

        let markup = renderer
            .render("weather", &data(json!({"temperature": "72"})))
            .unwrap();
        assert_eq!(markup, "72°");
    }

    #[test]
    fn test_builtins_win_over_caller_data() {
        let (_dir, renderer) = renderer_with(&[("clock.html", "{{ current_time }}")]);

        let markup = renderer
            .render_at(
                "clock",
                &data(json!({"current_time": "bogus"})),
                frozen_now(),
            )
            .unwrap();
        assert_eq!(markup, "09:05");
    }

    #[test]
    fn test_html_values_are_escaped() {
        let (_dir, renderer) = renderer_with(&[("weather.html", "<p>{{ condition }}</p>")]);

        let markup = renderer
            .render(
                "weather",
                &data(json!({"condition": "<script>alert(1)</script>"})),
            )
            .unwrap();
        assert!(!markup.contains("<script>"));
        assert!(markup.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_template_inheritance() {
        let (_dir, renderer) = renderer_with(&[
            (
                "base.html",
                "<html>{% block content %}base{% endblock %}</html>",
            ),
            (
                "weather.html",
                "{% extends \"base.html\" %}{% block content %}{{ temperature }}{% endblock %}",
            ),
        ]);

        let markup = renderer
            .render("weather", &data(json!({"temperature": "72"})))
            .unwrap();
        assert_eq!(markup, "<html>72</html>");
    }

    #[test]
    fn test_include_from_subdirectory() {
        let (_dir, renderer) = renderer_with(&[
            ("dashboard.html", "{% include \"partials/clock.html\" %}"),
            ("partials/clock.html", "{{ current_time }}"),
        ]);

        let markup = renderer
            .render_at("dashboard", &Map::new(), frozen_now())
            .unwrap();
        assert_eq!(markup, "09:05");
    }

    #[test]
    fn test_missing_template() {
        let (_dir, renderer) = renderer_with(&[]);

        match renderer.render("missing", &Map::new()) {
            Err(Error::TemplateNotFound(name)) => assert_eq!(name, "missing"),
            other => panic!("Expected TemplateNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_undefined_nested_field_fails() {
        let (_dir, renderer) = renderer_with(&[("broken.html", "{{ user.name }}")]);

        assert!(matches!(
            renderer.render("broken", &Map::new()),
            Err(Error::TemplateRender(_))
        ));
    }

    #[test]
    fn test_syntax_error_fails() {
        let (_dir, renderer) = renderer_with(&[("broken.html", "{% block content %}")]);

        assert!(matches!(
            renderer.render("broken", &Map::new()),
            Err(Error::TemplateRender(_))
        ));
    }
}
