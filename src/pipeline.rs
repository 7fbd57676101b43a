//! End-to-end render pipeline: template name + data -> PNG-sized bitmap
//!
//! One invocation walks Store -> Renderer -> Rasterizer, owning exactly two
//! temporary files (markup in, screenshot out) whose removal is guaranteed
//! by scope on every exit path. The pipeline is stateless per request and
//! safe to share across threads behind an `Arc`.

use std::io::Write;

use chrono::{DateTime, Local};
use log::{info, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use crate::rasterizer::Rasterizer;
use crate::renderer::TemplateRenderer;
use crate::store::{TemplateEntry, TemplateStore};
use crate::{Bitmap, DisplayConfig, Error, Result};

/// Readiness report for the service
///
/// Shape matches the delivery layer's health payload: browser version (or
/// "Not available"), template directory, and enumerable template names.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: String,
    pub timestamp: String,
    pub display_size: String,
    pub browser: String,
    pub templates_dir: String,
    pub templates_available: Vec<String>,
}

impl Health {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// The end-to-end sequence from template name + data to an image artifact
pub struct RenderPipeline {
    store: TemplateStore,
    renderer: TemplateRenderer,
    rasterizer: Box<dyn Rasterizer>,
    display: DisplayConfig,
}

impl RenderPipeline {
    pub fn new(
        store: TemplateStore,
        display: DisplayConfig,
        rasterizer: Box<dyn Rasterizer>,
    ) -> Self {
        let renderer = TemplateRenderer::new(&store, display.clone());
        Self {
            store,
            renderer,
            rasterizer,
            display,
        }
    }

    pub fn display(&self) -> &DisplayConfig {
        &self.display
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    /// Render `name` with `data` into a bitmap of the display's dimensions.
    ///
    /// Sidecar defaults are merged beneath `data`, markup is expanded with
    /// built-ins from the current clock, written to a temp file and
    /// rasterized via its `file://` URL. Any stage's failure short-circuits
    /// the rest; cleanup still runs. No partial image is ever returned.
    pub fn render(&self, name: &str, data: &Map<String, Value>) -> Result<Bitmap> {
        self.render_at(name, data, Local::now())
    }

    /// Render with an explicit clock instant (used by tests to freeze the
    /// built-in time variables).
    pub fn render_at(
        &self,
        name: &str,
        data: &Map<String, Value>,
        now: DateTime<Local>,
    ) -> Result<Bitmap> {
        let merged = self.merge_defaults(name, data);

        // Nothing is written to disk until the markup has expanded, so a
        // missing template performs no filesystem writes.
        let markup = self.renderer.render_at(name, &merged, now)?;

        let markup_path = write_markup_tempfile(&markup)?;
        let target = Url::from_file_path(&markup_path).map_err(|_| {
            Error::TempFile(format!(
                "Markup path is not absolute: {}",
                markup_path.display()
            ))
        })?;

        let bitmap =
            self.rasterizer
                .capture(target.as_str(), self.display.width, self.display.height)?;

        info!("Rendered {} at {}x{}", name, bitmap.width, bitmap.height);
        Ok(bitmap)
        // markup_path dropped here and on every early return above,
        // removing the temp file
    }

    /// Enumerate available templates.
    pub fn list_templates(&self) -> Result<Vec<TemplateEntry>> {
        self.store.list()
    }

    /// Probe the external browser and the template directory.
    ///
    /// Never fails: problems are folded into the report's status field.
    pub fn health(&self) -> Health {
        let browser = match self.rasterizer.version() {
            Ok(version) => Some(version),
            Err(e) => {
                warn!("Browser probe failed: {}", e);
                None
            }
        };
        let templates = match self.store.list() {
            Ok(entries) => Some(entries.into_iter().map(|e| e.name).collect::<Vec<_>>()),
            Err(e) => {
                warn!("Template listing failed: {}", e);
                None
            }
        };

        let status = if browser.is_some() && templates.is_some() {
            "ok"
        } else {
            "error"
        };
        Health {
            status: status.to_string(),
            timestamp: Local::now().to_rfc3339(),
            display_size: format!("{}x{}", self.display.width, self.display.height),
            browser: browser.unwrap_or_else(|| "Not available".to_string()),
            templates_dir: self.store.dir().display().to_string(),
            templates_available: templates.unwrap_or_default(),
        }
    }

    // Caller data wins over sidecar defaults on key collision.
    fn merge_defaults(&self, name: &str, data: &Map<String, Value>) -> Map<String, Value> {
        let mut merged = self.store.config(name).defaults;
        for (key, value) in data {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// Write markup to a uniquely-named temp `.html` file.
///
/// The returned `TempPath` deletes the file when dropped, which is what
/// guarantees the cleanup invariant for the pipeline's input side.
fn write_markup_tempfile(markup: &str) -> Result<tempfile::TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix("inkpanel-page-")
        .suffix(".html")
        .tempfile()
        .map_err(|e| Error::TempFile(format!("Failed to create markup file: {}", e)))?;

    file.write_all(markup.as_bytes())
        .map_err(|e| Error::TempFile(format!("Failed to write markup file: {}", e)))?;
    file.flush()
        .map_err(|e| Error::TempFile(format!("Failed to write markup file: {}", e)))?;

    Ok(file.into_temp_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_tempfile_round_trip() {
        let path = write_markup_tempfile("<html>panel</html>").unwrap();
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, "<html>panel</html>");

        let owned = path.to_path_buf();
        drop(path);
        assert!(!owned.exists());
    }
}
