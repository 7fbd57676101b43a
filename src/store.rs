//! Filesystem-backed template store
//!
//! A store is a directory of `<name>.html` markup files. Each template may
//! carry a `<name>.json` sidecar whose `defaults` mapping is merged beneath
//! caller data at render time. Templates are discovered per request; nothing
//! is cached.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Extension of template markup files
pub const MARKUP_EXT: &str = "html";

/// Extension of sidecar configuration files
pub const CONFIG_EXT: &str = "json";

/// Sidecar configuration for one template
///
/// Only `defaults` is interpreted; any other keys are carried through so the
/// listing surface can expose them unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Default context values, merged beneath caller-supplied data
    #[serde(default)]
    pub defaults: Map<String, Value>,

    /// Unrecognized sidecar keys, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of the template listing
#[derive(Debug, Clone, Serialize)]
pub struct TemplateEntry {
    pub name: String,
    pub file: String,
    pub config: TemplateConfig,
    pub has_config: bool,
}

/// A directory of templates and their optional sidecar configs
///
/// The store is the single filesystem authority: the renderer's template
/// loader reads through [`TemplateStore::source`], and the listing and
/// health surfaces enumerate through [`TemplateStore::list`].
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `name` is an acceptable template name.
    ///
    /// Names are one or more `/`-separated segments of ASCII alphanumerics,
    /// `-` and `_`. Anything else (empty segments, `..`, absolute paths,
    /// other characters) is rejected so a request can never escape the
    /// store directory.
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name.split('/').all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            })
    }

    /// Path of the markup file for `name`, or `None` for invalid names.
    pub fn template_path(&self, name: &str) -> Option<PathBuf> {
        Self::is_valid_name(name).then(|| self.dir.join(format!("{}.{}", name, MARKUP_EXT)))
    }

    /// Path of the sidecar config for `name`, or `None` for invalid names.
    pub fn config_path(&self, name: &str) -> Option<PathBuf> {
        Self::is_valid_name(name).then(|| self.dir.join(format!("{}.{}", name, CONFIG_EXT)))
    }

    /// Whether a markup file exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.template_path(name).is_some_and(|p| p.is_file())
    }

    /// Markup source for `name`.
    pub fn source(&self, name: &str) -> Result<String> {
        let path = self
            .template_path(name)
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))?;

        fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::TemplateNotFound(name.to_string()),
            _ => Error::Store(format!("Failed to read {}: {}", path.display(), e)),
        })
    }

    /// Sidecar configuration for `name`.
    ///
    /// A missing sidecar yields empty defaults. A sidecar that exists but
    /// does not parse is a recoverable condition: it is logged and treated
    /// as empty, never surfaced as a failure.
    pub fn config(&self, name: &str) -> TemplateConfig {
        let path = match self.config_path(name) {
            Some(p) if p.is_file() => p,
            _ => return TemplateConfig::default(),
        };

        match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Failed to load config for {}: {}", name, e);
                    TemplateConfig::default()
                }
            },
            Err(e) => {
                warn!("Failed to load config for {}: {}", name, e);
                TemplateConfig::default()
            }
        }
    }

    /// Enumerate the templates in the store (top level, sorted by name).
    pub fn list(&self) -> Result<Vec<TemplateEntry>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            Error::Store(format!("Failed to read {}: {}", self.dir.display(), e))
        })?;

        let mut templates = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| Error::Store(format!("Failed to scan store: {}", e)))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(MARKUP_EXT) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !Self::is_valid_name(name) {
                continue;
            }

            templates.push(TemplateEntry {
                name: name.to_string(),
                file: format!("{}.{}", name, MARKUP_EXT),
                config: self.config(name),
                has_config: self.config_path(name).is_some_and(|p| p.is_file()),
            });
        }

        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }
}
