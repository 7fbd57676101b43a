//! Inkpanel
//!
//! Renders named HTML templates, populated with caller-supplied data and a
//! set of built-in variables (current time/date/weekday plus the display
//! configuration), into PNG bitmaps sized exactly for a fixed-dimension
//! e-paper display. Layout and pixel work are fully delegated: template
//! expansion to minijinja, rasterization to an external headless Chromium
//! process invoked once per render.
//!
//! The crate is a thin orchestration layer over four parts:
//!
//! - [`store::TemplateStore`]: a directory of `<name>.html` templates with
//!   optional `<name>.json` default-value sidecars
//! - [`renderer::TemplateRenderer`]: markup expansion with built-in context
//! - [`rasterizer::ChromiumRasterizer`]: one browser process per screenshot
//! - [`pipeline::RenderPipeline`]: the end-to-end sequence plus health probe
//!
//! # Example
//!
//! ```no_run
//! use inkpanel::pipeline::RenderPipeline;
//! use inkpanel::rasterizer::ChromiumRasterizer;
//! use inkpanel::store::TemplateStore;
//! use inkpanel::DisplayConfig;
//!
//! # fn main() -> Result<(), inkpanel::Error> {
//! let store = TemplateStore::new("templates");
//! let rasterizer = ChromiumRasterizer::new("chromium-headless-shell", 5_000);
//! let pipeline = RenderPipeline::new(store, DisplayConfig::default(), Box::new(rasterizer));
//!
//! let image = pipeline.render("weather", &serde_json::Map::new())?;
//! std::fs::write("weather.png", image.to_png()?).ok();
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

// Template directory and sidecar configs
pub mod store;

// Markup expansion (minijinja environment + built-in variables)
pub mod renderer;

// External browser invocation
pub mod rasterizer;

// The end-to-end sequence plus the health probe
pub mod pipeline;

// Thin HTTP delivery surface over the pipeline
pub mod server;

// Re-export the pipeline type at the crate root for ergonomic use
pub use pipeline::RenderPipeline;

/// Named color palette of the destination panel
///
/// Values are CSS hex codes, exposed to templates as
/// `display.colors.<name>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayColors {
    pub black: String,
    pub white: String,
    pub red: String,
    pub yellow: String,
    pub blue: String,
    pub green: String,
    pub orange: String,
}

impl Default for DisplayColors {
    fn default() -> Self {
        Self {
            black: "#000000".to_string(),
            white: "#ffffff".to_string(),
            red: "#ff0000".to_string(),
            yellow: "#ffff00".to_string(),
            blue: "#0000ff".to_string(),
            green: "#00ff00".to_string(),
            orange: "#ff8000".to_string(),
        }
    }
}

/// Target panel geometry and palette
///
/// Injected into the renderer (as the `display` template variable) and into
/// the rasterizer (as the viewport size) at construction time; there is no
/// ambient global configuration. Width and height must be positive.
///
/// # Examples
///
/// ```
/// let display = inkpanel::DisplayConfig::default();
/// assert_eq!(display.width, 800);
/// assert_eq!(display.height, 480);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Target image width in pixels
    pub width: u32,
    /// Target image height in pixels
    pub height: u32,
    /// Fixed color palette of the panel
    pub colors: DisplayColors,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
            colors: DisplayColors::default(),
        }
    }
}

/// A decoded single-frame bitmap (RGBA, 8 bits per channel)
///
/// Produced by the rasterizer from the browser's screenshot and handed to
/// the delivery layer, which re-encodes it with [`Bitmap::to_png`].
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    /// Pixel data, `width * height * 4` bytes, row-major RGBA
    pub data: Vec<u8>,
}

impl Bitmap {
    /// Decode a PNG file into a bitmap.
    pub fn from_png_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::Rasterization(format!("Failed to open screenshot: {}", e)))?;
        Self::from_png(file)
    }

    /// Decode PNG data from a reader into a bitmap.
    ///
    /// Grayscale and RGB inputs are normalized to RGBA so callers always see
    /// one pixel layout regardless of what the browser wrote.
    pub fn from_png(reader: impl Read) -> Result<Self> {
        let mut decoder = png::Decoder::new(reader);
        decoder.set_transformations(png::Transformations::normalize_to_color8());

        let mut reader = decoder
            .read_info()
            .map_err(|e| Error::Rasterization(format!("Invalid PNG: {}", e)))?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| Error::Rasterization(format!("Failed to decode PNG: {}", e)))?;
        let bytes = &buf[..info.buffer_size()];

        let data = match info.color_type {
            png::ColorType::Rgba => bytes.to_vec(),
            png::ColorType::Rgb => bytes
                .chunks_exact(3)
                .flat_map(|px| [px[0], px[1], px[2], 255])
                .collect(),
            png::ColorType::GrayscaleAlpha => bytes
                .chunks_exact(2)
                .flat_map(|px| [px[0], px[0], px[0], px[1]])
                .collect(),
            png::ColorType::Grayscale => bytes.iter().flat_map(|&g| [g, g, g, 255]).collect(),
            other => {
                return Err(Error::Rasterization(format!(
                    "Unsupported PNG color type: {:?}",
                    other
                )))
            }
        };

        Ok(Self {
            width: info.width,
            height: info.height,
            data,
        })
    }

    /// Encode the bitmap as a PNG byte stream.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| Error::Rasterization(format!("Failed to encode PNG: {}", e)))?;
        writer
            .write_image_data(&self.data)
            .map_err(|e| Error::Rasterization(format!("Failed to encode PNG: {}", e)))?;
        writer
            .finish()
            .map_err(|e| Error::Rasterization(format!("Failed to encode PNG: {}", e)))?;
        Ok(out)
    }
}
