use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde_json::{Map, Value};

use inkpanel::rasterizer::{ChromiumRasterizer, DEFAULT_BROWSER, DEFAULT_TIMEOUT_MS};
use inkpanel::store::TemplateStore;
use inkpanel::{DisplayConfig, RenderPipeline};

#[derive(Parser)]
#[command(
    name = "inkpanel",
    version,
    about = "Renders HTML templates to fixed-size PNG panels for e-paper displays"
)]
struct Cli {
    /// Directory of <name>.html templates and optional <name>.json configs
    #[arg(long, default_value = "templates", global = true)]
    templates_dir: PathBuf,

    /// Headless browser binary used for rasterization
    #[arg(long, default_value = DEFAULT_BROWSER, global = true)]
    browser: String,

    /// Wall-clock budget for one browser invocation, in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS, global = true)]
    timeout_ms: u64,

    /// Target panel width in pixels
    #[arg(long, global = true)]
    width: Option<u32>,

    /// Target panel height in pixels
    #[arg(long, global = true)]
    height: Option<u32>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the HTTP render service
    Serve {
        /// Listen address
        #[arg(long, default_value = "0.0.0.0:3001")]
        addr: String,
    },
    /// Render one template to a PNG file
    Render {
        /// Template name (without the .html extension)
        template: String,

        /// Template data as a JSON object
        #[arg(long)]
        data: Option<String>,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List available templates
    List,
    /// Check browser and template directory readiness
    Health,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut display = DisplayConfig::default();
    if let Some(width) = cli.width {
        display.width = width;
    }
    if let Some(height) = cli.height {
        display.height = height;
    }
    if display.width == 0 || display.height == 0 {
        return Err("Display dimensions must be positive".into());
    }

    let store = TemplateStore::new(&cli.templates_dir);
    let rasterizer = ChromiumRasterizer::new(&cli.browser, cli.timeout_ms);
    let pipeline = RenderPipeline::new(store, display, Box::new(rasterizer));

    match cli.command {
        Cmd::Serve { addr } => {
            let display = pipeline.display();
            info!("Starting render service");
            info!("Display size: {}x{}", display.width, display.height);
            info!("Templates directory: {}", cli.templates_dir.display());

            let health = pipeline.health();
            if health.browser == "Not available" {
                warn!("Browser not available: install {} first", cli.browser);
            } else {
                info!("Browser ready: {}", health.browser);
            }
            info!(
                "Found {} templates: {:?}",
                health.templates_available.len(),
                health.templates_available
            );

            inkpanel::server::serve(Arc::new(pipeline), &addr)?;
            Ok(())
        }
        Cmd::Render {
            template,
            data,
            output,
        } => {
            let data = parse_data_arg(data.as_deref())?;
            let image = pipeline.render(&template, &data)?;
            fs::write(&output, image.to_png()?)
                .map_err(|e| format!("Failed to write {}: {}", output.display(), e))?;
            info!("Wrote {}", output.display());
            Ok(())
        }
        Cmd::List => {
            let templates = pipeline.list_templates()?;
            println!("{}", serde_json::to_string_pretty(&templates)?);
            Ok(())
        }
        Cmd::Health => {
            let health = pipeline.health();
            println!("{}", serde_json::to_string_pretty(&health)?);
            if health.is_ok() {
                Ok(())
            } else {
                Err("Service is not ready".into())
            }
        }
    }
}

fn parse_data_arg(data: Option<&str>) -> Result<Map<String, Value>, Box<dyn std::error::Error>> {
    let Some(raw) = data else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err("--data must be a JSON object".into()),
    }
}
