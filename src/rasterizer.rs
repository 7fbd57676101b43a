//! Screenshot capture via an external headless browser process
//!
//! Each capture spawns one short-lived Chromium process, waits for it under
//! a wall-clock deadline, decodes the screenshot it wrote, and removes the
//! temp output file on every exit path. There is no pooling or process
//! reuse: every call pays full browser startup cost.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use log::{error, info};

use crate::{Bitmap, Error, Result};

/// Default browser binary invoked for screenshots
pub const DEFAULT_BROWSER: &str = "chromium-headless-shell";

/// Default wall-clock budget for one browser invocation, in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Poll interval while waiting on the child process
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Extra allowance past the browser's own `--timeout` before the child is
/// killed from our side
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Deadline for the `--version` readiness probe
const VERSION_DEADLINE: Duration = Duration::from_secs(5);

/// Converts a markup source, addressed by URL, into a pixel bitmap
///
/// This is the seam between the pipeline and the browser dependency:
/// implementations must be shareable across request threads, and tests
/// substitute a stub so nothing is spawned.
pub trait Rasterizer: Send + Sync {
    /// Capture a single screenshot of `url` at exactly `width` x `height`.
    fn capture(&self, url: &str, width: u32, height: u32) -> Result<Bitmap>;

    /// Report the browser version string (readiness probe).
    fn version(&self) -> Result<String>;
}

/// Rasterizer backed by a headless Chromium shell, one process per capture
pub struct ChromiumRasterizer {
    binary: String,
    timeout: Duration,
}

impl ChromiumRasterizer {
    pub fn new(binary: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            binary: binary.into(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

impl Default for ChromiumRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_BROWSER, DEFAULT_TIMEOUT_MS)
    }
}

impl Rasterizer for ChromiumRasterizer {
    fn capture(&self, url: &str, width: u32, height: u32) -> Result<Bitmap> {
        // Unique output path; the TempPath guard removes the file on every
        // exit path below, including timeouts and decode failures.
        let output_path = tempfile::Builder::new()
            .prefix("inkpanel-shot-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| Error::TempFile(format!("Failed to create screenshot file: {}", e)))?
            .into_temp_path();

        let mut command = Command::new(&self.binary);
        command
            .arg(url)
            .arg("--headless")
            .arg(format!("--screenshot={}", output_path.display()))
            .arg(format!("--window-size={},{}", width, height))
            .args([
                "--no-sandbox",
                "--disable-gpu",
                "--disable-software-rasterizer",
                "--disable-background-networking",
                "--disable-dev-shm-usage",
                "--hide-scrollbars",
                "--single-process",
                "--disable-extensions",
                "--disable-plugins",
                "--mute-audio",
                "--js-flags=--max_old_space_size=128",
            ])
            .arg(format!("--timeout={}", self.timeout.as_millis()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        info!("Taking screenshot for: {}", url);
        let child = command.spawn().map_err(|e| {
            Error::Rasterization(format!("Failed to launch {}: {}", self.binary, e))
        })?;

        // The browser gets the soft deadline via --timeout; the hard kill
        // fires a little later.
        let outcome = wait_with_deadline(child, self.timeout + KILL_GRACE)?;

        if !outcome.status.success() {
            error!("Failed to take screenshot:");
            error!("{}", outcome.stderr.trim_end());
            return Err(Error::Rasterization(format!(
                "Browser exited with {}",
                outcome.status
            )));
        }
        if !file_has_bytes(&output_path) {
            error!("Failed to take screenshot:");
            error!("{}", outcome.stderr.trim_end());
            return Err(Error::Rasterization(
                "Browser produced no output image".to_string(),
            ));
        }

        Bitmap::from_png_file(&output_path)
    }

    fn version(&self) -> Result<String> {
        let child = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                Error::Rasterization(format!("Failed to launch {}: {}", self.binary, e))
            })?;

        let outcome = wait_with_deadline(child, VERSION_DEADLINE)?;
        if !outcome.status.success() {
            return Err(Error::Rasterization(format!(
                "Browser exited with {}",
                outcome.status
            )));
        }
        Ok(outcome.stdout.trim().to_string())
    }
}

struct ProcessOutcome {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// Wait for `child` to exit, killing it once `deadline` elapses.
///
/// Piped output is drained only after exit; a child that fills the pipe and
/// stalls is still bounded by the kill.
fn wait_with_deadline(mut child: Child, deadline: Duration) -> Result<ProcessOutcome> {
    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if started.elapsed() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::Timeout(deadline.as_millis() as u64));
                }
                std::thread::sleep(WAIT_POLL);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Rasterization(format!(
                    "Failed to wait on browser process: {}",
                    e
                )));
            }
        }
    };

    let mut stdout = String::new();
    if let Some(mut pipe) = child.stdout.take() {
        let _ = pipe.read_to_string(&mut stdout);
    }
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        let _ = pipe.read_to_string(&mut stderr);
    }

    Ok(ProcessOutcome {
        status,
        stdout,
        stderr,
    })
}

fn file_has_bytes(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_fails_and_leaves_no_temp_files() {
        let rasterizer = ChromiumRasterizer::new("inkpanel-no-such-browser", 500);

        assert!(matches!(
            rasterizer.capture("file:///dev/null", 10, 10),
            Err(Error::Rasterization(_))
        ));
        assert!(matches!(
            rasterizer.version(),
            Err(Error::Rasterization(_))
        ));

        let leftovers: Vec<_> = std::fs::read_dir(std::env::temp_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .starts_with("inkpanel-shot-")
            })
            .collect();
        assert!(leftovers.is_empty(), "Leftover temp files: {:?}", leftovers);
    }

    #[test]
    #[ignore] // Requires chromium-headless-shell to be installed
    fn test_version_reports_chromium() {
        let rasterizer = ChromiumRasterizer::default();
        let version = rasterizer.version().expect("Failed to probe browser");
        assert!(!version.is_empty());
    }
}
