//! PDF output through a headless browser.

use std::{
  env,
  fs::{self, File},
  io,
  path::{Path, PathBuf},
  process::{Command, ExitStatus, Stdio},
  thread,
  time::{Duration, Instant},
};

use log::{debug, info};
use thiserror::Error;

use crate::{
  error::StageResult,
  pipeline::{Next, Payload, Stage, StageContext},
};

/// Browsers looked up on `PATH`, in order.
const BROWSERS: &[&str] = &["chromium", "chromium-browser", "google-chrome", "chrome"];

/// How often a running browser is checked for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum PdfError {
  #[error("No browser found on PATH (tried {})", BROWSERS.join(", "))]
  BrowserNotFound,

  #[error("Could not start '{}'", .browser.display())]
  Spawn {
    browser: PathBuf,
    #[source]
    source:  io::Error,
  },

  #[error("Browser did not finish within {secs} seconds")]
  Timeout { secs: u64 },

  #[error("Browser exited with {status}: {stderr}")]
  Failed { status: ExitStatus, stderr: String },

  #[error("I/O error: {0}")]
  Io(#[from] io::Error),
}

/// Page margins in centimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
  pub top:    f64,
  pub bottom: f64,
  pub left:   f64,
  pub right:  f64,
}

impl Margins {
  #[must_use]
  pub const fn uniform(cm: f64) -> Self {
    Self {
      top:    cm,
      bottom: cm,
      left:   cm,
      right:  cm,
    }
  }
}

impl Default for Margins {
  fn default() -> Self {
    Self::uniform(1.0)
  }
}

/// Print settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
  pub margins:    Margins,
  pub scale:      f64,
  pub timeout:    Duration,
  pub background: bool,
}

impl Default for PdfOptions {
  fn default() -> Self {
    Self {
      margins:    Margins::default(),
      scale:      1.0,
      timeout:    Duration::from_secs(60),
      background: false,
    }
  }
}

/// Turns a complete HTML page into PDF bytes.
pub trait PdfRenderer: Send + Sync {
  /// # Errors
  ///
  /// Returns an error if the page cannot be printed.
  fn render(&self, html: &[u8], options: &PdfOptions) -> Result<Vec<u8>, PdfError>;
}

fn cm_to_inches(cm: f64) -> f64 {
  cm / 2.54
}

/// Print rules for `options`, as a `<style>` element.
fn print_style(options: &PdfOptions) -> String {
  let Margins {
    top,
    bottom,
    left,
    right,
  } = options.margins;
  let mut style = format!(
    "<style>@page {{ margin: {:.4}in {:.4}in {:.4}in {:.4}in; }} html {{ zoom: {}; }}",
    cm_to_inches(top),
    cm_to_inches(right),
    cm_to_inches(bottom),
    cm_to_inches(left),
    options.scale,
  );
  if options.background {
    style.push_str(
      " * { -webkit-print-color-adjust: exact; print-color-adjust: exact; }",
    );
  }
  style.push_str("</style>");
  style
}

/// Insert the print rules at the end of `<head>`, or in front of the page
/// when it has none.
fn with_print_style(html: &[u8], options: &PdfOptions) -> Vec<u8> {
  let style = print_style(options);
  let position = html
    .windows(b"</head>".len())
    .position(|window| window.eq_ignore_ascii_case(b"</head>"))
    .unwrap_or(0);

  let mut out = Vec::with_capacity(html.len() + style.len());
  out.extend_from_slice(&html[..position]);
  out.extend_from_slice(style.as_bytes());
  out.extend_from_slice(&html[position..]);
  out
}

/// First of [`BROWSERS`] found on `PATH`.
fn find_browser() -> Option<PathBuf> {
  let path = env::var_os("PATH")?;
  env::split_paths(&path).find_map(|dir| {
    BROWSERS
      .iter()
      .map(|name| dir.join(name))
      .find(|candidate| candidate.is_file())
  })
}

/// Prints with Chromium or Chrome in headless mode.
#[derive(Debug, Clone, Default)]
pub struct ChromiumRenderer {
  browser: Option<PathBuf>,
}

impl ChromiumRenderer {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Use `browser` instead of searching `PATH`.
  #[must_use]
  pub fn with_browser(mut self, browser: Option<PathBuf>) -> Self {
    self.browser = browser;
    self
  }

  fn browser(&self) -> Result<PathBuf, PdfError> {
    self
      .browser
      .clone()
      .or_else(find_browser)
      .ok_or(PdfError::BrowserNotFound)
  }
}

impl PdfRenderer for ChromiumRenderer {
  fn render(&self, html: &[u8], options: &PdfOptions) -> Result<Vec<u8>, PdfError> {
    let browser = self.browser()?;
    let dir = tempfile::tempdir()?;
    let page = dir.path().join("page.html");
    let output = dir.path().join("page.pdf");
    let log = dir.path().join("browser.log");
    fs::write(&page, with_print_style(html, options))?;

    let mut command = Command::new(&browser);
    command
      .arg("--headless")
      .arg("--disable-gpu")
      .arg("--no-sandbox")
      .arg("--no-pdf-header-footer")
      .arg(format!("--print-to-pdf={}", output.display()))
      .arg(&page)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(File::create(&log)?);

    debug!("Printing {} with {}", page.display(), browser.display());
    let status = wait_with_timeout(&mut command, &browser, options.timeout)?;
    if !status.success() {
      let stderr = fs::read_to_string(&log).unwrap_or_default();
      return Err(PdfError::Failed {
        status,
        stderr: stderr.trim().to_owned(),
      });
    }
    Ok(fs::read(&output)?)
  }
}

/// Run `command`, killing it once `timeout` has passed.
fn wait_with_timeout(
  command: &mut Command,
  browser: &Path,
  timeout: Duration,
) -> Result<ExitStatus, PdfError> {
  let mut child = command.spawn().map_err(|source| {
    PdfError::Spawn {
      browser: browser.to_path_buf(),
      source,
    }
  })?;

  let start = Instant::now();
  loop {
    if let Some(status) = child.try_wait()? {
      return Ok(status);
    }
    if start.elapsed() > timeout {
      child.kill()?;
      child.wait()?;
      return Err(PdfError::Timeout {
        secs: timeout.as_secs(),
      });
    }
    thread::sleep(POLL_INTERVAL);
  }
}

/// Replaces the HTML payload with the printed PDF.
pub struct PdfStage {
  renderer: Box<dyn PdfRenderer>,
  options:  PdfOptions,
}

impl PdfStage {
  #[must_use]
  pub fn new(renderer: impl PdfRenderer + 'static, options: PdfOptions) -> Self {
    Self {
      renderer: Box::new(renderer),
      options,
    }
  }
}

impl std::fmt::Debug for PdfStage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PdfStage")
      .field("options", &self.options)
      .finish_non_exhaustive()
  }
}

impl Stage for PdfStage {
  fn name(&self) -> &'static str {
    "pdf"
  }

  fn run(
    &self,
    payload: &mut Payload,
    _ctx: &StageContext,
    next: Next<'_>,
  ) -> StageResult<()> {
    let pdf = self.renderer.render(payload.data(), &self.options)?;
    info!("Printed {} ({} bytes)", payload.source(), pdf.len());
    payload.set_data(pdf);
    next.run(payload)
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use std::sync::{Arc, Mutex};

  use pretty_assertions::assert_eq;
  use quire_resolver::{Locator, Registry, ResolveContext};

  use super::*;
  use crate::{error::StageError, pipeline::Pipeline};

  /// Records what it was asked to print.
  #[derive(Default, Clone)]
  struct Recorder {
    seen: Arc<Mutex<Vec<(Vec<u8>, PdfOptions)>>>,
  }

  impl PdfRenderer for Recorder {
    fn render(&self, html: &[u8], options: &PdfOptions) -> Result<Vec<u8>, PdfError> {
      self.seen.lock().unwrap().push((html.to_vec(), options.clone()));
      Ok(b"%PDF-1.7".to_vec())
    }
  }

  struct Broken;

  impl PdfRenderer for Broken {
    fn render(&self, _html: &[u8], options: &PdfOptions) -> Result<Vec<u8>, PdfError> {
      Err(PdfError::Timeout {
        secs: options.timeout.as_secs(),
      })
    }
  }

  fn run(stage: PdfStage) -> StageResult<Vec<u8>> {
    let ctx = StageContext::new(Registry::new(), ResolveContext::new());
    let mut payload = Payload::new(Locator::from("doc.md"), b"<html></html>".to_vec());
    Pipeline::new().with(stage).run(&mut payload, &ctx)?;
    Ok(payload.into_data())
  }

  #[test]
  fn stage_replaces_html_with_pdf() {
    let recorder = Recorder::default();
    let options = PdfOptions {
      scale: 0.8,
      ..PdfOptions::default()
    };
    let pdf = run(PdfStage::new(recorder.clone(), options.clone())).unwrap();

    assert_eq!(pdf, b"%PDF-1.7");
    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, b"<html></html>");
    assert_eq!(seen[0].1, options);
  }

  #[test]
  fn renderer_errors_abort() {
    let err = run(PdfStage::new(Broken, PdfOptions::default())).unwrap_err();
    assert!(matches!(err, StageError::Pdf(PdfError::Timeout { secs: 60 })));
  }

  #[test]
  fn margins_are_printed_in_inches() {
    let options = PdfOptions {
      margins: Margins {
        top:    2.54,
        bottom: 1.27,
        left:   0.0,
        right:  5.08,
      },
      ..PdfOptions::default()
    };
    assert_eq!(
      print_style(&options),
      "<style>@page { margin: 1.0000in 2.0000in 0.5000in 0.0000in; } html { zoom: 1; }</style>"
    );
  }

  #[test]
  fn background_forces_color_printing() {
    let options = PdfOptions {
      background: true,
      ..PdfOptions::default()
    };
    assert!(print_style(&options).contains("print-color-adjust: exact"));
  }

  #[test]
  fn print_style_goes_into_head() {
    let options = PdfOptions::default();
    let html = String::from_utf8(with_print_style(
      b"<html><HEAD><title>t</title></HEAD><body></body></html>",
      &options,
    ))
    .unwrap();
    assert!(html.starts_with("<html><HEAD><title>t</title><style>"), "{html}");
    assert!(html.ends_with("</style></HEAD><body></body></html>"), "{html}");

    let bare = String::from_utf8(with_print_style(b"<p>x</p>", &options)).unwrap();
    assert!(bare.starts_with("<style>") && bare.ends_with("<p>x</p>"));
  }

  #[test]
  fn configured_browser_wins() {
    let renderer = ChromiumRenderer::new().with_browser(Some(PathBuf::from("/opt/chrome")));
    assert_eq!(renderer.browser().unwrap(), PathBuf::from("/opt/chrome"));
  }

  #[test]
  fn missing_browser_is_reported() {
    let renderer = ChromiumRenderer::new()
      .with_browser(Some(PathBuf::from("/nonexistent/quire-browser")));
    let err = renderer
      .render(b"<p>x</p>", &PdfOptions::default())
      .unwrap_err();
    assert!(matches!(err, PdfError::Spawn { .. }), "{err}");
  }
}
