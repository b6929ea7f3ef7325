use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;

/// Command line interface for quire
#[derive(Parser, Debug)]
#[command(
  name = "quire",
  author,
  version,
  about = "Compile directive-extended Markdown to Markdown, HTML or PDF"
)]
pub struct Cli {
  /// Subcommand to execute (see [`Commands`])
  #[command(subcommand)]
  pub command: Commands,

  /// Working directory, entered before anything else runs
  #[arg(long, global = true, env = "QUIRE_WORKDIR")]
  pub workdir: Option<PathBuf>,

  /// Log level
  #[arg(
    long,
    global = true,
    env = "QUIRE_LOG_LEVEL",
    value_enum,
    default_value_t = LogLevel::Info
  )]
  pub log_level: LogLevel,

  /// Enable debug logging and full error reports
  #[arg(long, global = true, env = "QUIRE_DEBUG")]
  pub debug: bool,

  /// Path to configuration file(s) (TOML or JSON, can be specified multiple
  /// times). Files are merged in order, later files overriding earlier ones
  #[arg(short = 'c', long = "config", global = true, action = clap::ArgAction::Append)]
  pub config_files: Vec<PathBuf>,

  /// Override configuration values (KEY=VALUE format, can be used multiple
  /// times)
  #[arg(long = "set", global = true, action = clap::ArgAction::Append)]
  pub config_overrides: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
  /// Compile documents to an output format.
  Render {
    #[command(subcommand)]
    target: Target,
  },
}

/// Output formats of `quire render`.
#[derive(Subcommand, Debug)]
pub enum Target {
  /// Resolve directives and print canonical Markdown.
  Markdown {
    #[command(flatten)]
    render: RenderArgs,

    /// Output file. Standard output when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
  },

  /// Render a self-contained HTML page.
  Html {
    #[command(flatten)]
    render: RenderArgs,

    #[command(flatten)]
    layout: LayoutArgs,

    /// Output file. Standard output when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
  },

  /// Print the HTML page to PDF with a headless browser.
  Pdf {
    #[command(flatten)]
    render: RenderArgs,

    #[command(flatten)]
    layout: LayoutArgs,

    /// Output file
    #[arg(short, long)]
    output: PathBuf,
  },
}

impl Target {
  #[must_use]
  pub const fn render_args(&self) -> &RenderArgs {
    match self {
      Self::Markdown { render, .. }
      | Self::Html { render, .. }
      | Self::Pdf { render, .. } => render,
    }
  }

  /// Layout flags, for the targets that produce HTML.
  #[must_use]
  pub const fn layout_args(&self) -> Option<&LayoutArgs> {
    match self {
      Self::Markdown { .. } => None,
      Self::Html { layout, .. } | Self::Pdf { layout, .. } => Some(layout),
    }
  }

  /// Where to write results; `None` means standard output.
  #[must_use]
  pub fn output(&self) -> Option<&Path> {
    match self {
      Self::Markdown { output, .. } | Self::Html { output, .. } => output.as_deref(),
      Self::Pdf { output, .. } => Some(output.as_path()),
    }
  }
}

/// Flags shared by every target.
#[derive(Args, Debug)]
pub struct RenderArgs {
  /// Insert a table of contents at the top of each document
  #[arg(long)]
  pub toc: bool,

  /// Documents to compile. Standard input when none is given or for `-`
  pub files: Vec<String>,
}

/// Flags of the targets that go through an HTML layout.
#[derive(Args, Debug)]
pub struct LayoutArgs {
  /// Layout template, as a path or URL
  #[arg(long)]
  pub layout: Option<String>,

  /// Template variable (KEY=VALUE format, can be used multiple times)
  #[arg(long = "var", action = clap::ArgAction::Append)]
  pub vars: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
  Error,
  Warn,
  Info,
  Debug,
  Trace,
}

impl Cli {
  /// Parse command line arguments into a [`Cli`] struct.
  #[must_use]
  pub fn parse_args() -> Self {
    Self::parse()
  }

  /// Level to initialise logging with; `--debug` raises it to at least
  /// debug.
  #[must_use]
  pub fn level_filter(&self) -> LevelFilter {
    let level = LevelFilter::from(self.log_level);
    if self.debug {
      level.max(LevelFilter::Debug)
    } else {
      level
    }
  }
}

impl From<LogLevel> for LevelFilter {
  fn from(level: LogLevel) -> Self {
    match level {
      LogLevel::Error => Self::Error,
      LogLevel::Warn => Self::Warn,
      LogLevel::Info => Self::Info,
      LogLevel::Debug => Self::Debug,
      LogLevel::Trace => Self::Trace,
    }
  }
}
