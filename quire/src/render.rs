//! `quire render`: configuration to pipeline, inputs to outputs.

use std::{
  fmt,
  fs,
  io::{self, Write as _},
  path::Path,
  time::Duration,
};

use color_eyre::eyre::{Context, Result, bail};
use log::{info, warn};
use quire_config::{Config, HttpConfig, ListIndentStyle, MarkdownConfig};
use quire_markdown::{
  HtmlRenderer,
  MarkdownOptions,
  MarkdownRenderer,
  ParserOptions,
  render::{JsonFormatter, ListIndent},
  syntax,
};
use quire_resolver::{
  Credentials,
  HttpResolver,
  Locator,
  Registry,
  ResolveContext,
  Resolver,
  http::{PASSWORD_ENV, USERNAME_ENV},
};
use rayon::prelude::*;
use serde_json::{Map, Value};

use crate::{
  cli::{LayoutArgs, Target},
  pipeline::{Payload, Pipeline, StageContext},
  stage::{
    ChromiumRenderer,
    HtmlStage,
    Layout,
    MarkdownStage,
    PdfOptions,
    PdfStage,
    TemplateStage,
    pdf::Margins,
  },
};

/// Argument naming standard input.
const STDIN_ARG: &str = "-";

/// A document to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
  Stdin,
  Resource(String),
}

impl Input {
  /// Inputs named on the command line; standard input when there are none.
  #[must_use]
  pub fn from_args(files: &[String]) -> Vec<Self> {
    if files.is_empty() {
      return vec![Self::Stdin];
    }
    files
      .iter()
      .map(|file| {
        if file == STDIN_ARG {
          Self::Stdin
        } else {
          Self::Resource(file.clone())
        }
      })
      .collect()
  }

  /// Where the data is read from.
  fn locator(&self) -> Locator {
    match self {
      Self::Stdin => Locator::from("stdin://"),
      Self::Resource(raw) => Locator::from(raw.as_str()),
    }
  }

  /// What relative references inside the document resolve against.
  /// Standard input behaves like a file in the working directory.
  fn source(&self) -> Locator {
    match self {
      Self::Stdin => Locator::from("stdin.md"),
      Self::Resource(raw) => Locator::from(raw.as_str()),
    }
  }
}

impl fmt::Display for Input {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Stdin => f.write_str("standard input"),
      Self::Resource(raw) => f.write_str(raw),
    }
  }
}

/// A configured pipeline and the context it runs in.
#[derive(Debug)]
pub struct Job {
  pipeline: Pipeline,
  ctx:      StageContext,
}

impl Job {
  /// Assemble the stages for `target`.
  ///
  /// # Errors
  ///
  /// Returns an error if a `--var` flag is malformed.
  pub fn new(target: &Target, config: &Config) -> Result<Self> {
    let parser = ParserOptions {
      ignore_directives: config.markdown.ignore_directives.clone(),
    };
    let toc = target.render_args().toc;

    let pipeline = match target {
      Target::Markdown { .. } => {
        Pipeline::new().with(
          MarkdownStage::new(parser, markdown_renderer(&config.markdown)).with_toc(toc),
        )
      },
      Target::Html { layout, .. } => html_pipeline(parser, toc, layout, config)?,
      Target::Pdf { layout, .. } => {
        html_pipeline(parser, toc, layout, config)?.with(PdfStage::new(
          ChromiumRenderer::new().with_browser(config.pdf.browser.clone()),
          pdf_options(config),
        ))
      },
    };

    Ok(Self {
      pipeline,
      ctx: StageContext::new(registry(&config.http), ResolveContext::new()),
    })
  }

  #[must_use]
  pub const fn pipeline(&self) -> &Pipeline {
    &self.pipeline
  }

  /// Read and compile one input.
  ///
  /// # Errors
  ///
  /// Returns an error if the input cannot be read or a stage fails.
  pub fn compile(&self, input: &Input) -> Result<Vec<u8>> {
    let data = self
      .ctx
      .resolver
      .fetch(&input.locator(), &self.ctx.resolve_ctx)
      .wrap_err_with(|| format!("Failed to read {input}"))?;

    let mut payload = Payload::new(input.source(), data);
    self
      .pipeline
      .run(&mut payload, &self.ctx)
      .wrap_err_with(|| format!("Failed to compile {input}"))?;
    Ok(payload.into_data())
  }

  /// Compile every input in parallel. Results keep the order of `inputs`.
  ///
  /// # Errors
  ///
  /// Returns the first failure; nothing is returned for the other inputs.
  pub fn compile_all(&self, inputs: &[Input]) -> Result<Vec<Vec<u8>>> {
    inputs.par_iter().map(|input| self.compile(input)).collect()
  }
}

/// Run `quire render <target>`.
///
/// # Errors
///
/// Returns an error if any document fails to compile, in which case no
/// output is written, or if writing the output fails.
pub fn run(target: &Target, config: &Config) -> Result<()> {
  let job = Job::new(target, config)?;
  let inputs = Input::from_args(&target.render_args().files);
  let outputs = job.compile_all(&inputs)?;
  write_outputs(target.output(), &outputs)
}

fn write_outputs(output: Option<&Path>, outputs: &[Vec<u8>]) -> Result<()> {
  let Some(path) = output else {
    let mut stdout = io::stdout().lock();
    for data in outputs {
      stdout.write_all(data)?;
    }
    stdout.flush()?;
    return Ok(());
  };

  let Some(last) = outputs.last() else {
    return Ok(());
  };
  if outputs.len() > 1 {
    warn!(
      "{} documents rendered to {}; only the last one is kept",
      outputs.len(),
      path.display()
    );
  }
  fs::write(path, last)
    .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
  info!("Wrote {} ({} bytes)", path.display(), last.len());
  Ok(())
}

fn html_pipeline(
  parser: ParserOptions,
  toc: bool,
  args: &LayoutArgs,
  config: &Config,
) -> Result<Pipeline> {
  let mut vars = config.html.vars.clone();
  vars.extend(parse_vars(&args.vars)?);

  let layout = args
    .layout
    .as_deref()
    .or(config.html.layout.as_deref())
    .map_or_else(quire_templates::default_layout, Locator::from);

  let html = HtmlStage::new(
    parser.clone(),
    html_renderer(config),
    Layout::new(layout, vars.clone()),
  )
  .with_toc(toc)
  .with_replacements(config.links.replacements.clone());

  Ok(
    Pipeline::new()
      .with(MarkdownStage::new(parser, markdown_renderer(&config.markdown)))
      .with(TemplateStage::new(vars))
      .with(html),
  )
}

/// Parse `KEY=VALUE` template variables.
///
/// # Errors
///
/// Returns an error for an entry without `=` or with an empty key.
pub fn parse_vars(entries: &[String]) -> Result<Map<String, Value>> {
  let mut vars = Map::new();
  for entry in entries {
    match entry.split_once('=') {
      Some((key, value)) if !key.trim().is_empty() => {
        vars.insert(key.trim().to_owned(), Value::String(value.to_owned()));
      },
      _ => bail!("Invalid variable '{entry}'. Expected KEY=VALUE"),
    }
  }
  Ok(vars)
}

fn markdown_renderer(config: &MarkdownConfig) -> MarkdownRenderer {
  let options = MarkdownOptions {
    underline_headings: config.underline_headings,
    soft_wraps: config.soft_wraps,
    list_indent: match config.list_indent {
      ListIndentStyle::Aligned => ListIndent::Aligned,
      ListIndentStyle::Uniform => ListIndent::Uniform,
    },
    ..MarkdownOptions::default()
  };

  let renderer = MarkdownRenderer::new(options);
  if config.format_code {
    renderer.with_formatter(JsonFormatter)
  } else {
    renderer
  }
}

fn html_renderer(config: &Config) -> HtmlRenderer {
  let renderer = HtmlRenderer::new();
  if !config.highlight.enable {
    return renderer;
  }
  match syntax::default_highlighting(config.highlight.theme.clone()) {
    Ok(highlighting) => renderer.with_highlighting(highlighting),
    Err(err) => {
      warn!("Syntax highlighting disabled: {err}");
      renderer
    },
  }
}

fn pdf_options(config: &Config) -> PdfOptions {
  let pdf = &config.pdf;
  PdfOptions {
    margins:    Margins {
      top:    pdf.margin_top,
      bottom: pdf.margin_bottom,
      left:   pdf.margin_left,
      right:  pdf.margin_right,
    },
    scale:      pdf.scale,
    timeout:    Duration::from_secs(pdf.timeout_secs),
    background: pdf.background,
  }
}

/// Basic-auth credentials: the environment, with `[http]` values taking
/// precedence field by field.
fn credentials(http: &HttpConfig) -> Option<Credentials> {
  let from_env = |name: &str| std::env::var(name).ok().filter(|value| !value.is_empty());
  let username = http.username.clone().or_else(|| from_env(USERNAME_ENV))?;
  let password = http
    .password
    .clone()
    .or_else(|| from_env(PASSWORD_ENV))
    .unwrap_or_default();
  Some(Credentials::new(username, password))
}

fn registry(http: &HttpConfig) -> Registry {
  let mut resolver = HttpResolver::new().with_credentials(credentials(http));
  if let Some(secs) = http.timeout_secs {
    resolver = resolver.with_timeout(Duration::from_secs(secs));
  }
  Registry::with_defaults(resolver)
}
