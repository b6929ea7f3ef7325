//! Error types for parsing, transforming and rendering documents.

use quire_resolver::{Locator, ResolveError};

/// Result type for directive transformation.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for rendering.
pub type RenderResult<T> = Result<T, RenderError>;

/// Fatal errors raised while parsing or transforming a document.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
  #[error("Directive '{directive}' requires the '{attribute}' attribute")]
  MissingAttribute {
    directive: String,
    attribute: &'static str,
  },

  #[error(
    "Invalid value '{value}' for attribute '{attribute}' on directive \
     '{directive}'"
  )]
  InvalidAttribute {
    directive: String,
    attribute: &'static str,
    value:     String,
  },

  #[error("Could not resolve '{locator}'")]
  Resolve {
    locator: Locator,
    #[source]
    source:  ResolveError,
  },

  #[error("Include cycle detected: {}", format_chain(.chain))]
  IncludeCycle { chain: Vec<Locator> },

  #[error("Resource '{locator}' is not valid UTF-8")]
  InvalidUtf8 {
    locator: Locator,
    #[source]
    source:  std::str::Utf8Error,
  },

  #[error("Invalid front matter: {0}")]
  FrontMatter(#[from] serde_yaml::Error),

  #[error(transparent)]
  Render(#[from] RenderError),
}

fn format_chain(chain: &[Locator]) -> String {
  chain
    .iter()
    .map(Locator::as_str)
    .collect::<Vec<_>>()
    .join(" -> ")
}

/// Errors raised while rendering a document.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
  #[error("Write failed: {0}")]
  Write(#[from] std::fmt::Error),

  #[error("No renderer registered for directive '{0}'")]
  MissingRenderer(String),
}
