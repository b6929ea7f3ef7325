use std::io;

use quire_markdown::{RenderError, TransformError};
use quire_resolver::{Locator, ResolveError};
use thiserror::Error;

use crate::stage::pdf::PdfError;

pub type StageResult<T> = Result<T, StageError>;

/// Failure of a pipeline stage.
#[derive(Debug, Error)]
pub enum StageError {
  #[error(transparent)]
  Transform(#[from] TransformError),

  #[error(transparent)]
  Render(#[from] RenderError),

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error("Template error: {0}")]
  Template(#[from] tera::Error),

  #[error("Could not render layout '{locator}'")]
  Layout {
    locator: Locator,
    #[source]
    source:  tera::Error,
  },

  #[error("PDF rendering failed: {0}")]
  Pdf(#[from] PdfError),

  #[error("I/O error: {0}")]
  Io(#[from] io::Error),
}
