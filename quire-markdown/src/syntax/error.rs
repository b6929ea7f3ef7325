//! Errors raised while highlighting code.

pub type SyntaxResult<T> = Result<T, SyntaxError>;

#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
  #[error("Language '{0}' is not supported by this highlighter")]
  UnsupportedLanguage(String),
  #[error("Highlighting failed: {0}")]
  HighlightingFailed(String),
  #[error(
    "No syntax highlighting backend available. Build with the 'syntect' \
     feature."
  )]
  NoBackendAvailable,
}
