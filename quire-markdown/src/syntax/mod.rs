//! Syntax highlighting for fenced code in HTML output.
//!
//! Backends implement [`Highlighter`]; [`Highlighting`] wraps one with
//! language aliases and a theme. The only bundled backend is syntect,
//! extended with the two-face syntax and theme collections.

pub mod error;

use std::collections::HashMap;

pub use error::{SyntaxError, SyntaxResult};

#[cfg(feature = "syntect")] mod syntect;
#[cfg(feature = "syntect")] pub use syntect::SyntectHighlighter;

/// A syntax highlighting backend.
pub trait Highlighter: Send + Sync {
  fn name(&self) -> &'static str;

  /// Whether `language` (already alias-resolved) has a grammar.
  fn supports_language(&self, language: &str) -> bool;

  /// Highlight `code` as `language`, returning a complete `<pre>` element.
  ///
  /// # Errors
  ///
  /// Returns an error if the backend fails while highlighting.
  fn highlight(
    &self,
    code: &str,
    language: &str,
    theme: Option<&str>,
  ) -> SyntaxResult<String>;
}

/// A highlighter plus the language aliases and theme used with it.
pub struct Highlighting {
  highlighter: Box<dyn Highlighter>,
  aliases:     HashMap<String, String>,
  theme:       Option<String>,
}

impl Highlighting {
  #[must_use]
  pub fn new(highlighter: Box<dyn Highlighter>) -> Self {
    let aliases = [
      ("js", "javascript"),
      ("ts", "typescript"),
      ("py", "python"),
      ("rb", "ruby"),
      ("sh", "bash"),
      ("shell", "bash"),
      ("yml", "yaml"),
      ("md", "markdown"),
      ("golang", "go"),
    ]
    .into_iter()
    .map(|(alias, language)| (alias.to_owned(), language.to_owned()))
    .collect();

    Self {
      highlighter,
      aliases,
      theme: None,
    }
  }

  #[must_use]
  pub fn with_theme(mut self, theme: Option<String>) -> Self {
    self.theme = theme;
    self
  }

  #[must_use]
  pub fn highlighter(&self) -> &dyn Highlighter {
    self.highlighter.as_ref()
  }

  #[must_use]
  pub fn resolve_language<'a>(&'a self, language: &'a str) -> &'a str {
    self.aliases.get(language).map_or(language, String::as_str)
  }

  /// Highlight `code`, or return `None` when the language is unknown.
  ///
  /// # Errors
  ///
  /// Returns an error if the backend fails while highlighting.
  pub fn highlight(
    &self,
    code: &str,
    language: &str,
  ) -> SyntaxResult<Option<String>> {
    let language = self.resolve_language(language);
    if !self.highlighter.supports_language(language) {
      return Ok(None);
    }
    self
      .highlighter
      .highlight(code, language, self.theme.as_deref())
      .map(Some)
  }
}

impl std::fmt::Debug for Highlighting {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Highlighting")
      .field("highlighter", &self.highlighter.name())
      .field("theme", &self.theme)
      .finish_non_exhaustive()
  }
}

/// The highlighter compiled into this build.
///
/// # Errors
///
/// Returns [`SyntaxError::NoBackendAvailable`] when built without a backend.
pub fn default_highlighting(theme: Option<String>) -> SyntaxResult<Highlighting> {
  #[cfg(feature = "syntect")]
  {
    Ok(Highlighting::new(Box::new(SyntectHighlighter::default())).with_theme(theme))
  }

  #[cfg(not(feature = "syntect"))]
  {
    let _ = theme;
    Err(SyntaxError::NoBackendAvailable)
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use super::*;

  struct Upper;

  impl Highlighter for Upper {
    fn name(&self) -> &'static str {
      "upper"
    }

    fn supports_language(&self, language: &str) -> bool {
      language == "javascript"
    }

    fn highlight(
      &self,
      code: &str,
      _language: &str,
      _theme: Option<&str>,
    ) -> SyntaxResult<String> {
      Ok(code.to_uppercase())
    }
  }

  #[test]
  fn aliases_resolve_before_lookup() {
    let highlighting = Highlighting::new(Box::new(Upper));
    assert_eq!(
      highlighting.highlight("let a", "js").unwrap().as_deref(),
      Some("LET A")
    );
    assert!(highlighting.highlight("x", "cobol").unwrap().is_none());
  }

  #[cfg(feature = "syntect")]
  #[test]
  fn syntect_highlights_rust() {
    let highlighting = default_highlighting(None).unwrap();
    let html = highlighting.highlight("fn main() {}", "rust").unwrap().unwrap();
    assert!(html.starts_with("<pre"));
    assert!(html.contains("main"));
  }
}
