//! Link destination rewriting.

use std::collections::BTreeMap;

use log::trace;
use quire_resolver::Locator;

use crate::ast::{Document, NodeKind};

/// Whether `url` is a relative path reference.
///
/// URLs, absolute paths, fragments and scheme-prefixed references such as
/// `mailto:` or `data:` are not.
#[must_use]
pub fn is_relative_reference(url: &str) -> bool {
  !url.is_empty()
    && !url.starts_with('#')
    && !url.starts_with('/')
    && !has_scheme_prefix(url)
    && !Locator::from(url).is_absolute()
}

fn has_scheme_prefix(url: &str) -> bool {
  let Some((scheme, _)) = url.split_once(':') else {
    return false;
  };
  let mut chars = scheme.chars();
  scheme.len() >= 2
    && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
    && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Rewrites link destinations of a document.
///
/// Relative destinations are joined with a base directory, then the longest
/// matching prefix replacement is applied.
#[derive(Debug, Clone, Default)]
pub struct LinkRewriter {
  base:         Option<Locator>,
  replacements: BTreeMap<String, String>,
}

impl LinkRewriter {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn with_base(mut self, base: impl Into<Locator>) -> Self {
    self.base = Some(base.into());
    self
  }

  #[must_use]
  pub fn with_replacements(
    mut self,
    replacements: impl IntoIterator<Item = (String, String)>,
  ) -> Self {
    self.replacements.extend(replacements);
    self
  }

  /// Rewrite a single destination.
  #[must_use]
  pub fn rewrite(&self, url: &str) -> String {
    if url.is_empty() || url.starts_with('#') || Locator::from(url).is_url() {
      return url.to_owned();
    }

    let mut rewritten = match &self.base {
      Some(base) if is_relative_reference(url) => base.join_one(url).to_string(),
      _ => url.to_owned(),
    };

    if let Some((prefix, replacement)) = self
      .replacements
      .iter()
      .filter(|(prefix, _)| rewritten.starts_with(prefix.as_str()))
      .max_by_key(|(prefix, _)| prefix.len())
    {
      rewritten = format!("{replacement}{}", &rewritten[prefix.len()..]);
    }
    rewritten
  }

  /// Rewrite every link destination in `document`. Images are left to the
  /// embedding pass.
  pub fn apply(&self, document: &mut Document) {
    document.walk_mut(&mut |node| {
      if let NodeKind::Link { url, .. } = &mut node.kind {
        let rewritten = self.rewrite(url);
        if rewritten != *url {
          trace!("Rewriting link '{url}' to '{rewritten}'");
          *url = rewritten;
        }
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn relative_reference_detection() {
    assert!(is_relative_reference("img/a.png"));
    assert!(is_relative_reference("../a.md"));
    assert!(!is_relative_reference("#anchor"));
    assert!(!is_relative_reference("/root.md"));
    assert!(!is_relative_reference("mailto:someone@example.com"));
    assert!(!is_relative_reference("data:image/png;base64,AAAA"));
    assert!(!is_relative_reference("https://example.com"));
    assert!(!is_relative_reference(""));
  }

  #[test]
  fn joins_base_then_replaces_prefix() {
    let rewriter = LinkRewriter::new().with_base("docs").with_replacements([
      ("docs/api/".to_owned(), "https://api.example.com/".to_owned()),
      ("docs/".to_owned(), "/site/".to_owned()),
    ]);

    assert_eq!(rewriter.rewrite("guide.md"), "/site/guide.md");
    assert_eq!(
      rewriter.rewrite("api/index.html"),
      "https://api.example.com/index.html"
    );
    assert_eq!(rewriter.rewrite("#top"), "#top");
    assert_eq!(rewriter.rewrite("https://x.org/a"), "https://x.org/a");
  }
}
