//! Layouts bundled with quire.
//!
//! They are served under the `quire://` scheme: the default layout is
//! `quire://document.html` and its stylesheet `quire://document.css`.

use std::collections::HashMap;

use quire_resolver::{EmbeddedResolver, Locator, embedded::SCHEME};

pub const DOCUMENT_TEMPLATE: &str = include_str!("../templates/document.html");
pub const DOCUMENT_CSS: &str = include_str!("../templates/document.css");

/// Name of the layout used when none is configured.
pub const DEFAULT_LAYOUT: &str = "document.html";

#[must_use]
pub fn all_templates() -> HashMap<&'static str, &'static str> {
  let mut templates = HashMap::new();
  templates.insert(DEFAULT_LAYOUT, DOCUMENT_TEMPLATE);
  templates.insert("document.css", DOCUMENT_CSS);
  templates
}

/// Locator of the default layout.
#[must_use]
pub fn default_layout() -> Locator {
  Locator::new(format!("{SCHEME}://{DEFAULT_LAYOUT}"))
}

/// A resolver serving every bundled file.
#[must_use]
pub fn resolver() -> EmbeddedResolver {
  all_templates()
    .into_iter()
    .fold(EmbeddedResolver::new(), |resolver, (name, contents)| {
      resolver.with_file(name, contents)
    })
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use pretty_assertions::assert_eq;
  use quire_resolver::{ResolveContext, Resolver};

  use super::*;

  #[test]
  fn default_layout_is_served() {
    let layout = default_layout();
    assert_eq!(layout.as_str(), "quire://document.html");

    let data = resolver().fetch(&layout, &ResolveContext::new()).unwrap();
    assert_eq!(String::from_utf8(data).unwrap(), DOCUMENT_TEMPLATE);
  }

  #[test]
  fn every_file_is_served() {
    let resolver = resolver();
    for name in all_templates().keys() {
      let locator = Locator::new(format!("{SCHEME}://{name}"));
      assert!(
        resolver.resolve(&locator, &ResolveContext::new()).is_ok(),
        "{locator}"
      );
    }
    assert_eq!(resolver.names().count(), 2);
  }
}
