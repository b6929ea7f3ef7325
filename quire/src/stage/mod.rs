//! The stages a document passes through on its way to each output format.

pub mod html;
pub mod layout;
pub mod markdown;
pub mod pdf;
pub mod template;

use quire_resolver::{Locator, ResolveContext};

pub use self::{
  html::HtmlStage,
  layout::Layout,
  markdown::MarkdownStage,
  pdf::{ChromiumRenderer, PdfOptions, PdfRenderer, PdfStage},
  template::TemplateStage,
};

/// Directory that resources referenced from `locator` resolve against.
///
/// Relative locators are first placed under the context's working
/// directory, so the result stays valid when used as a new working
/// directory.
pub(crate) fn base_dir(locator: &Locator, ctx: &ResolveContext) -> Locator {
  let located = match ctx.workdir() {
    Some(workdir) if !locator.is_absolute() => workdir.join_one(locator.as_str()),
    _ => locator.clone(),
  };

  // `scheme://name` keeps the file name in the host; its directory is the
  // scheme root.
  if located.is_url() && located.url_path().is_empty() {
    return Locator::new(format!("{}://", located.scheme()));
  }
  located.dir()
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn base_dirs() {
    let ctx = ResolveContext::new();
    assert_eq!(base_dir(&Locator::from("docs/a.md"), &ctx).as_str(), "docs");
    assert_eq!(base_dir(&Locator::from("a.md"), &ctx).as_str(), ".");
    assert_eq!(
      base_dir(&Locator::from("https://example.com/t/layout.html"), &ctx).as_str(),
      "https://example.com/t"
    );
    assert_eq!(
      base_dir(&Locator::from("quire://document.html"), &ctx).as_str(),
      "quire://"
    );

    let ctx = ResolveContext::new().with_workdir("/srv/site");
    assert_eq!(
      base_dir(&Locator::from("layouts/page.html"), &ctx).as_str(),
      "/srv/site/layouts"
    );
  }
}
