//! HTML output: directives, link rewriting, embedded images and a layout.

use std::collections::BTreeMap;

use log::debug;
use quire_markdown::{
  HtmlRenderer,
  LinkRewriter,
  Parser,
  ParserOptions,
  Processor,
  TransformerRegistry,
  directive::{attrs, toc},
  embed,
};

use super::{Layout, base_dir, markdown::with_leading_toc};
use crate::{
  error::StageResult,
  pipeline::{Next, Payload, Stage, StageContext},
};

/// Turns the payload into a complete, self-contained HTML page.
///
/// Expects Markdown with includes already resolved. Handles `:toc{}` and
/// `:attrs{}`, rewrites relative links against the source directory, then
/// inlines every image before wrapping the body in the [`Layout`].
#[derive(Debug)]
pub struct HtmlStage {
  processor:    Processor,
  renderer:     HtmlRenderer,
  layout:       Layout,
  replacements: BTreeMap<String, String>,
  toc:          bool,
}

impl HtmlStage {
  #[must_use]
  pub fn new(parser: ParserOptions, renderer: HtmlRenderer, layout: Layout) -> Self {
    let transformers = TransformerRegistry::new()
      .with(toc::NAME, toc::TocTransformer)
      .with(attrs::NAME, attrs::AttrsTransformer);
    Self {
      processor: Processor::new(Parser::new(parser), transformers),
      renderer,
      layout,
      replacements: BTreeMap::new(),
      toc: false,
    }
  }

  /// Prepend a table of contents.
  #[must_use]
  pub const fn with_toc(mut self, toc: bool) -> Self {
    self.toc = toc;
    self
  }

  /// Link prefix replacements, applied after relative links are rebased.
  #[must_use]
  pub fn with_replacements(mut self, replacements: BTreeMap<String, String>) -> Self {
    self.replacements = replacements;
    self
  }
}

impl Stage for HtmlStage {
  fn name(&self) -> &'static str {
    "html"
  }

  fn run(
    &self,
    payload: &mut Payload,
    ctx: &StageContext,
    next: Next<'_>,
  ) -> StageResult<()> {
    let text = payload.text()?;
    let source = if self.toc {
      with_leading_toc(text)
    } else {
      text.to_owned()
    };

    let mut document = self.processor.compile(
      &source,
      payload.source(),
      &ctx.resolver,
      &ctx.resolve_ctx,
    )?;

    LinkRewriter::new()
      .with_base(payload.source().dir())
      .with_replacements(self.replacements.clone())
      .apply(&mut document);

    let images_ctx = ctx
      .resolve_ctx
      .clone()
      .with_workdir(base_dir(payload.source(), &ctx.resolve_ctx));
    embed::embed_images(&mut document, &ctx.resolver, &images_ctx)?;

    let body = self.renderer.render(&document)?;

    // Front matter was consumed by an earlier stage when there is one.
    let mut meta = payload.meta();
    if meta.is_empty() {
      meta = document.meta;
    }

    let html = self.layout.render(&body, meta, ctx)?;
    debug!(
      "Rendered {} with layout {} ({} bytes)",
      payload.source(),
      self.layout.locator(),
      html.len()
    );
    payload.set_data(html);
    next.run(payload)
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use std::fs;

  use quire_resolver::{HttpResolver, Locator, Registry, ResolveContext};
  use serde_json::Map;
  use tempfile::TempDir;

  use super::*;
  use crate::pipeline::Pipeline;

  fn render(stage: HtmlStage, dir: &TempDir, source: &str) -> String {
    let ctx = StageContext::new(
      Registry::with_defaults(HttpResolver::new()),
      ResolveContext::new().with_workdir(dir.path().to_string_lossy().as_ref()),
    );
    let mut payload = Payload::new(Locator::from("docs/page.md"), source.as_bytes().to_vec());
    Pipeline::new().with(stage).run(&mut payload, &ctx).unwrap();
    payload.text().unwrap().to_owned()
  }

  /// Only the body, so tests do not depend on the built-in layout.
  fn bare_layout(dir: &TempDir) -> Layout {
    let path = dir.path().join("bare.html");
    fs::write(&path, "{{ Body | safe }}").unwrap();
    Layout::new(Locator::from(path.as_path()), Map::new())
  }

  #[test]
  fn images_are_inlined_from_the_source_directory() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("docs/img")).unwrap();
    fs::write(dir.path().join("docs/img/dot.svg"), "<svg/>").unwrap();

    let stage = HtmlStage::new(ParserOptions::default(), HtmlRenderer::new(), bare_layout(&dir));
    let html = render(stage, &dir, "![dot](img/dot.svg)\n");

    assert!(
      html.contains("src=\"data:image/svg+xml;base64,PHN2Zy8+\""),
      "{html}"
    );
  }

  #[test]
  fn links_are_rebased_then_replaced() {
    let dir = TempDir::new().unwrap();
    let replacements = BTreeMap::from([(
      "docs/api/".to_owned(),
      "https://docs.example.com/".to_owned(),
    )]);

    let stage = HtmlStage::new(ParserOptions::default(), HtmlRenderer::new(), bare_layout(&dir))
      .with_replacements(replacements);
    let html = render(
      stage,
      &dir,
      "[intro](intro.md) [ref](api/ref.html) [top](#top) [web](https://rust-lang.org)\n",
    );

    assert!(html.contains("href=\"docs/intro.md\""), "{html}");
    assert!(html.contains("href=\"https://docs.example.com/ref.html\""), "{html}");
    assert!(html.contains("href=\"#top\""), "{html}");
    assert!(html.contains("href=\"https://rust-lang.org\""), "{html}");
  }

  #[test]
  fn toc_is_prepended_on_request() {
    let dir = TempDir::new().unwrap();
    let stage = HtmlStage::new(ParserOptions::default(), HtmlRenderer::new(), bare_layout(&dir))
      .with_toc(true);
    let html = render(stage, &dir, "# Alpha\n\n## Beta\n");

    let toc = html.find("quire-toc").unwrap();
    let heading = html.find("<h1").unwrap();
    assert!(toc < heading, "{html}");
    assert!(html.contains("Beta"));
  }

  #[test]
  fn missing_images_fail_the_stage() {
    let dir = TempDir::new().unwrap();
    let stage = HtmlStage::new(ParserOptions::default(), HtmlRenderer::new(), bare_layout(&dir));
    let ctx = StageContext::new(
      Registry::with_defaults(HttpResolver::new()),
      ResolveContext::new().with_workdir(dir.path().to_string_lossy().as_ref()),
    );
    let mut payload = Payload::new(Locator::from("page.md"), b"![x](nope.png)\n".to_vec());
    let err = Pipeline::new().with(stage).run(&mut payload, &ctx).unwrap_err();
    assert!(err.to_string().contains("nope.png"), "{err}");
  }
}
