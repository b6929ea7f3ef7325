//! Directive resolution and canonical Markdown output.

use log::debug;
use quire_markdown::{
  MarkdownRenderer,
  Parser,
  ParserOptions,
  Processor,
  TransformerRegistry,
  directive::{include, toc},
  parser::split_front_matter,
};
use serde_json::Value;

use crate::{
  error::StageResult,
  pipeline::{ATTR_META, Next, Payload, Stage, StageContext},
};

/// Directive inserted at the top of a document to request a table of
/// contents.
pub(crate) const TOC_DIRECTIVE: &str = ":toc{}\n\n";

/// Insert [`TOC_DIRECTIVE`] after the front matter of `source`, if any.
pub(crate) fn with_leading_toc(source: &str) -> String {
  let (_, body) = split_front_matter(source);
  let split = source.len() - body.len();
  let mut out = String::with_capacity(source.len() + TOC_DIRECTIVE.len());
  out.push_str(&source[..split]);
  out.push_str(TOC_DIRECTIVE);
  out.push_str(body);
  out
}

/// Resolves includes (and optionally a table of contents) and replaces the
/// payload with canonical Markdown. Front matter is published as the
/// [`ATTR_META`] attribute.
#[derive(Debug)]
pub struct MarkdownStage {
  processor: Processor,
  renderer:  MarkdownRenderer,
  toc:       bool,
}

impl MarkdownStage {
  #[must_use]
  pub fn new(parser: ParserOptions, renderer: MarkdownRenderer) -> Self {
    Self {
      processor: Self::processor(parser, false),
      renderer,
      toc: false,
    }
  }

  /// Prepend and expand a table of contents.
  #[must_use]
  pub fn with_toc(mut self, toc: bool) -> Self {
    if toc != self.toc {
      let parser = self.processor.parser().options().clone();
      self.processor = Self::processor(parser, toc);
      self.toc = toc;
    }
    self
  }

  fn processor(parser: ParserOptions, toc: bool) -> Processor {
    let mut transformers =
      TransformerRegistry::new().with(include::NAME, include::IncludeTransformer);
    if toc {
      transformers.register(toc::NAME, toc::TocTransformer);
    }
    Processor::new(Parser::new(parser), transformers)
  }
}

impl Stage for MarkdownStage {
  fn name(&self) -> &'static str {
    "markdown"
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

    let document = self.processor.compile(
      &source,
      payload.source(),
      &ctx.resolver,
      &ctx.resolve_ctx,
    )?;
    let markdown = self.renderer.render(&document)?;
    debug!(
      "Compiled {} to {} bytes of Markdown",
      payload.source(),
      markdown.len()
    );

    payload.set_attribute(ATTR_META, Value::Object(document.meta));
    payload.set_data(markdown);
    next.run(payload)
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn toc_goes_after_front_matter() {
    assert_eq!(
      with_leading_toc("---\ntitle: T\n---\n# A\n"),
      "---\ntitle: T\n---\n:toc{}\n\n# A\n"
    );
    assert_eq!(with_leading_toc("# A\n"), ":toc{}\n\n# A\n");
  }
}
