//! `:include{url="..." shiftHeadings="1" fromHeadings="2"}`
//!
//! Pulls another Markdown document into the current one. The included
//! source is fetched through the resolver, parsed and transformed with the
//! same processor (so nested includes resolve relative to the included
//! document), and memoized in the [`SourceCache`](crate::cache::SourceCache).
//! Each directive then receives its own copy of the cached subtree, adjusted
//! for its attributes. The adjustments reach into nested includes, so
//! relative links compose level by level and every heading below the
//! directive is shifted.

use std::rc::Rc;

use log::debug;
use quire_resolver::Locator;

use super::{Placement, Transformer, int_attribute_or};
use crate::{
  ast::{Directive, Document, Included, Node, NodeKind},
  cache::CachedSource,
  context::TransformContext,
  error::{TransformError, TransformResult},
  rewrite::is_relative_reference,
};

pub const NAME: &str = "include";

const ATTR_URL: &str = "url";
const ATTR_SHIFT_HEADINGS: &str = "shiftHeadings";
const ATTR_FROM_HEADINGS: &str = "fromHeadings";

/// Deepest heading level Markdown can express.
const MAX_HEADING_LEVEL: i64 = 6;

#[derive(Debug, Default, Clone, Copy)]
pub struct IncludeTransformer;

impl Transformer for IncludeTransformer {
  fn transform(
    &self,
    directive: &mut Directive,
    ctx: &TransformContext<'_>,
  ) -> TransformResult<Placement> {
    let raw_url = directive.attribute(ATTR_URL).ok_or_else(|| {
      TransformError::MissingAttribute {
        directive: directive.name.clone(),
        attribute: ATTR_URL,
      }
    })?;
    let shift = int_attribute_or(directive, ATTR_SHIFT_HEADINGS, 0);
    let from = int_attribute_or(directive, ATTR_FROM_HEADINGS, 0);

    let locator = resolve_reference(ctx.source(), raw_url);
    // Relative to the including document, so nested includes compose.
    let link_base = Locator::from(raw_url).dir();
    let entry = load(&locator, ctx)?;

    let mut document = entry.document.clone();
    exclude_sections(&mut document, from);
    rewrite_relative_links(&mut document, &link_base);
    shift_headings(&mut document, shift);

    directive.included = Some(Rc::new(Included {
      locator,
      source: Rc::clone(&entry.source),
      document,
    }));
    Ok(Placement::Block)
  }

  fn post_transform(
    &self,
    document: &mut Document,
    _ctx: &TransformContext<'_>,
  ) -> TransformResult<()> {
    document.renumber_heading_ids();
    Ok(())
  }
}

/// Resolve an include reference against the including document.
///
/// URLs and absolute paths are used as-is; anything else is joined with the
/// including document's directory.
#[must_use]
pub fn resolve_reference(source: &Locator, reference: &str) -> Locator {
  let reference = Locator::from(reference);
  if reference.is_absolute() {
    reference
  } else {
    source.dir().join_one(reference.as_str())
  }
}

fn load(
  locator: &Locator,
  ctx: &TransformContext<'_>,
) -> TransformResult<Rc<CachedSource>> {
  let key = locator.as_str();
  if let Some(hit) = ctx.cache().get(key) {
    debug!("Reusing cached include '{key}'");
    return Ok(hit);
  }

  ctx
    .cache()
    .enter(locator)
    .map_err(|chain| TransformError::IncludeCycle { chain })?;
  let loaded = fetch_and_process(locator, ctx);
  ctx.cache().leave(locator);
  let (source, document) = loaded?;

  Ok(ctx.cache().set(key, CachedSource {
    locator: locator.clone(),
    source,
    document,
  }))
}

fn fetch_and_process(
  locator: &Locator,
  ctx: &TransformContext<'_>,
) -> TransformResult<(Rc<[u8]>, Document)> {
  debug!("Including '{locator}' from '{}'", ctx.source());
  let bytes = ctx
    .resolver()
    .fetch(locator, ctx.resolve_ctx())
    .map_err(|source| {
      TransformError::Resolve {
        locator: locator.clone(),
        source,
      }
    })?;

  let document = {
    let text = std::str::from_utf8(&bytes).map_err(|source| {
      TransformError::InvalidUtf8 {
        locator: locator.clone(),
        source,
      }
    })?;
    ctx.processor().process(text, &ctx.with_source(locator))?
  };

  Ok((Rc::from(bytes), document))
}

/// Drop every node met while the most recent heading is shallower than
/// `from`. A `from` of zero or less keeps everything.
fn exclude_sections(document: &mut Document, from: i64) {
  fn exclude(nodes: &mut Vec<Node>, level: &mut i64, from: i64) {
    nodes.retain_mut(|node| {
      if let Some(heading) = node.heading_level() {
        *level = i64::from(heading);
      }
      if let Some(included) = node
        .as_directive_mut()
        .and_then(|directive| directive.included.as_mut())
      {
        exclude(&mut Rc::make_mut(included).document.children, level, from);
        return true;
      }
      if *level < from {
        return false;
      }
      exclude(&mut node.children, level, from);
      true
    });
  }

  if from <= 0 {
    return;
  }
  let mut level = 0;
  exclude(&mut document.children, &mut level, from);
}

fn rewrite_relative_links(document: &mut Document, base: &Locator) {
  document.walk_included_mut(&mut |node| {
    if let NodeKind::Link { url, .. } | NodeKind::Image { url, .. } =
      &mut node.kind
      && is_relative_reference(url)
    {
      *url = base.join_one(url).to_string();
    }
  });
}

fn shift_headings(document: &mut Document, shift: i64) {
  if shift == 0 {
    return;
  }
  document.walk_included_mut(&mut |node| {
    if let NodeKind::Heading { level } = &mut node.kind {
      let shifted = (i64::from(*level) + shift).clamp(1, MAX_HEADING_LEVEL);
      *level = u8::try_from(shifted).unwrap_or(6);
    }
  });
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::parser::Parser;

  fn levels(document: &Document) -> Vec<u8> {
    document
      .headings()
      .iter()
      .filter_map(|h| h.heading_level())
      .collect()
  }

  #[test]
  fn references_resolve_against_the_including_document() {
    let source = Locator::from("docs/guide/index.md");
    assert_eq!(
      resolve_reference(&source, "../shared/part.md").as_str(),
      "docs/shared/part.md"
    );
    assert_eq!(
      resolve_reference(&source, "https://example.com/x.md").as_str(),
      "https://example.com/x.md"
    );

    let remote = Locator::from("https://example.com/docs/index.md");
    assert_eq!(
      resolve_reference(&remote, "part.md").as_str(),
      "https://example.com/docs/part.md"
    );
  }

  #[test]
  fn shifting_clamps_at_six() {
    let mut doc = Parser::default()
      .parse("# A\n\n###### F\n")
      .unwrap();
    shift_headings(&mut doc, 2);
    assert_eq!(levels(&doc), vec![3, 6]);
  }

  #[test]
  fn excluding_keeps_deeper_sections() {
    let mut doc = Parser::default()
      .parse("# A\ntext0\n## B\ntext1\n# C\ntext2\n")
      .unwrap();
    exclude_sections(&mut doc, 2);

    let text: Vec<String> = doc.children.iter().map(Node::plain_text).collect();
    assert_eq!(text, vec!["B", "text1"]);
  }

  #[test]
  fn excluding_from_zero_keeps_everything() {
    let mut doc = Parser::default().parse("intro\n\n# A\n").unwrap();
    exclude_sections(&mut doc, 0);
    assert_eq!(doc.children.len(), 2);
  }

  #[test]
  fn relative_destinations_are_rebased() {
    let mut doc = Parser::default()
      .parse(
        "![a](img/a.png) [b](https://example.com) [c](#top) [d](/abs.md) \
         [e](mailto:x@y.z) [f](other.md)\n",
      )
      .unwrap();
    rewrite_relative_links(&mut doc, &Locator::from("parts/sub"));

    let mut urls = Vec::new();
    doc.walk(&mut |node| {
      if let NodeKind::Link { url, .. } | NodeKind::Image { url, .. } = &node.kind {
        urls.push(url.clone());
      }
    });
    assert_eq!(urls, vec![
      "parts/sub/img/a.png",
      "https://example.com",
      "#top",
      "/abs.md",
      "mailto:x@y.z",
      "parts/sub/other.md",
    ]);
  }
}
