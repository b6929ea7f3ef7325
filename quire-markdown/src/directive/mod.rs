//! Directive transformation.
//!
//! After parsing, one pre-order walk hands every directive to the
//! [`Transformer`] registered under its name. Unknown directives are left in
//! place for the renderers. Once the walk has finished, every transformer
//! gets a [`Transformer::post_transform`] pass over the final tree, in
//! registration order.

pub mod attrs;
pub mod grammar;
pub mod include;
pub mod toc;

use indexmap::IndexMap;
use log::debug;
use quire_resolver::{Locator, ResolveContext, Resolver};

use crate::{
  ast::{Directive, Document, Node, NodeKind},
  cache::SourceCache,
  context::TransformContext,
  error::TransformResult,
  parser::Parser,
};

/// Where a transformed directive should live in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
  /// Leave the directive where it was parsed.
  Inline,
  /// Stand on its own: a lone directive replaces its paragraph, otherwise
  /// the paragraph is split around it.
  Block,
}

/// Handles one kind of directive.
pub trait Transformer: Send + Sync {
  /// Transform a directive during the main walk.
  ///
  /// # Errors
  ///
  /// Returns an error if the directive is invalid or a resource it needs
  /// cannot be loaded. The whole compile is aborted.
  fn transform(
    &self,
    directive: &mut Directive,
    ctx: &TransformContext<'_>,
  ) -> TransformResult<Placement>;

  /// Run once over the finished document after the main walk.
  ///
  /// # Errors
  ///
  /// Returns an error if the pass cannot be completed.
  fn post_transform(
    &self,
    _document: &mut Document,
    _ctx: &TransformContext<'_>,
  ) -> TransformResult<()> {
    Ok(())
  }
}

/// Directive name to transformer map.
#[derive(Default)]
pub struct TransformerRegistry {
  transformers: IndexMap<String, Box<dyn Transformer>>,
}

impl TransformerRegistry {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry with include, table of contents and attrs transformers.
  #[must_use]
  pub fn with_defaults() -> Self {
    Self::new()
      .with(include::NAME, include::IncludeTransformer)
      .with(toc::NAME, toc::TocTransformer)
      .with(attrs::NAME, attrs::AttrsTransformer)
  }

  #[must_use]
  pub fn with(
    mut self,
    name: impl Into<String>,
    transformer: impl Transformer + 'static,
  ) -> Self {
    self.register(name, transformer);
    self
  }

  pub fn register(
    &mut self,
    name: impl Into<String>,
    transformer: impl Transformer + 'static,
  ) {
    self.transformers.insert(name.into(), Box::new(transformer));
  }

  #[must_use]
  pub fn get(&self, name: &str) -> Option<&dyn Transformer> {
    self.transformers.get(name).map(AsRef::as_ref)
  }

  #[must_use]
  pub fn contains(&self, name: &str) -> bool {
    self.transformers.contains_key(name)
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.transformers.keys().map(String::as_str)
  }

  /// Run the main walk and then every post-transform pass.
  ///
  /// # Errors
  ///
  /// Stops at, and returns, the first transformer error.
  pub fn apply(
    &self,
    document: &mut Document,
    ctx: &TransformContext<'_>,
  ) -> TransformResult<()> {
    self.walk(&mut document.children, ctx)?;
    for (name, transformer) in &self.transformers {
      debug!("Post-transform pass for '{name}' on {}", ctx.source());
      transformer.post_transform(document, ctx)?;
    }
    Ok(())
  }

  fn walk(
    &self,
    nodes: &mut Vec<Node>,
    ctx: &TransformContext<'_>,
  ) -> TransformResult<()> {
    let mut index = 0;
    while index < nodes.len() {
      let node = &mut nodes[index];
      index += 1;
      if self.transform_lone_directive(node, ctx)? {
        continue;
      }

      if let Some(directive) = node.as_directive_mut() {
        self.transform_inline(directive, ctx)?;
        continue;
      }

      if node.kind != NodeKind::Paragraph {
        self.walk(&mut node.children, ctx)?;
        continue;
      }

      let mut lifted = Vec::new();
      for (position, child) in node.children.iter_mut().enumerate() {
        match child.as_directive_mut() {
          Some(directive) => {
            if self.transform_inline(directive, ctx)? == Some(Placement::Block) {
              lifted.push(position);
            }
          },
          None => self.walk(&mut child.children, ctx)?,
        }
      }
      if !lifted.is_empty() {
        let pieces = split_paragraph(nodes.remove(index - 1), &lifted);
        let count = pieces.len();
        nodes.splice(index - 1..index - 1, pieces);
        index += count - 1;
      }
    }
    Ok(())
  }

  /// Transform a directive sitting among other inlines. Unknown directives
  /// give `None`.
  fn transform_inline(
    &self,
    directive: &mut Directive,
    ctx: &TransformContext<'_>,
  ) -> TransformResult<Option<Placement>> {
    let Some(transformer) = self.get(&directive.name) else {
      return Ok(None);
    };
    debug!("Transforming inline directive '{}'", directive.name);
    transformer.transform(directive, ctx).map(Some)
  }

  /// Handle a paragraph holding nothing but a known directive, promoting the
  /// directive in place of the paragraph when asked to.
  fn transform_lone_directive(
    &self,
    node: &mut Node,
    ctx: &TransformContext<'_>,
  ) -> TransformResult<bool> {
    if node.kind != NodeKind::Paragraph || node.children.len() != 1 {
      return Ok(false);
    }
    let Some(directive) = node.children[0].as_directive_mut() else {
      return Ok(false);
    };
    let Some(transformer) = self.get(&directive.name) else {
      return Ok(false);
    };

    debug!("Transforming directive '{}'", directive.name);
    if transformer.transform(directive, ctx)? == Placement::Block
      && let Some(mut promoted) = node.children.pop()
    {
      promoted.blank_before = node.blank_before;
      *node = promoted;
    }
    Ok(true)
  }
}

/// Break a paragraph into its lifted directives and paragraphs holding the
/// inlines between them. Line breaks at the cut points are dropped.
fn split_paragraph(paragraph: Node, lifted: &[usize]) -> Vec<Node> {
  let blank_before = paragraph.blank_before;
  let mut pieces = Vec::new();
  let mut run = Vec::new();
  for (position, child) in paragraph.children.into_iter().enumerate() {
    if lifted.contains(&position) {
      push_paragraph(&mut pieces, std::mem::take(&mut run));
      pieces.push(child);
    } else {
      run.push(child);
    }
  }
  push_paragraph(&mut pieces, run);

  for (position, piece) in pieces.iter_mut().enumerate() {
    piece.blank_before = position > 0 || blank_before;
  }
  pieces
}

fn push_paragraph(pieces: &mut Vec<Node>, mut inlines: Vec<Node>) {
  let start = inlines
    .iter()
    .position(|node| !node.is_line_break())
    .unwrap_or(inlines.len());
  inlines.drain(..start);
  while inlines.last().is_some_and(Node::is_line_break) {
    inlines.pop();
  }
  if let Some(Node {
    kind: NodeKind::Text(text),
    ..
  }) = inlines.last_mut()
  {
    text.truncate(text.trim_end().len());
    if text.is_empty() {
      inlines.pop();
    }
  }
  if !inlines.is_empty() {
    pieces.push(Node::with_children(NodeKind::Paragraph, inlines));
  }
}

/// Parser plus transformers: turns source text into a transformed document.
pub struct Processor {
  parser:       Parser,
  transformers: TransformerRegistry,
}

impl Processor {
  #[must_use]
  pub const fn new(parser: Parser, transformers: TransformerRegistry) -> Self {
    Self {
      parser,
      transformers,
    }
  }

  #[must_use]
  pub const fn parser(&self) -> &Parser {
    &self.parser
  }

  #[must_use]
  pub const fn transformers(&self) -> &TransformerRegistry {
    &self.transformers
  }

  /// Parse `source` and apply every registered transformer.
  ///
  /// # Errors
  ///
  /// Returns the first parse or transform error.
  pub fn process(
    &self,
    source: &str,
    ctx: &TransformContext<'_>,
  ) -> TransformResult<Document> {
    let mut document = self.parser.parse(source)?;
    self.transformers.apply(&mut document, ctx)?;
    Ok(document)
  }

  /// Compile a top-level document located at `locator` with a fresh
  /// [`SourceCache`].
  ///
  /// # Errors
  ///
  /// Returns the first parse or transform error.
  pub fn compile(
    &self,
    source: &str,
    locator: &Locator,
    resolver: &dyn Resolver,
    resolve_ctx: &ResolveContext,
  ) -> TransformResult<Document> {
    let cache = SourceCache::new();
    let ctx = TransformContext::new(self, resolver, resolve_ctx, &cache, locator);
    self.process(source, &ctx)
  }
}

impl std::fmt::Debug for Processor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Processor")
      .field("parser", &self.parser)
      .field("transformers", &self.transformers.names().collect::<Vec<_>>())
      .finish()
  }
}

/// Parse an integer directive attribute, falling back to `default` with a
/// warning when the value is malformed.
pub(crate) fn int_attribute_or(
  directive: &Directive,
  name: &str,
  default: i64,
) -> i64 {
  match directive.attribute(name) {
    None => default,
    Some(raw) => {
      raw.trim().parse().unwrap_or_else(|_| {
        log::warn!(
          "Ignoring invalid '{name}' value '{raw}' on directive '{}'",
          directive.name
        );
        default
      })
    },
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use std::sync::atomic::{AtomicUsize, Ordering};

  use pretty_assertions::assert_eq;
  use quire_resolver::Registry;

  use super::*;

  struct Counting(AtomicUsize);

  impl Transformer for Counting {
    fn transform(
      &self,
      directive: &mut Directive,
      _ctx: &TransformContext<'_>,
    ) -> TransformResult<Placement> {
      self.0.fetch_add(1, Ordering::SeqCst);
      directive
        .attributes
        .insert("seen".to_owned(), "yes".to_owned());
      Ok(if directive.attribute("block").is_some() {
        Placement::Block
      } else {
        Placement::Inline
      })
    }
  }

  fn compile(registry: TransformerRegistry, source: &str) -> Document {
    let processor = Processor::new(Parser::default(), registry);
    processor
      .compile(
        source,
        &Locator::from("doc.md"),
        &Registry::new(),
        &ResolveContext::new(),
      )
      .unwrap()
  }

  #[test]
  fn block_directives_replace_their_paragraph() {
    let registry = TransformerRegistry::new()
      .with("marker", Counting(AtomicUsize::new(0)));
    let doc = compile(registry, "Intro\n\n:marker{block=\"1\"}\n");

    assert_eq!(doc.children.len(), 2);
    let directive = doc.children[1].as_directive().unwrap();
    assert_eq!(directive.attribute("seen"), Some("yes"));
    assert!(doc.children[1].blank_before);
  }

  #[test]
  fn inline_directives_stay_in_place() {
    let registry = TransformerRegistry::new()
      .with("marker", Counting(AtomicUsize::new(0)));
    let doc = compile(registry, "Some text :marker{}\n");

    let paragraph = &doc.children[0];
    assert_eq!(paragraph.kind, NodeKind::Paragraph);
    let directive = paragraph.children[1].as_directive().unwrap();
    assert_eq!(directive.attribute("seen"), Some("yes"));
  }

  #[test]
  fn block_directives_split_their_paragraph() {
    let registry = TransformerRegistry::new()
      .with("marker", Counting(AtomicUsize::new(0)));
    let doc = compile(registry, "Before it :marker{block=\"1\"}\nafter it\n");

    let kinds: Vec<bool> = doc
      .children
      .iter()
      .map(|node| node.as_directive().is_some())
      .collect();
    assert_eq!(kinds, vec![false, true, false]);
    assert_eq!(doc.children[0].plain_text(), "Before it");
    assert_eq!(doc.children[2].plain_text(), "after it");
    assert!(!doc.children[0].blank_before);
    assert!(doc.children[1].blank_before && doc.children[2].blank_before);
  }

  #[test]
  fn unknown_directives_are_untouched() {
    let doc = compile(TransformerRegistry::new(), ":mystery{a=\"1\"}\n");
    let directive = doc.children[0].children[0].as_directive().unwrap();
    assert_eq!(directive.name, "mystery");
    assert!(directive.attribute("seen").is_none());
  }

  #[test]
  fn malformed_integers_fall_back() {
    let mut directive = Directive::new("include", crate::ast::Attributes::new());
    directive
      .attributes
      .insert("shiftHeadings".to_owned(), "two".to_owned());
    assert_eq!(int_attribute_or(&directive, "shiftHeadings", 0), 0);
    directive
      .attributes
      .insert("shiftHeadings".to_owned(), "-1".to_owned());
    assert_eq!(int_attribute_or(&directive, "shiftHeadings", 0), -1);
  }
}
