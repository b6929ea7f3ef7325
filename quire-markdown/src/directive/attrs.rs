//! `:attrs{#id .class key="value"}`
//!
//! Attaches its attributes to the node that follows it in document order.

use super::{Placement, Transformer};
use crate::{
  ast::{Attributes, Directive, Document, Node},
  context::TransformContext,
  error::TransformResult,
};

pub const NAME: &str = "attrs";

#[derive(Debug, Default, Clone, Copy)]
pub struct AttrsTransformer;

impl Transformer for AttrsTransformer {
  fn transform(
    &self,
    _directive: &mut Directive,
    _ctx: &TransformContext<'_>,
  ) -> TransformResult<Placement> {
    Ok(Placement::Block)
  }

  fn post_transform(
    &self,
    document: &mut Document,
    _ctx: &TransformContext<'_>,
  ) -> TransformResult<()> {
    let mut pending = None;
    apply_pending(&mut document.children, &mut pending);
    Ok(())
  }
}

fn apply_pending(nodes: &mut [Node], pending: &mut Option<Attributes>) {
  for node in nodes {
    if let Some(directive) = node.as_directive() {
      if directive.name == NAME {
        *pending = Some(directive.attributes.clone());
      }
      continue;
    }

    if let Some(attributes) = pending.take() {
      merge_attributes(&mut node.attributes, attributes);
    }
    apply_pending(&mut node.children, pending);
  }
}

/// Merge `incoming` into `target`. Classes accumulate, everything else is
/// replaced.
pub fn merge_attributes(target: &mut Attributes, incoming: Attributes) {
  for (key, value) in incoming {
    match target.get_mut(&key) {
      Some(existing) if key == "class" && !existing.is_empty() => {
        existing.push(' ');
        existing.push_str(&value);
      },
      _ => {
        target.insert(key, value);
      },
    }
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use pretty_assertions::assert_eq;
  use quire_resolver::{Locator, Registry, ResolveContext};

  use super::*;
  use crate::{
    ast::NodeKind,
    directive::{Processor, TransformerRegistry},
    parser::Parser,
  };

  fn compile(source: &str) -> Document {
    let processor = Processor::new(
      Parser::default(),
      TransformerRegistry::new().with(NAME, AttrsTransformer),
    );
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
  fn applies_to_following_block() {
    let doc = compile(":attrs{#intro .lead}\n\n# Title\n\nBody\n");
    let heading = &doc.children[1];
    assert_eq!(heading.heading_level(), Some(1));
    assert_eq!(heading.attributes.get("id").unwrap(), "intro");
    assert_eq!(heading.attributes.get("class").unwrap(), "lead");
    assert!(doc.children[2].attributes.is_empty());
  }

  #[test]
  fn attributes_are_consumed_once() {
    let doc = compile(":attrs{.a}\n\nfirst\n\nsecond\n");
    assert_eq!(doc.children[1].attributes.get("class").unwrap(), "a");
    assert_eq!(doc.children[2].kind, NodeKind::Paragraph);
    assert!(doc.children[2].attributes.is_empty());
  }

  #[test]
  fn classes_accumulate() {
    let mut target = Attributes::new();
    target.insert("class".into(), "x".into());
    let mut incoming = Attributes::new();
    incoming.insert("class".into(), "y".into());
    incoming.insert("data-k".into(), "v".into());
    merge_attributes(&mut target, incoming);
    assert_eq!(target.get("class").unwrap(), "x y");
    assert_eq!(target.get("data-k").unwrap(), "v");
  }
}
