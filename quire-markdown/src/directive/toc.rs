//! `:toc{minLevel="2" maxLevel="3"}`
//!
//! Replaced by a nested list of links to the document's headings, including
//! the headings of included documents at the point where they were
//! included. The list is built in the post-transform pass so that it sees
//! the final tree.

use log::debug;

use super::{Placement, Transformer};
use crate::{
  ast::{Directive, Document, ListData, Node, NodeKind},
  context::TransformContext,
  error::{TransformError, TransformResult},
};

pub const NAME: &str = "toc";

/// Class set on the generated list.
pub const TOC_CLASS: &str = "quire-toc";

const ATTR_MIN_LEVEL: &str = "minLevel";
const ATTR_MAX_LEVEL: &str = "maxLevel";

#[derive(Debug, Default, Clone, Copy)]
pub struct TocTransformer;

impl Transformer for TocTransformer {
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
    ctx: &TransformContext<'_>,
  ) -> TransformResult<()> {
    let mut lists = Vec::new();
    for directive in toc_directives(document) {
      let (min, max) = level_range(directive)?;
      let tree = TocTree::build(document, min, max);
      lists.push(tree.to_list());
    }
    if lists.is_empty() {
      return Ok(());
    }

    debug!("Inserting {} table(s) of contents in {}", lists.len(), ctx.source());
    let mut lists = lists.into_iter();
    replace_toc_directives(&mut document.children, &mut lists);
    Ok(())
  }
}

fn is_toc(node: &Node) -> bool {
  node.as_directive().is_some_and(|d| d.name == NAME)
}

fn toc_directives(document: &Document) -> Vec<&Directive> {
  fn collect<'a>(nodes: &'a [Node], out: &mut Vec<&'a Directive>) {
    for node in nodes {
      match node.as_directive() {
        Some(directive) if directive.name == NAME => out.push(directive),
        Some(_) => {},
        None => collect(&node.children, out),
      }
    }
  }

  let mut out = Vec::new();
  collect(&document.children, &mut out);
  out
}

fn replace_toc_directives(
  nodes: &mut [Node],
  lists: &mut impl Iterator<Item = Node>,
) {
  for node in nodes {
    if is_toc(node) {
      if let Some(mut list) = lists.next() {
        list.blank_before = node.blank_before;
        *node = list;
      }
    } else if node.as_directive().is_none() {
      replace_toc_directives(&mut node.children, lists);
    }
  }
}

fn level_range(directive: &Directive) -> TransformResult<(u8, u8)> {
  let parse = |attribute: &'static str, default: u8| {
    directive.attribute(attribute).map_or(Ok(default), |raw| {
      raw.trim().parse::<u8>().map_err(|_| {
        TransformError::InvalidAttribute {
          directive: directive.name.clone(),
          attribute,
          value: raw.to_owned(),
        }
      })
    })
  };
  Ok((parse(ATTR_MIN_LEVEL, 1)?, parse(ATTR_MAX_LEVEL, u8::MAX)?))
}

/// One entry of a table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocItem {
  pub level:    u8,
  pub label:    String,
  pub id:       Option<String>,
  pub children: Vec<usize>,
  /// Index of the parent item, used only to find ancestors.
  pub parent:   Option<usize>,
}

/// A forest of [`TocItem`]s stored by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TocTree {
  items: Vec<TocItem>,
  roots: Vec<usize>,
  last:  Option<usize>,
  min:   u8,
  max:   u8,
}

impl TocTree {
  /// Collect the headings of `document` whose level lies in `min..=max`,
  /// descending into included documents.
  #[must_use]
  pub fn build(document: &Document, min: u8, max: u8) -> Self {
    let mut tree = Self {
      min,
      max,
      ..Self::default()
    };
    tree.visit(&document.children);
    tree
  }

  fn visit(&mut self, nodes: &[Node]) {
    for node in nodes {
      if let Some(level) = node.heading_level() {
        let id = node.attributes.get("id").cloned();
        self.insert(level, node.plain_text(), id);
        continue;
      }
      if let Some(directive) = node.as_directive() {
        if let Some(included) = &directive.included {
          self.visit(&included.document.children);
        }
        continue;
      }
      self.visit(&node.children);
    }
  }

  /// Attach a heading under the first preceding item with a lower level, or
  /// start a new root.
  fn insert(&mut self, level: u8, label: String, id: Option<String>) {
    if level < self.min || level > self.max {
      return;
    }

    let index = self.items.len();
    let parent = self.last.and_then(|last| self.first_ancestor(last, level));
    self.items.push(TocItem {
      level,
      label,
      id,
      children: Vec::new(),
      parent,
    });
    match parent {
      Some(parent) => self.items[parent].children.push(index),
      None => self.roots.push(index),
    }
    self.last = Some(index);
  }

  fn first_ancestor(&self, mut index: usize, level: u8) -> Option<usize> {
    loop {
      let item = &self.items[index];
      if item.level < level {
        return Some(index);
      }
      index = item.parent?;
    }
  }

  #[must_use]
  pub fn roots(&self) -> &[usize] {
    &self.roots
  }

  #[must_use]
  pub fn item(&self, index: usize) -> Option<&TocItem> {
    self.items.get(index)
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// Render as a bullet list of links, classed [`TOC_CLASS`].
  #[must_use]
  pub fn to_list(&self) -> Node {
    let mut list = self.list_of(&self.roots);
    list
      .attributes
      .insert("class".to_owned(), TOC_CLASS.to_owned());
    list
  }

  fn list_of(&self, indices: &[usize]) -> Node {
    let items = indices
      .iter()
      .map(|&index| {
        let item = &self.items[index];
        let label = Node::text(item.label.clone());
        let entry = match &item.id {
          Some(id) => {
            Node::with_children(
              NodeKind::Link {
                url:   format!("#{id}"),
                title: String::new(),
              },
              vec![label],
            )
          },
          None => label,
        };

        let mut children =
          vec![Node::with_children(NodeKind::Paragraph, vec![entry])];
        if !item.children.is_empty() {
          children.push(self.list_of(&item.children));
        }
        Node::with_children(NodeKind::Item, children)
      })
      .collect();
    Node::with_children(NodeKind::List(ListData::bullet('-')), items)
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::parser::Parser;

  fn tree(source: &str, min: u8, max: u8) -> TocTree {
    TocTree::build(&Parser::default().parse(source).unwrap(), min, max)
  }

  fn labels(tree: &TocTree, indices: &[usize]) -> Vec<String> {
    indices
      .iter()
      .map(|&i| tree.item(i).unwrap().label.clone())
      .collect()
  }

  #[test]
  fn nests_by_first_lower_ancestor() {
    let tree = tree("# H1\n## H2a\n## H2b\n### H3\n", 1, 6);
    assert_eq!(labels(&tree, tree.roots()), vec!["H1"]);

    let h1 = tree.item(tree.roots()[0]).unwrap();
    assert_eq!(labels(&tree, &h1.children), vec!["H2a", "H2b"]);

    let h2b = tree.item(h1.children[1]).unwrap();
    assert_eq!(labels(&tree, &h2b.children), vec!["H3"]);
    assert!(tree.item(h1.children[0]).unwrap().children.is_empty());
  }

  #[test]
  fn shallower_heading_starts_new_root() {
    let tree = tree("## A\n# B\n### C\n", 1, 6);
    assert_eq!(labels(&tree, tree.roots()), vec!["A", "B"]);
    let b = tree.item(tree.roots()[1]).unwrap();
    assert_eq!(labels(&tree, &b.children), vec!["C"]);
  }

  #[test]
  fn respects_level_bounds() {
    let tree = tree("# A\n## B\n### C\n", 2, 2);
    assert_eq!(labels(&tree, tree.roots()), vec!["B"]);
  }

  #[test]
  fn list_links_to_heading_ids() {
    let list = tree("# Getting Started\n", 1, 6).to_list();
    assert_eq!(list.attributes.get("class").unwrap(), TOC_CLASS);
    let link = &list.children[0].children[0].children[0];
    assert_eq!(link.kind, NodeKind::Link {
      url:   "#getting-started".into(),
      title: String::new(),
    });
  }

  #[test]
  fn invalid_levels_are_errors() {
    let mut directive = Directive::new(NAME, crate::ast::Attributes::new());
    directive
      .attributes
      .insert(ATTR_MIN_LEVEL.to_owned(), "deep".to_owned());
    assert!(matches!(
      level_range(&directive),
      Err(TransformError::InvalidAttribute { .. })
    ));
  }
}
